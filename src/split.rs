use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::ffmpeg::{self, Runner};
use crate::plan::SegmentPlan;

pub fn segment_file_name(index: usize) -> String {
    format!("segment_{}.mp4", index)
}

/// Cuts `source` into `segment_seconds`-long files named `segment_<i>.mp4`
/// inside `output_dir`, returning their paths in playback order.
///
/// Windows are extracted one at a time; the first failing ffmpeg call aborts
/// the run and already written segments are left in place.
pub fn split<R: Runner>(
    runner: &R,
    source: &Path,
    output_dir: &Path,
    segment_seconds: f64,
) -> Result<Vec<PathBuf>> {
    if !segment_seconds.is_finite() || segment_seconds <= 0.0 {
        return Err(Error::InvalidPlan(segment_seconds));
    }

    fs::create_dir_all(output_dir).map_err(|e| Error::io(output_dir, e))?;

    let duration = ffmpeg::probe_duration(runner, source)?;
    let plan = SegmentPlan::new(duration, segment_seconds)?;

    info!(
        "Splitting {} ({:.2}s) into {} windows of {}s",
        source.display(),
        duration,
        plan.len(),
        segment_seconds
    );

    let mut segments = Vec::with_capacity(plan.len());
    for window in plan.windows() {
        if ffmpeg::is_zero_length(window) {
            warn!(
                "Skipping empty window {} at {:.3}s of {}",
                window.index,
                window.start,
                source.display()
            );
            continue;
        }

        let output_file = output_dir.join(segment_file_name(window.index));
        runner.run(&ffmpeg::extract_segment_invocation(
            source,
            window,
            &output_file,
        ))?;

        info!(
            "Segment {} [{:.3}s, {:.3}s] ({:.3}s) written to {}",
            window.index,
            window.start,
            window.end,
            window.duration(),
            output_file.display()
        );
        segments.push(output_file);
    }

    Ok(segments)
}
