use crate::error::{Error, Result};

/// Upper bound on windows in one plan; a segment length that would exceed it
/// is rejected rather than spawning that many encodes.
pub const MAX_WINDOWS: usize = 100_000;

/// One time range of the source, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentWindow {
    pub index: usize,
    pub start: f64,
    pub end: f64,
}

impl SegmentWindow {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Ordered, contiguous windows covering `[0, duration]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPlan {
    windows: Vec<SegmentWindow>,
}

impl SegmentPlan {
    /// Cuts `[0, duration]` into windows of `segment_seconds`.
    ///
    /// The window count is `floor(duration / segment_seconds) + 1` and the last
    /// window is clamped to `duration`. When `duration` is an exact multiple of
    /// `segment_seconds` this leaves a trailing empty window
    /// `[duration, duration]`; it is kept so the rule stays observable, and
    /// callers decide what to do with it via [`SegmentWindow::is_empty`].
    pub fn new(duration: f64, segment_seconds: f64) -> Result<Self> {
        if !segment_seconds.is_finite() || segment_seconds <= 0.0 {
            return Err(Error::InvalidPlan(segment_seconds));
        }
        let duration = duration.max(0.0);

        let whole = (duration / segment_seconds).floor();
        if !whole.is_finite() || whole >= MAX_WINDOWS as f64 {
            return Err(Error::InvalidPlan(segment_seconds));
        }
        let count = (whole as usize)
            .checked_add(1)
            .ok_or(Error::InvalidPlan(segment_seconds))?;
        let windows = (0..count)
            .map(|index| {
                // Clamp the start too, in case float error pushes i*s past duration.
                let start = (index as f64 * segment_seconds).min(duration);
                let end = ((index + 1) as f64 * segment_seconds).min(duration);
                SegmentWindow { index, start, end }
            })
            .collect();

        Ok(SegmentPlan { windows })
    }

    pub fn windows(&self) -> &[SegmentWindow] {
        &self.windows
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }
}
