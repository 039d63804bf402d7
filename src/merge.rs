use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::ffmpeg::{self, Runner};

/// Input file names for one merge, in the order they are joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeList {
    names: Vec<String>,
}

impl MergeList {
    /// Rejects an empty list, names containing the `concat:` delimiter, and any
    /// two names that would share an intermediate file, since the second
    /// rewrap would overwrite the first.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(Error::EmptyMergeList);
        }

        let mut seen: HashMap<String, &str> = HashMap::new();
        for name in &names {
            reject_delimiter(name)?;
            let intermediate = intermediate_name(name);
            if let Some(first) = seen.insert(intermediate.clone(), name) {
                return Err(Error::IntermediateCollision {
                    first: first.to_string(),
                    second: name.clone(),
                    intermediate,
                });
            }
        }

        Ok(MergeList { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}

fn reject_delimiter(path: &str) -> Result<()> {
    if path.contains(ffmpeg::CONCAT_DELIMITER) {
        return Err(Error::ConcatDelimiter {
            path: path.to_string(),
        });
    }
    Ok(())
}

/// `clip.part1.mp4` -> `clip.ts`: everything before the first dot, plus `.ts`.
pub fn intermediate_name(file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let stem = match base.split('.').next() {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => base.clone(),
    };
    format!("{}.ts", stem)
}

/// Rewraps every input into an MPEG-TS file in `temp_dir`, preserving order.
pub fn convert_all<R: Runner>(
    runner: &R,
    list: &MergeList,
    input_dir: &Path,
    temp_dir: &Path,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(temp_dir).map_err(|e| Error::io(temp_dir, e))?;

    let mut intermediates = Vec::with_capacity(list.len());
    for name in list.names() {
        let input_file = input_dir.join(name);
        let temp_file = temp_dir.join(intermediate_name(name));

        runner.run(&ffmpeg::rewrap_invocation(&input_file, &temp_file))?;
        debug!(
            "Rewrapped {} into {}",
            input_file.display(),
            temp_file.display()
        );

        intermediates.push(temp_file);
    }

    Ok(intermediates)
}

/// Joins the inputs of `list` into `output_dir/output_name` without re-encoding.
///
/// Intermediates are removed after the concatenation attempt whether or not it
/// succeeded. If a rewrap fails, nothing is concatenated and the intermediates
/// written so far are left for inspection.
pub fn merge<R: Runner>(
    runner: &R,
    list: &MergeList,
    output_name: &str,
    input_dir: &Path,
    temp_dir: &Path,
    output_dir: &Path,
) -> Result<PathBuf> {
    reject_delimiter(&temp_dir.to_string_lossy())?;
    fs::create_dir_all(output_dir).map_err(|e| Error::io(output_dir, e))?;
    let output_file = output_dir.join(output_name);

    let intermediates = convert_all(runner, list, input_dir, temp_dir)?;

    let specifier = ffmpeg::concat_specifier(&intermediates);
    let concatenated = runner.run(&ffmpeg::concat_invocation(&specifier, &output_file));
    let cleaned = remove_intermediates(&intermediates);

    concatenated?;
    cleaned?;

    info!(
        "Merged {} files into {}",
        intermediates.len(),
        output_file.display()
    );
    Ok(output_file)
}

/// Tries every file even after a failure and reports the first error.
fn remove_intermediates(paths: &[PathBuf]) -> Result<()> {
    let mut first_error = None;
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!("Could not remove {}: {}", path.display(), e);
                first_error.get_or_insert(Error::io(path, e));
            }
        }
    }
    first_error.map_or(Ok(()), Err)
}
