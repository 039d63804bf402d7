use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The duration of a source file could not be determined
    #[error("failed to probe duration of {}: {reason}", path.display())]
    Probe { path: PathBuf, reason: String },

    /// An external tool ran but exited unsuccessfully
    #[error("{tool} exited with {}: {}", exit_code_label(*status), stderr.trim())]
    Invocation {
        tool: String,
        status: Option<i32>,
        stderr: String,
    },

    /// An external tool could not be started at all
    #[error("failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "invalid segment length {0}: must be positive and give at most {max} segments",
        max = crate::plan::MAX_WINDOWS
    )]
    InvalidPlan(f64),

    #[error("no input files given to merge")]
    EmptyMergeList,

    /// Two inputs would be rewrapped into the same intermediate file
    #[error("{first} and {second} both map to intermediate {intermediate}")]
    IntermediateCollision {
        first: String,
        second: String,
        intermediate: String,
    },

    /// A path would be split apart inside the `concat:` specifier
    #[error("{path} contains the concat delimiter '{}'", crate::ffmpeg::CONCAT_DELIMITER)]
    ConcatDelimiter { path: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

fn exit_code_label(status: Option<i32>) -> String {
    match status {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (killed by signal)".to_string(),
    }
}
