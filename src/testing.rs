//! In-process stand-in for ffmpeg/ffprobe used by the unit tests.

use std::cell::RefCell;
use std::fs;

use crate::error::{Error, Result};
use crate::ffmpeg::{Invocation, Runner, Tool, ToolOutput};

/// Records every invocation and fakes its effect.
///
/// ffprobe answers with a canned duration, the ffmpeg null-muxer probe answers
/// with a canned banner, and every other ffmpeg call creates its output file
/// empty so cleanup can be observed on disk.
#[derive(Default)]
pub struct RecordingRunner {
    duration_stdout: String,
    banner_stderr: String,
    fail_on: Option<(Tool, usize)>,
    calls: RefCell<Vec<Invocation>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(stdout: &str) -> Self {
        RecordingRunner {
            duration_stdout: stdout.to_string(),
            ..Self::default()
        }
    }

    pub fn with_banner(mut self, stderr: &str) -> Self {
        self.banner_stderr = stderr.to_string();
        self
    }

    /// Make the `nth` (zero-based) call of `tool` exit with status 1.
    pub fn failing_on(mut self, tool: Tool, nth: usize) -> Self {
        self.fail_on = Some((tool, nth));
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    pub fn ffmpeg_calls(&self) -> Vec<Vec<String>> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.tool == Tool::Ffmpeg)
            .map(|call| {
                call.args
                    .iter()
                    .map(|arg| arg.to_string_lossy().into_owned())
                    .collect()
            })
            .collect()
    }
}

impl Runner for RecordingRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
        let nth = self
            .calls
            .borrow()
            .iter()
            .filter(|call| call.tool == invocation.tool)
            .count();
        self.calls.borrow_mut().push(invocation.clone());

        if self.fail_on == Some((invocation.tool, nth)) {
            return Err(Error::Invocation {
                tool: invocation.tool.to_string(),
                status: Some(1),
                stderr: "simulated failure".to_string(),
            });
        }

        match invocation.tool {
            Tool::Ffprobe => Ok(ToolOutput {
                stdout: self.duration_stdout.clone(),
                stderr: String::new(),
            }),
            Tool::Ffmpeg if invocation.args.iter().any(|arg| arg == "null") => Ok(ToolOutput {
                stdout: String::new(),
                stderr: self.banner_stderr.clone(),
            }),
            Tool::Ffmpeg => {
                if let Some(output) = invocation.output_path() {
                    fs::write(&output, b"").map_err(|e| Error::io(&output, e))?;
                }
                Ok(ToolOutput::default())
            }
        }
    }
}
