use regex::Regex;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

use crate::config::ToolConfig;
use crate::error::{Error, Result};
use crate::plan::SegmentWindow;

/// Separator between paths in a `concat:` specifier.
pub const CONCAT_DELIMITER: &str = "|";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Ffmpeg,
    Ffprobe,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tool::Ffmpeg => f.write_str("ffmpeg"),
            Tool::Ffprobe => f.write_str("ffprobe"),
        }
    }
}

/// One call of an external tool, described independently of where the
/// executable lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub tool: Tool,
    pub args: Vec<OsString>,
}

impl Invocation {
    pub fn new(tool: Tool) -> Self {
        Invocation {
            tool,
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    /// The last argument, which for every ffmpeg call built here is the output file.
    #[cfg(test)]
    pub fn output_path(&self) -> Option<PathBuf> {
        self.args.last().map(PathBuf::from)
    }

    pub fn command_line(&self) -> String {
        let args = self
            .args
            .iter()
            .map(|arg| arg.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        format!("{} {}", self.tool, args)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Executes invocations to completion.
///
/// Implementations must turn a nonzero exit into [`Error::Invocation`] and a
/// failure to start the executable into [`Error::Spawn`].
pub trait Runner {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput>;
}

/// Runs invocations as blocking child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    config: ToolConfig,
}

impl ProcessRunner {
    pub fn new(config: ToolConfig) -> Self {
        ProcessRunner { config }
    }
}

impl Runner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
        let program = self.config.program(invocation.tool);
        debug!("Executing: {:?} {}", program, invocation.command_line());

        let output = Command::new(program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| Error::Spawn {
                tool: invocation.tool.to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(Error::Invocation {
                tool: invocation.tool.to_string(),
                status: output.status.code(),
                stderr,
            });
        }

        Ok(ToolOutput { stdout, stderr })
    }
}

pub fn probe_invocation(input_file: &Path) -> Invocation {
    Invocation::new(Tool::Ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(input_file)
}

/// Decodes the whole input to nowhere; ffmpeg reports `Duration:` on stderr.
pub fn banner_invocation(input_file: &Path) -> Invocation {
    Invocation::new(Tool::Ffmpeg)
        .args(["-hide_banner", "-i"])
        .arg(input_file)
        .args(["-f", "null", "-"])
}

/// Re-encodes one window of the source so every segment starts on a clean frame.
pub fn extract_segment_invocation(
    input_file: &Path,
    window: &SegmentWindow,
    output_file: &Path,
) -> Invocation {
    Invocation::new(Tool::Ffmpeg)
        .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
        .arg(input_file)
        .arg("-ss")
        .arg(format_seconds(window.start))
        .arg("-to")
        .arg(format_seconds(window.end))
        .args(["-c:v", "libx264", "-c:a", "aac"])
        .args(["-map", "0:v", "-map", "0:a"])
        .arg(output_file)
}

/// Copies streams into MPEG-TS, which can be concatenated byte-wise.
pub fn rewrap_invocation(input_file: &Path, output_file: &Path) -> Invocation {
    Invocation::new(Tool::Ffmpeg)
        .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
        .arg(input_file)
        .args(["-c:v", "copy", "-c:a", "copy"])
        .args(["-bsf:v", "h264_mp4toannexb"])
        .arg(output_file)
}

pub fn concat_invocation(specifier: &str, output_file: &Path) -> Invocation {
    Invocation::new(Tool::Ffmpeg)
        .args(["-hide_banner", "-loglevel", "error", "-y", "-i", specifier])
        .args(["-c:a", "copy", "-c:v", "copy"])
        .args(["-bsf:a", "aac_adtstoasc"])
        .arg(output_file)
}

pub fn concat_specifier(parts: &[PathBuf]) -> String {
    let joined = parts
        .iter()
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join(CONCAT_DELIMITER);
    format!("concat:{}", joined)
}

/// Total duration of `input_file` in seconds.
///
/// Asks ffprobe first. Some containers make ffprobe print `N/A`, in which case
/// the file is decoded once with ffmpeg and the `Duration:` line is read.
pub fn probe_duration<R: Runner>(runner: &R, input_file: &Path) -> Result<f64> {
    let probe_error = |reason: String| Error::Probe {
        path: input_file.to_path_buf(),
        reason,
    };

    let output = runner
        .run(&probe_invocation(input_file))
        .map_err(|e| probe_error(e.to_string()))?;

    let duration = match parse_probe_output(&output.stdout) {
        Some(duration) => duration,
        None => {
            debug!(
                "ffprobe reported {:?} for {}, falling back to ffmpeg",
                output.stdout.trim(),
                input_file.display()
            );
            let output = runner
                .run(&banner_invocation(input_file))
                .map_err(|e| probe_error(e.to_string()))?;
            parse_duration_banner(&output.stderr).ok_or_else(|| {
                probe_error(format!(
                    "unparsable duration output {:?}",
                    output.stderr.trim()
                ))
            })?
        }
    };

    if !duration.is_finite() || duration < 0.0 {
        return Err(probe_error(format!("invalid duration {}", duration)));
    }

    Ok(duration)
}

fn parse_probe_output(output: &str) -> Option<f64> {
    output.trim().parse::<f64>().ok()
}

fn parse_duration_banner(output: &str) -> Option<f64> {
    let duration_re = Regex::new(r"Duration: (\d+):(\d{2}):(\d{2}(?:\.\d+)?)").ok()?;

    let cap = duration_re.captures(output)?;
    let hours: f64 = cap[1].parse().ok()?;
    let minutes: f64 = cap[2].parse().ok()?;
    let seconds: f64 = cap[3].parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// True when the window collapses to a single instant at the precision passed
/// on the command line, so `-ss` and `-to` would be identical.
pub fn is_zero_length(window: &SegmentWindow) -> bool {
    format_seconds(window.start) == format_seconds(window.end)
}

fn format_seconds(seconds: f64) -> String {
    format!("{:.3}", seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingRunner;

    fn args_of(invocation: &Invocation) -> Vec<String> {
        invocation
            .args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn parses_ffprobe_stdout() {
        assert_eq!(parse_probe_output("45.023000\n"), Some(45.023));
        assert_eq!(parse_probe_output("N/A\n"), None);
        assert_eq!(parse_probe_output(""), None);
    }

    #[test]
    fn parses_duration_banner() {
        let stderr = "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'in.mp4':\n  \
                      Duration: 01:02:03.45, start: 0.000000, bitrate: 1205 kb/s\n";
        let duration = parse_duration_banner(stderr).unwrap();
        assert!((duration - 3723.45).abs() < 1e-9);
    }

    #[test]
    fn banner_without_duration_is_rejected() {
        assert_eq!(parse_duration_banner("  Duration: N/A, bitrate: N/A"), None);
    }

    #[test]
    fn extract_segment_windows_and_reencodes() {
        let window = SegmentWindow {
            index: 2,
            start: 40.0,
            end: 45.0,
        };
        let invocation = extract_segment_invocation(
            Path::new("in.mp4"),
            &window,
            Path::new("out/segment_2.mp4"),
        );
        assert_eq!(invocation.tool, Tool::Ffmpeg);
        assert_eq!(
            args_of(&invocation),
            [
                "-hide_banner", "-loglevel", "error", "-y", "-i", "in.mp4", "-ss", "40.000",
                "-to", "45.000", "-c:v", "libx264", "-c:a", "aac", "-map", "0:v", "-map",
                "0:a", "out/segment_2.mp4",
            ]
        );
        assert_eq!(
            invocation.output_path(),
            Some(PathBuf::from("out/segment_2.mp4"))
        );
    }

    #[test]
    fn sub_millisecond_window_is_zero_length() {
        let window = |start, end| SegmentWindow {
            index: 0,
            start,
            end,
        };
        assert!(is_zero_length(&window(40.0, 40.0)));
        assert!(is_zero_length(&window(40.0, 40.0004)));
        assert!(!is_zero_length(&window(40.0, 40.001)));
    }

    #[test]
    fn rewrap_copies_streams() {
        let invocation = rewrap_invocation(Path::new("in/a.mp4"), Path::new("tmp/a.ts"));
        let args = args_of(&invocation);
        assert!(args.windows(2).any(|w| w == ["-c:v", "copy"]));
        assert!(args.windows(2).any(|w| w == ["-bsf:v", "h264_mp4toannexb"]));
        assert_eq!(args.last().map(String::as_str), Some("tmp/a.ts"));
    }

    #[test]
    fn specifier_joins_in_order() {
        let parts = vec![PathBuf::from("t/a.ts"), PathBuf::from("t/b.ts")];
        assert_eq!(concat_specifier(&parts), "concat:t/a.ts|t/b.ts");
    }

    #[test]
    fn probe_uses_ffprobe_stdout() {
        let runner = RecordingRunner::with_duration("12.5\n");
        let duration = probe_duration(&runner, Path::new("in.mp4")).unwrap();
        assert_eq!(duration, 12.5);
        assert_eq!(runner.calls().len(), 1);
        assert_eq!(runner.calls()[0].tool, Tool::Ffprobe);
    }

    #[test]
    fn probe_falls_back_to_banner() {
        let runner = RecordingRunner::with_duration("N/A\n")
            .with_banner("  Duration: 00:00:45.00, start: 0.000000\n");
        let duration = probe_duration(&runner, Path::new("in.mkv")).unwrap();
        assert_eq!(duration, 45.0);
        let tools: Vec<Tool> = runner.calls().iter().map(|c| c.tool).collect();
        assert_eq!(tools, [Tool::Ffprobe, Tool::Ffmpeg]);
    }

    #[test]
    fn probe_rejects_garbage() {
        let runner = RecordingRunner::with_duration("N/A\n").with_banner("nothing useful");
        let err = probe_duration(&runner, Path::new("in.mkv")).unwrap_err();
        assert!(matches!(err, Error::Probe { .. }));
    }

    #[test]
    fn probe_rejects_negative_duration() {
        let runner = RecordingRunner::with_duration("-3.0\n");
        let err = probe_duration(&runner, Path::new("in.mp4")).unwrap_err();
        assert!(matches!(err, Error::Probe { .. }));
    }

    #[test]
    fn probe_failure_is_reported_as_probe_error() {
        let runner = RecordingRunner::with_duration("1.0").failing_on(Tool::Ffprobe, 0);
        let err = probe_duration(&runner, Path::new("missing.mp4")).unwrap_err();
        match err {
            Error::Probe { path, reason } => {
                assert_eq!(path, PathBuf::from("missing.mp4"));
                assert!(reason.contains("ffprobe"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
