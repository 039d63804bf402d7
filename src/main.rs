mod config;
mod error;
mod ffmpeg;
mod merge;
mod plan;
mod split;
#[cfg(test)]
mod testing;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::config::ToolConfig;
use crate::ffmpeg::{ProcessRunner, Runner};
use crate::merge::MergeList;

const TEMP_DIR_NAME: &str = "segmerge-tmp";

/// Split videos into fixed-length segments and merge segments back together.
#[derive(Parser, Debug)]
#[command(name = "segmerge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the ffmpeg executable.
    #[arg(long, global = true)]
    ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe executable.
    #[arg(long, global = true)]
    ffprobe: Option<PathBuf>,

    /// Logging level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Cut a video into segment_<i>.mp4 files.
    Split {
        source: PathBuf,

        output_dir: PathBuf,

        /// Length of each segment in seconds.
        #[arg(short, long, default_value_t = 20.0)]
        segment_seconds: f64,
    },

    /// Join files, in the given order, into one video without re-encoding.
    Merge {
        output_name: String,

        #[arg(required = true)]
        files: Vec<String>,

        /// Directory the input files are read from.
        #[arg(long, default_value = ".")]
        input_dir: PathBuf,

        /// Directory for intermediate .ts files [default: <OUTPUT_DIR>/segmerge-tmp]
        #[arg(long)]
        temp_dir: Option<PathBuf>,

        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Runs a merge, falling back to `<output_dir>/segmerge-tmp` for intermediates.
/// A fallback directory created here is removed again once the merge succeeds.
fn merge_files<R: Runner>(
    runner: &R,
    list: &MergeList,
    output_name: &str,
    input_dir: &Path,
    temp_dir: Option<PathBuf>,
    output_dir: &Path,
) -> error::Result<PathBuf> {
    let (temp_dir, owned) = match temp_dir {
        Some(dir) => (dir, false),
        None => {
            let dir = output_dir.join(TEMP_DIR_NAME);
            let existed = dir.exists();
            (dir, !existed)
        }
    };

    let output = merge::merge(runner, list, output_name, input_dir, &temp_dir, output_dir)?;

    if owned {
        if let Err(e) = fs::remove_dir(&temp_dir) {
            tracing::warn!("Could not remove {}: {}", temp_dir.display(), e);
        }
    }
    Ok(output)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let runner = ProcessRunner::new(ToolConfig::new(cli.ffmpeg, cli.ffprobe));

    match cli.command {
        Commands::Split {
            source,
            output_dir,
            segment_seconds,
        } => {
            let segments = split::split(&runner, &source, &output_dir, segment_seconds)
                .with_context(|| format!("splitting {}", source.display()))?;
            tracing::info!(
                "Wrote {} segments to {}",
                segments.len(),
                output_dir.display()
            );
        }
        Commands::Merge {
            output_name,
            files,
            input_dir,
            temp_dir,
            output_dir,
        } => {
            let list = MergeList::new(files)?;
            let output = merge_files(
                &runner,
                &list,
                &output_name,
                &input_dir,
                temp_dir,
                &output_dir,
            )
            .with_context(|| format!("merging into {}", output_name))?;
            tracing::info!("Successfully merged files into {}", output.display());
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
