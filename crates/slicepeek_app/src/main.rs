//! Slicepeek - embedded preview extractor for slicer output.
//!
//! Reads a 3MF, G-code or binary G-code file and writes its preview as PNG.

mod commands;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "slicepeek")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Slicer output file (.3mf, .gcode, .gco, .bgcode)
    input: PathBuf,

    /// Where to write the PNG preview [default: <input>.thumbnail.png]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Shrink the preview to fit in a square of this many pixels
    #[arg(short = 's', long)]
    max_size: Option<u32>,

    /// Treat the input as this file type instead of using its extension
    #[arg(short = 't', long = "type")]
    file_type: Option<String>,

    /// Skip binary G-code thumbnails whose CRC32 does not match
    #[arg(long, default_value_t = false)]
    verify_checksums: bool,

    /// List every embedded preview instead of extracting one
    #[arg(short, long, default_value_t = false)]
    list: bool,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.list {
        commands::run_list(&args)
    } else {
        commands::run_extract(&args)
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
