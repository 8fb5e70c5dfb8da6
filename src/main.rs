//! Print the contents of a dcd trajectory.
//!
//! By Marieke Westendorp, 2024.
//! <ma3ke.cyber@gmail.com>
use std::error::Error as _;
use std::io::{BufWriter, Write};
use std::num::{NonZeroUsize, ParseIntError};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use dcd::{DcdReader, Frame, Options};

/// A `start:stop:step` frame selection. Each component is optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameRange {
    start: usize,
    stop: Option<usize>,
    step: NonZeroUsize,
}

impl FrameRange {
    fn includes(&self, idx: usize) -> bool {
        idx >= self.start
            && self.stop.map_or(true, |stop| idx < stop)
            && (idx - self.start) % self.step == 0
    }

    /// Whether no index at or after `idx` can be included anymore.
    fn is_done(&self, idx: usize) -> bool {
        self.stop.is_some_and(|stop| idx >= stop)
    }
}

impl Default for FrameRange {
    fn default() -> Self {
        Self {
            start: 0,
            stop: None,
            step: NonZeroUsize::MIN,
        }
    }
}

fn frame_range_parser(selection: &str) -> Result<FrameRange, ParseIntError> {
    let mut components = selection.split(':').map(|s| s.trim());
    let mut next = || components.next().filter(|s| !s.is_empty());
    let start = next().map(|s| s.parse()).transpose()?;
    let stop = next().map(|s| s.parse()).transpose()?;
    let step = next().map(|s| s.parse()).transpose()?;
    Ok(FrameRange {
        start: start.unwrap_or_default(),
        stop,
        step: step.unwrap_or(NonZeroUsize::MIN),
    })
}

/// Print the metadata and coordinates of a dcd trajectory.
#[derive(Parser)]
struct Args {
    /// Input path (dcd).
    input: PathBuf,

    /// Only print the metadata.
    #[arg(short, long)]
    summary: bool,

    /// Frame selection in the format `start:stop:step`. Each of these values optional.
    ///
    /// - `:100` will select the first 100 frames.
    ///
    /// - `3:14` will select the 4th up to and including the 14th frames, 11 frames in total.
    ///
    /// - `::2` will select every second frame.
    #[arg(short, long, value_parser = frame_range_parser)]
    frames: Option<FrameRange>,

    /// Fail on recoverable anomalies instead of warning about them.
    #[arg(long)]
    strict: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> dcd::Result<()> {
    let options = Options {
        strict: args.strict,
    };
    let mut reader = DcdReader::open_with(&args.input, options)?;

    let mut stdout = BufWriter::new(std::io::stdout().lock());
    writeln!(stdout, "{}", reader.metadata())?;
    if args.summary {
        stdout.flush()?;
        return Ok(());
    }

    let range = args.frames.unwrap_or_default();
    let mut frame = Frame::default();
    // Frames cannot be skipped: fixed-atom frames are reconstructed from the first one.
    while !range.is_done(reader.step()) {
        let idx = reader.step();
        if !reader.read_frame(&mut frame)? {
            break;
        }
        if range.includes(idx) {
            print_frame(&mut stdout, idx, &frame)?;
        }
    }

    stdout.flush()?;
    Ok(())
}

fn print_frame(out: &mut impl Write, idx: usize, frame: &Frame) -> std::io::Result<()> {
    writeln!(out, "Frame {idx} coordinates")?;
    for (j, pos) in frame.coords().enumerate() {
        writeln!(out, "({j})\t\t\t{}\t\t{}\t\t{}", pos.x, pos.y, pos.z)?;
    }
    Ok(())
}
