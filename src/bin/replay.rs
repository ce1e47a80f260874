//! Offline replay: run one exercise tracker over a landmark recording as
//! fast as possible and print every feed event as a JSON line.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use motionaid::config::Config;
use motionaid::exercise::{ExerciseKind, ExerciseState};
use motionaid::source::{run_to_end, JsonOracle, ReplayCamera};

#[derive(Parser, Debug)]
#[command(name = "replay", about = "Evaluate an exercise over a landmark recording")]
struct Args {
    /// JSON-lines landmark recording
    recording: PathBuf,

    /// openclose | rotation | joinhands
    #[arg(long, short)]
    exercise: ExerciseKind,

    /// Config file for thresholds
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Only print the final reading
    #[arg(long)]
    summary: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let config = Config::load_or_default(&args.config);

    let mut camera = ReplayCamera::load(&args.recording, false)?;
    let mut state = ExerciseState::new(args.exercise, &config.exercise);

    let mut last = None;
    run_to_end(&mut camera, &mut JsonOracle::new(), &mut state, |event| {
        if !args.summary {
            println!("{}", event.to_json());
        }
        last = Some(event);
    })?;

    if args.summary {
        if let Some(event) = last {
            println!("{}", event.to_json());
        }
    }
    Ok(())
}
