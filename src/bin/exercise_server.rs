//! Exercise server: plays back a landmark recording through the active
//! exercise tracker and streams feed events to connected clients.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use motionaid::config::Config;
use motionaid::exercise::ExerciseKind;
use motionaid::logging;
use motionaid::server;
use motionaid::session::{Dispatcher, Pacer};
use motionaid::source::{JsonOracle, ReplayCamera};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "exercise_server", about = "MotionAid exercise tracking server")]
struct Args {
    /// Config file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Landmark recording, overrides [source].recording
    #[arg(long, value_name = "PATH")]
    recording: Option<PathBuf>,

    /// Listen address, overrides [server].listen_addr
    #[arg(long)]
    listen: Option<String>,

    /// Start this exercise right away instead of waiting for a client
    #[arg(long, value_name = "NAME")]
    exercise: Option<ExerciseKind>,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load_or_default(&args.config);

    let log_path = logging::init(&config.log.dir, "server")?;
    info!("log: {}", log_path.display());

    let recording = args
        .recording
        .unwrap_or_else(|| PathBuf::from(&config.source.recording));
    let camera = ReplayCamera::load(&recording, config.source.loop_playback)?;

    let fps = config.server.target_fps;
    let dispatcher = Arc::new(Dispatcher::new(
        Box::new(camera),
        Box::new(JsonOracle::new()),
        config.exercise.clone(),
        Pacer::interval_for_fps(fps),
        config.server.feed_capacity,
    ));

    if let Some(kind) = args.exercise {
        dispatcher.start(kind)?;
    }

    let addr = args.listen.unwrap_or(config.server.listen_addr);
    let listener = TcpListener::bind(&addr).await?;
    info!("listening on {addr} ({fps} fps)");

    tokio::select! {
        res = server::serve(listener, Arc::clone(&dispatcher)) => res?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }

    let stopped = tokio::task::spawn_blocking(move || dispatcher.stop(None)).await?;
    if let Some(kind) = stopped {
        info!("stopped {kind}");
    }
    Ok(())
}
