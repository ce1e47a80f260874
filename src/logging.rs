use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// `<dir>/<name>_YYYYmmdd_HHMMSS.log`
pub fn log_file_path(dir: &Path, name: &str) -> PathBuf {
    let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("{name}_{ts}.log"))
}

/// Log to stderr and to a fresh timestamped file under `dir`.
/// `RUST_LOG` overrides the default `info` filter.
pub fn init(dir: &str, name: &str) -> Result<PathBuf> {
    let dir = Path::new(dir);
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = log_file_path(dir, name);
    let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_ansi(false)
        .with_writer(std::io::stderr.and(Mutex::new(file)))
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install logger: {e}"))?;

    Ok(path)
}
