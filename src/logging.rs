use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Where the log file lives: the platform data dir, or the working directory.
pub fn log_path() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobtrack") {
        proj_dirs.data_dir().join("jobtrack.log")
    } else {
        PathBuf::from("jobtrack.log")
    }
}

fn open_log_file(path: &PathBuf) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber. Logs go to a file because the browse view
/// owns the terminal; stderr is the fallback. Returns the file path when one
/// is in use.
pub fn init(config: &Config) -> Option<PathBuf> {
    let filter = EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| EnvFilter::new("jobtrack=info"));

    let path = log_path();
    match open_log_file(&path) {
        Ok(file) => {
            let installed = tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .try_init()
                .is_ok();
            installed.then_some(path)
        }
        Err(err) => {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init();
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "could not open log file; logging to stderr"
            );
            None
        }
    }
}
