//! Log routing. The client's own modules follow `--log-level`; dependencies
//! stay at `warn` (or quieter) unless `--log-wire` opens up the HTTP stack.

use std::fs::OpenOptions;
use std::path::PathBuf;

use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;

/// Replaces the generated directives, e.g. `gridview::stream=trace,hyper=info`.
pub const FILTER_ENV: &str = "GRIDVIEW_LOG_FILTER";

/// Used when `--log-file` is given without a path.
pub const DEFAULT_LOG_FILE: &str = "gridview.log";

const CLIENT_TARGETS: [&str; 2] = ["gridview", "grid_sync"];
const WIRE_TARGETS: [&str; 2] = ["reqwest", "hyper"];

#[derive(Clone, Debug)]
pub struct LogConfig {
    pub level: LevelFilter,
    pub file: Option<PathBuf>,
    /// Request and connection logging from the HTTP client.
    pub wire: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::WARN,
            file: None,
            wire: false,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("failed to open log file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid log filter {directives:?}: {source}")]
    Filter {
        directives: String,
        source: ParseError,
    },
    #[error("failed to install logger: {0}")]
    Install(String),
}

/// Directives for `level` on the client modules. Everything else is capped
/// at `warn`.
pub fn client_filter(level: LevelFilter, wire: bool) -> String {
    let name = level.to_string().to_ascii_lowercase();
    let base = level.min(LevelFilter::WARN).to_string().to_ascii_lowercase();
    let mut directives = vec![base];
    directives.extend(CLIENT_TARGETS.iter().map(|target| format!("{target}={name}")));
    if wire {
        directives.extend(WIRE_TARGETS.iter().map(|target| format!("{target}=debug")));
    }
    directives.join(",")
}

fn env_filter(config: &LogConfig) -> Result<EnvFilter, InitError> {
    let directives = match std::env::var(FILTER_ENV) {
        Ok(custom) if !custom.trim().is_empty() => custom,
        _ => client_filter(config.level, config.wire),
    };
    EnvFilter::try_new(&directives).map_err(|source| InitError::Filter { directives, source })
}

/// Installs the global subscriber. Buffered lines are flushed when the
/// returned guard drops, so keep it alive for the whole run.
pub fn init(config: &LogConfig) -> Result<WorkerGuard, InitError> {
    let filter = env_filter(config)?;
    let (writer, guard) = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| InitError::Io {
                    path: path.clone(),
                    source,
                })?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.level >= LevelFilter::DEBUG || config.wire)
        .with_ansi(config.file.is_none())
        .with_writer(writer)
        .try_init()
        .map_err(|err| InitError::Install(err.to_string()))?;
    Ok(guard)
}
