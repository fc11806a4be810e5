use crate::config::DashboardConfig;
use crate::errors::{AppError, AppResult};
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Installs the process-wide JSON subscriber writing to `<data dir>/logs/dashboard.log.<date>`.
/// A second call fails because a global subscriber is already set.
pub fn init_tracing(config: &DashboardConfig) -> AppResult<()> {
    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "dashboard.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_current_span(false)
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| AppError::Internal(format!("tracing already initialized: {}", error)))
}
