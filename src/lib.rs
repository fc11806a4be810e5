pub mod cache;
pub mod cascade;
pub mod config;
pub mod criteria;
pub mod dashboard;
pub mod debounce;
pub mod errors;
pub mod insights;
pub mod jitter;
pub mod models;
pub mod notifications;
pub mod preferences;
pub mod risk_tables;
pub mod service;
pub mod simulation;
pub mod state;
pub mod telemetry;

pub use crate::config::DashboardConfig;
pub use crate::dashboard::{Dashboard, DashboardEvent};
pub use crate::errors::{AppError, AppResult};
pub use crate::service::{DataService, HttpDataService};
pub use crate::state::{DashboardState, ErrorSlot, StartupPhase};

use tokio::sync::watch;

/// Production entry point for an embedding host: logging, HTTP backend, SQLite preferences,
/// then startup behind the credential gate.
///
/// Must be called inside a Tokio runtime. Startup runs in the background; subscribe to the
/// returned dashboard for `StartupSettled`.
pub fn launch(
    config: DashboardConfig,
    bearer_token: Option<&str>,
    credentials: watch::Receiver<bool>,
) -> AppResult<Dashboard> {
    telemetry::init_tracing(&config)?;
    let dashboard = Dashboard::from_config(config, bearer_token)?;
    tracing::info!(base_url = %dashboard.config().api_base_url, "dashboard session created");

    let starting = dashboard.clone();
    tokio::spawn(async move {
        if let Err(error) = starting.start(credentials).await {
            tracing::error!(error = %error, "dashboard startup aborted");
        }
    });
    Ok(dashboard)
}
