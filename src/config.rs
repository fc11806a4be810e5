use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api/alerts/";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardConfig {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub debounce_ms: u64,
    pub notification_min_interval_ms: u64,
    pub notification_max_interval_ms: u64,
    pub notification_history_capacity: usize,
    pub startup_retry_delay_ms: u64,
    pub simulation_processing_ms: u64,
    pub data_dir: PathBuf,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_ms: 30_000,
            debounce_ms: 150,
            notification_min_interval_ms: 8_000,
            notification_max_interval_ms: 12_000,
            notification_history_capacity: 10,
            startup_retry_delay_ms: 3_000,
            simulation_processing_ms: 800,
            data_dir: std::env::temp_dir().join("attendance-risk-console"),
        }
    }
}

impl DashboardConfig {
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("ATTENDANCE_API_BASE_URL") {
            config.api_base_url = url;
        }
        if let Ok(dir) = std::env::var("ATTENDANCE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(raw) = std::env::var("ATTENDANCE_DEBOUNCE_MS") {
            config.debounce_ms = raw
                .trim()
                .parse()
                .map_err(|_| AppError::Validation(format!("ATTENDANCE_DEBOUNCE_MS is not a number: {}", raw)))?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.debounce_ms == 0 {
            return Err(AppError::Validation("debounce delay must be positive".to_string()));
        }
        if self.notification_min_interval_ms == 0
            || self.notification_min_interval_ms >= self.notification_max_interval_ms
        {
            return Err(AppError::Validation(format!(
                "notification interval [{}, {}) is empty",
                self.notification_min_interval_ms, self.notification_max_interval_ms
            )));
        }
        if self.notification_history_capacity == 0 {
            return Err(AppError::Validation("notification history capacity must be positive".to_string()));
        }
        if self.api_base_url.trim().is_empty() {
            return Err(AppError::Validation("api base url cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn startup_retry_delay(&self) -> Duration {
        Duration::from_millis(self.startup_retry_delay_ms)
    }

    pub fn simulation_processing(&self) -> Duration {
        Duration::from_millis(self.simulation_processing_ms)
    }

    pub fn notification_min_interval(&self) -> Duration {
        Duration::from_millis(self.notification_min_interval_ms)
    }

    pub fn notification_max_interval(&self) -> Duration {
        Duration::from_millis(self.notification_max_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join("preferences.sqlite")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}
