use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppError {
    #[error("VALIDATION: {0}")]
    Validation(String),
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("WARMING_UP: {0}")]
    WarmingUp(String),
    #[error("TRANSPORT: {0}")]
    Transport(String),
    #[error("REQUEST: {0}")]
    Request(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl AppError {
    /// The backend answered but is still loading its models; callers retry instead of surfacing.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::WarmingUp(_))
    }

    /// Message without the code prefix, suitable for an error banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message)
            | Self::NotFound(message)
            | Self::WarmingUp(message)
            | Self::Transport(message)
            | Self::Request(message)
            | Self::Io(message)
            | Self::Internal(message) => message.clone(),
        }
    }

    /// Maps an HTTP failure to the taxonomy. An upstream `detail` always wins.
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        if let Some(detail) = detail.filter(|value| !value.trim().is_empty()) {
            return match status {
                404 => Self::NotFound(detail),
                503 => Self::WarmingUp(detail),
                _ => Self::Request(detail),
            };
        }
        match status {
            404 => Self::NotFound("No data found for the selected filters.".to_string()),
            503 => Self::WarmingUp("Server is still initializing. Please try again in a moment.".to_string()),
            _ => Self::Request(format!("Server error: {}", status)),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(value: reqwest::Error) -> Self {
        if let Some(status) = value.status() {
            return Self::from_status(status.as_u16(), None);
        }
        if value.is_connect() || value.is_timeout() || value.is_request() {
            return Self::Transport("No response from server. Please check your connection.".to_string());
        }
        Self::Request(format!("Request error: {}", value))
    }
}

pub type AppResult<T> = Result<T, AppError>;
