use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    /// No usable response: connect/timeout/TLS failure or a non-2xx status.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with `success: false`.
    #[error("{message}")]
    Api { message: String },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid date '{value}', expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error("invalid date range: {start} is after {end}")]
    InvalidRange { start: String, end: String },

    #[error("preference store error: {0}")]
    Preference(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    /// A background request task panicked or was cancelled.
    #[error("request task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ConsoleError {
    pub fn api(message: impl Into<String>) -> Self {
        ConsoleError::Api {
            message: message.into(),
        }
    }

    /// Text shown in an error notification.
    ///
    /// Server-provided messages pass through verbatim; everything else uses
    /// the `Display` form so the raw error reaches the operator.
    pub fn user_message(&self) -> String {
        match self {
            ConsoleError::Api { message } if message.is_empty() => {
                "request failed without a message".to_string()
            }
            ConsoleError::Api { message } => message.clone(),
            other => other.to_string(),
        }
    }

    /// True when the request never produced a usable envelope.
    pub fn is_transport(&self) -> bool {
        matches!(self, ConsoleError::Transport(_))
    }
}
