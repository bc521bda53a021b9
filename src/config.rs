use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::errors::ConsoleError;
use crate::models::user::Role;

#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the management API, e.g. `https://console.example.com`.
    pub base_url: Url,
    /// Sent as `Authorization: Bearer <token>` when present.
    pub access_token: Option<String>,
    /// Role of the signed-in operator. The server still enforces access;
    /// this only decides which controls the console offers.
    pub role: Role,
    /// JSON file holding per-view page size preferences.
    pub prefs_path: PathBuf,
    /// Quiet period before a user lookup keystroke triggers a request.
    /// Set via CONSOLE_LOOKUP_DEBOUNCE_MS. Default: 300.
    pub lookup_debounce: Duration,
    /// Total request timeout. Set via CONSOLE_HTTP_TIMEOUT_SECS. Default: 30.
    pub http_timeout: Duration,
}

impl Config {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            access_token: None,
            role: Role::Common,
            prefs_path: PathBuf::from(".token-console.json"),
            lookup_debounce: Duration::from_millis(300),
            http_timeout: Duration::from_secs(30),
        }
    }
}

pub fn load() -> Result<Config, ConsoleError> {
    dotenvy::dotenv().ok();

    let raw_url =
        std::env::var("CONSOLE_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".into());
    let base_url = parse_base_url(&raw_url)?;

    let role = match std::env::var("CONSOLE_ROLE") {
        Ok(v) => v
            .parse::<Role>()
            .map_err(|_| ConsoleError::Config(format!("unknown CONSOLE_ROLE '{}'", v)))?,
        Err(_) => Role::Common,
    };

    Ok(Config {
        base_url,
        access_token: std::env::var("CONSOLE_ACCESS_TOKEN")
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()),
        role,
        prefs_path: std::env::var("CONSOLE_PREFS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".token-console.json")),
        lookup_debounce: Duration::from_millis(
            std::env::var("CONSOLE_LOOKUP_DEBOUNCE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
        ),
        http_timeout: Duration::from_secs(
            std::env::var("CONSOLE_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        ),
    })
}

/// Parse and validate the API root. Only http(s) is accepted.
pub fn parse_base_url(raw: &str) -> Result<Url, ConsoleError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConsoleError::Config(format!("invalid base url '{}': {}", raw, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConsoleError::Config(format!(
            "base url must be http or https, got '{}'",
            url.scheme()
        )));
    }
    Ok(url)
}
