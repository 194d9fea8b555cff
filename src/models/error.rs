use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to read config file '{path}': {cause}")]
    ConfigRead { path: PathBuf, cause: io::Error },

    #[error("Failed to parse config file '{path}': {cause}")]
    ConfigParse {
        path: PathBuf,
        cause: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Missing Moodle secrets: {0}")]
    MissingSecrets(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("Request to '{url}' failed: {cause}")]
    Request { url: String, cause: reqwest::Error },

    #[error("Request to '{url}' returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Moodle login failed: {0}")]
    LoginFailed(String),

    #[error("Failed to read state file '{path}': {cause}")]
    StateRead { path: PathBuf, cause: io::Error },

    #[error("Failed to parse state file '{path}': {cause}")]
    StateParse {
        path: PathBuf,
        cause: serde_json::Error,
    },

    #[error("State file '{path}' has no usable last_run_iso")]
    StateMissingTimestamp { path: PathBuf },

    #[error("Failed to write state file '{path}': {cause}")]
    StateWrite { path: PathBuf, cause: io::Error },

    #[error("Failed to write report file '{path}': {cause}")]
    ReportWrite { path: PathBuf, cause: io::Error },

    #[error("Telegram API error: {0}")]
    Telegram(String),

    #[error("Unknown time zone '{0}'")]
    InvalidTimezone(String),

    #[error("Invalid cron expression '{expression}': {cause}")]
    InvalidSchedule {
        expression: String,
        cause: cron::error::Error,
    },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ScanError>;
