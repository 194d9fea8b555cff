use crate::models::config::{Config, LoginFields, MIN_MESSAGE_CHARS, TELEGRAM_MESSAGE_LIMIT};
use crate::models::error::{Result, ScanError};
use log::{info, warn};
use reqwest::Url;
use std::fs;
use std::path::Path;
use std::str::FromStr;

const MAX_LOOKBACK_HOURS: u64 = 24 * 366;

/// Validates the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    info!("Validating configuration...");

    validate_numeric_values(config)?;

    validate_urls(config)?;

    config.tz()?;

    validate_output_path("state_file", &config.state_file)?;
    if let Some(report_file) = &config.report_file {
        validate_output_path("report_file", report_file)?;
    }

    validate_login_fields(&config.login_fields)?;

    validate_schedule(config)?;

    info!("Configuration validation passed");
    Ok(())
}

fn validate_numeric_values(config: &Config) -> Result<()> {
    let must_be_positive = [
        ("max_threads", config.max_threads as u64),
        ("request_timeout_secs", config.request_timeout_secs),
        ("page_timeout_secs", config.page_timeout_secs),
        ("max_message_chars", config.max_message_chars as u64),
        ("max_login_hops", config.max_login_hops as u64),
    ];
    for (name, value) in must_be_positive {
        if value == 0 {
            return Err(ScanError::ConfigInvalid(format!(
                "{} must be greater than 0",
                name
            )));
        }
    }

    if config.max_message_chars > TELEGRAM_MESSAGE_LIMIT {
        return Err(ScanError::ConfigInvalid(format!(
            "max_message_chars ({}) exceeds the Telegram limit of {} characters",
            config.max_message_chars, TELEGRAM_MESSAGE_LIMIT
        )));
    }

    if config.max_message_chars < MIN_MESSAGE_CHARS {
        return Err(ScanError::ConfigInvalid(format!(
            "max_message_chars ({}) must be at least {}",
            config.max_message_chars, MIN_MESSAGE_CHARS
        )));
    }

    if config.fallback_lookback_hours > MAX_LOOKBACK_HOURS {
        return Err(ScanError::ConfigInvalid(format!(
            "fallback_lookback_hours ({}) must not exceed {}",
            config.fallback_lookback_hours, MAX_LOOKBACK_HOURS
        )));
    }

    let cpu_count = num_cpus::get_physical();
    if config.max_threads > cpu_count * 2 {
        warn!(
            "max_threads ({}) is more than 2x the number of physical CPUs ({}). Probes are I/O bound, so this is usually fine.",
            config.max_threads, cpu_count
        );
    }

    Ok(())
}

fn validate_urls(config: &Config) -> Result<()> {
    let urls = [
        ("moodle_base_url", config.moodle_base_url.as_str()),
        ("login_url", config.login_url.as_str()),
        ("telegram_api_base", config.telegram_api_base.as_str()),
    ];
    for (name, value) in urls {
        let url = Url::parse(value).map_err(|e| {
            ScanError::ConfigInvalid(format!("{} is not a valid URL: {}\nError: {}", name, value, e))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ScanError::ConfigInvalid(format!(
                "{} must use http or https: {}",
                name, value
            )));
        }
        if url.host_str().is_none() {
            return Err(ScanError::ConfigInvalid(format!(
                "{} has no host: {}",
                name, value
            )));
        }
    }
    Ok(())
}

/// The file itself may be missing; its parent directory must exist and be writable.
fn validate_output_path(name: &str, file: &str) -> Result<()> {
    if file.trim().is_empty() {
        return Err(ScanError::ConfigInvalid(format!("{} cannot be empty", name)));
    }

    let path = Path::new(file);
    if path.is_dir() {
        return Err(ScanError::ConfigInvalid(format!(
            "{} points to a directory: {}",
            name, file
        )));
    }

    let parent = match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Path::new("."),
        Some(parent) => parent,
        None => {
            return Err(ScanError::ConfigInvalid(format!(
                "{} has no parent directory: {}",
                name, file
            )))
        }
    };

    if !parent.exists() {
        #[cfg(windows)]
        let suggestion = format!("mkdir \"{}\"", parent.display());
        #[cfg(not(windows))]
        let suggestion = format!("mkdir -p \"{}\"", parent.display());

        return Err(ScanError::ConfigInvalid(format!(
            "{} parent directory does not exist: {}\nSuggestion: Create the directory with: {}",
            name, file, suggestion
        )));
    }

    if let Err(e) = check_writable(parent) {
        return Err(ScanError::ConfigInvalid(format!(
            "{} parent directory is not writable: {}\nError: {}",
            name, file, e
        )));
    }

    Ok(())
}

fn validate_login_fields(fields: &LoginFields) -> Result<()> {
    if fields.password.is_empty() {
        return Err(ScanError::ConfigInvalid(
            "login_fields.password needs at least one candidate".to_string(),
        ));
    }
    if fields.user.is_empty() && fields.pid.is_empty() {
        warn!("login_fields.user and login_fields.pid are both empty; only the password will be filled");
    }
    Ok(())
}

fn validate_schedule(config: &Config) -> Result<()> {
    if let Some(expression) = &config.schedule {
        match cron::Schedule::from_str(expression) {
            Ok(_) => info!("Schedule validated: {}", expression),
            Err(cause) => {
                return Err(ScanError::InvalidSchedule {
                    expression: expression.clone(),
                    cause,
                })
            }
        }
    }
    Ok(())
}

fn check_writable(path: &Path) -> std::io::Result<()> {
    let test_file = path.join(".moodle_scan_write_test");
    fs::write(&test_file, b"test")?;
    fs::remove_file(&test_file)?;
    Ok(())
}
