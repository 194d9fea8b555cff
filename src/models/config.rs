use crate::models::config_validator::validate_config;
use crate::models::error::{Result, ScanError};
use chrono_tz::Tz;
use log::info;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_MOODLE_BASE_URL: &str = "https://moodle.tau.ac.il";
pub const DEFAULT_LOGIN_URL: &str =
    "https://nidp.tau.ac.il/nidp/saml2/sso?id=10&sid=0&option=credential&sid=0";
/// Hard upper bound of a single Telegram message.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;
/// Room for the alert header, one file line and the failure alert's clip notice.
pub const MIN_MESSAGE_CHARS: usize = 256;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_state_file")]
    pub state_file: String,
    #[serde(default)]
    pub report_file: Option<String>,
    #[serde(default = "default_moodle_base_url")]
    pub moodle_base_url: String,
    #[serde(default = "default_login_url")]
    pub login_url: String,
    #[serde(default = "default_my_courses_path")]
    pub my_courses_path: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "u64_one")]
    pub fallback_lookback_hours: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_page_timeout")]
    pub page_timeout_secs: u64,
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,
    #[serde(default = "default_max_login_hops")]
    pub max_login_hops: usize,
    #[serde(default = "default_telegram_api_base")]
    pub telegram_api_base: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub login_fields: LoginFields,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default = "bool_true")]
    pub run_on_startup: bool,
}

/// Candidate `id`/`name` values for the SSO form inputs, tried in order.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginFields {
    #[serde(default = "default_user_fields")]
    pub user: Vec<String>,
    #[serde(default = "default_pid_fields")]
    pub pid: Vec<String>,
    #[serde(default = "default_password_fields")]
    pub password: Vec<String>,
}

impl Default for LoginFields {
    fn default() -> Self {
        LoginFields {
            user: default_user_fields(),
            pid: default_pid_fields(),
            password: default_password_fields(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            state_file: default_state_file(),
            report_file: None,
            moodle_base_url: default_moodle_base_url(),
            login_url: default_login_url(),
            my_courses_path: default_my_courses_path(),
            timezone: default_timezone(),
            fallback_lookback_hours: u64_one(),
            request_timeout_secs: default_request_timeout(),
            page_timeout_secs: default_page_timeout(),
            max_message_chars: default_max_message_chars(),
            max_threads: default_max_threads(),
            max_login_hops: default_max_login_hops(),
            telegram_api_base: default_telegram_api_base(),
            user_agent: default_user_agent(),
            login_fields: LoginFields::default(),
            schedule: None,
            run_on_startup: bool_true(),
        }
    }
}

impl Config {
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ScanError::InvalidTimezone(self.timezone.clone()))
    }

    pub fn my_courses_url(&self) -> String {
        format!(
            "{}/{}",
            self.moodle_base_url.trim_end_matches('/'),
            self.my_courses_path.trim_start_matches('/')
        )
    }
}

fn default_state_file() -> String {
    "last_run.json".to_string()
}
fn default_moodle_base_url() -> String {
    DEFAULT_MOODLE_BASE_URL.to_string()
}
fn default_login_url() -> String {
    DEFAULT_LOGIN_URL.to_string()
}
fn default_my_courses_path() -> String {
    "/local/mycourses/".to_string()
}
fn default_timezone() -> String {
    "Asia/Jerusalem".to_string()
}
fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) moodle_scan/0.1"
        .to_string()
}
fn default_user_fields() -> Vec<String> {
    to_strings(&["Ecom_User_ID", "Ecom_UserID", "Ecom_Username", "username", "user"])
}
fn default_pid_fields() -> Vec<String> {
    to_strings(&["Ecom_Taz", "Ecom_User_Pid", "Ecom_Pid", "pid", "tz"])
}
fn default_password_fields() -> Vec<String> {
    to_strings(&["Ecom_Password", "Ecom_Pass", "password", "pass"])
}
fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
const fn u64_one() -> u64 {
    1
}
const fn default_request_timeout() -> u64 {
    30
}
const fn default_page_timeout() -> u64 {
    40
}
const fn default_max_message_chars() -> usize {
    3800
}
const fn default_max_login_hops() -> usize {
    5
}
const fn bool_true() -> bool {
    true
}
fn default_max_threads() -> usize {
    num_cpus::get_physical()
}

/// Loads the config file, or the built-in defaults when no file is given.
pub fn setup_config(config_file: Option<String>) -> Result<Config> {
    let config = match config_file {
        Some(file) => {
            let config_path = PathBuf::from(file);
            info!("Loading config from: {}", config_path.display());

            let config_str =
                fs::read_to_string(&config_path).map_err(|cause| ScanError::ConfigRead {
                    path: config_path.clone(),
                    cause,
                })?;

            serde_json::from_str::<Config>(&config_str).map_err(|cause| {
                ScanError::ConfigParse {
                    path: config_path,
                    cause,
                }
            })?
        }
        None => {
            info!("No config file given, using built-in defaults");
            Config::default()
        }
    };

    validate_config(&config)?;

    Ok(config)
}
