use crate::models::error::{Result, ScanError};

/// Credentials used for the SSO form.
#[derive(Debug, Clone, Default)]
pub struct MoodleCredentials {
    pub username: String,
    pub user_id: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct TelegramTarget {
    pub bot_token: String,
    pub chat_id: String,
}

/// Everything that must not live in the config file.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub credentials: MoodleCredentials,
    /// Value of an existing `MoodleSession` cookie; skips the SSO form when still valid.
    pub session_cookie: Option<String>,
    pub telegram: Option<TelegramTarget>,
}

impl Secrets {
    pub fn new(
        username: Option<String>,
        user_id: Option<String>,
        password: Option<String>,
        session_cookie: Option<String>,
        bot_token: Option<String>,
        chat_id: Option<String>,
    ) -> Self {
        let telegram = match (non_blank(bot_token), non_blank(chat_id)) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramTarget { bot_token, chat_id }),
            _ => None,
        };
        Secrets {
            credentials: MoodleCredentials {
                username: non_blank(username).unwrap_or_default(),
                user_id: non_blank(user_id).unwrap_or_default(),
                password: non_blank(password).unwrap_or_default(),
            },
            session_cookie: non_blank(session_cookie),
            telegram,
        }
    }

    pub fn has_login(&self) -> bool {
        let c = &self.credentials;
        !c.username.is_empty() && !c.user_id.is_empty() && !c.password.is_empty()
    }

    /// A run needs either the full login triple or a session cookie.
    pub fn validate(&self) -> Result<()> {
        if self.has_login() || self.session_cookie.is_some() {
            return Ok(());
        }
        Err(ScanError::MissingSecrets(
            "MOODLE_USERNAME / MOODLE_USER_ID / MOODLE_PASSWORD (or MOODLE_SESSION)".to_string(),
        ))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
