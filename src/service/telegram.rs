use crate::models::error::{Result, ScanError};
use crate::models::secrets::TelegramTarget;
use crate::service::notify::Notifier;
use log::{debug, info};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends messages through the Bot API `sendMessage` method.
pub struct TelegramNotifier {
    client: Client,
    /// Contains the bot token; never log it.
    endpoint: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(api_base: &str, target: &TelegramTarget, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ScanError::HttpClient)?;
        Ok(TelegramNotifier {
            client,
            endpoint: send_message_endpoint(api_base, &target.bot_token),
            chat_id: target.chat_id.clone(),
        })
    }
}

impl Notifier for TelegramNotifier {
    fn send(&self, text: &str) -> Result<()> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
            disable_web_page_preview: true,
        };
        debug!("Sending {} characters to chat {}", text.chars().count(), self.chat_id);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .map_err(|e| ScanError::Telegram(e.without_url().to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| ScanError::Telegram(e.without_url().to_string()))?;

        check_response(status, &body)?;
        info!("Telegram accepted the message");
        Ok(())
    }
}

fn send_message_endpoint(api_base: &str, token: &str) -> String {
    format!("{}/bot{}/sendMessage", api_base.trim_end_matches('/'), token)
}

fn check_response(status: u16, body: &str) -> Result<()> {
    match serde_json::from_str::<ApiResponse>(body) {
        Ok(ApiResponse { ok: true, .. }) => Ok(()),
        Ok(ApiResponse { description, .. }) => Err(ScanError::Telegram(format!(
            "HTTP {}: {}",
            status,
            description.unwrap_or_else(|| "no description".to_string())
        ))),
        Err(_) => Err(ScanError::Telegram(format!(
            "HTTP {}: unexpected response body",
            status
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        assert_eq!(
            send_message_endpoint("https://api.telegram.org/", "123:abc"),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn test_payload_keeps_hebrew_literal() {
        let payload = SendMessage {
            chat_id: "-1001",
            text: "📌 עדכונים במודל",
            disable_web_page_preview: true,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(
            json,
            r#"{"chat_id":"-1001","text":"📌 עדכונים במודל","disable_web_page_preview":true}"#
        );
    }

    #[test]
    fn test_check_response() {
        assert!(check_response(200, r#"{"ok":true,"result":{"message_id":1}}"#).is_ok());

        let err = check_response(400, r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("chat not found"));

        let err = check_response(502, "<html>Bad Gateway</html>").unwrap_err();
        assert!(err.to_string().contains("HTTP 502"));
    }

    #[test]
    fn test_new_builds_endpoint_and_chat() {
        let target = TelegramTarget {
            bot_token: "123:abc".to_string(),
            chat_id: "-1001".to_string(),
        };
        let notifier =
            TelegramNotifier::new("https://api.telegram.org", &target, Duration::from_secs(5))
                .unwrap();
        assert_eq!(notifier.chat_id, "-1001");
        assert!(notifier.endpoint.ends_with("/bot123:abc/sendMessage"));
    }
}
