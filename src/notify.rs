//! Notify capability: best-effort delivery of a rendered message to one
//! destination channel, with optional inline-keyboard markup.

use crate::error::RelayError;
use crate::models::Scheme;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        destination: &str,
        text: &str,
        markup: Option<Value>,
    ) -> Result<(), RelayError>;
}

/// Telegram Bot API `sendMessage` transport.
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder().timeout(NOTIFY_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_base: format!("https://api.telegram.org/bot{bot_token}"),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(
        &self,
        destination: &str,
        text: &str,
        markup: Option<Value>,
    ) -> Result<(), RelayError> {
        let mut body = json!({
            "chat_id": destination,
            "text": text,
            "parse_mode": "Markdown",
        });
        if let Some(markup) = markup {
            body["reply_markup"] = markup;
        }

        self.client
            .post(format!("{}/sendMessage", self.api_base))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Inline keyboard attached to every relayed link: copy and share actions
/// addressed by fingerprint, plus a deep link into the client app.
pub fn share_keyboard(config: &str, fp: &str) -> Value {
    let scheme = Scheme::classify(config);
    let deep_link: String = config.chars().take(100).collect();
    json!({
        "inline_keyboard": [
            [{
                "text": format!("📋 Copy {} Config", scheme.as_str().to_uppercase()),
                "callback_data": format!("copy_{fp}"),
            }],
            [
                {"text": "📤 Share", "callback_data": format!("share_{fp}")},
                {"text": "📱 Open in App", "url": format!("https://t.me/share/url?url={deep_link}")},
            ],
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyboard_addresses_actions_by_fingerprint() {
        let kb = share_keyboard("vless://u@h:443", "abc123");
        let rows = kb["inline_keyboard"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0]["callback_data"], "copy_abc123");
        assert_eq!(rows[1][0]["callback_data"], "share_abc123");
        assert!(rows[0][0]["text"].as_str().unwrap().contains("VLESS"));
    }

    #[test]
    fn deep_link_is_truncated_to_100_chars() {
        let long = format!("trojan://{}@h:443", "x".repeat(200));
        let kb = share_keyboard(&long, "fp");
        let url = kb["inline_keyboard"][1][1]["url"].as_str().unwrap();
        let encoded = url.strip_prefix("https://t.me/share/url?url=").unwrap();
        assert_eq!(encoded.chars().count(), 100);
    }
}
