//! Feishu (Lark) interactive card notifier.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{summary_fields, Notifier, NotifyError};
use crate::engine::Event;

pub struct FeishuNotifier {
    client: Client,
    webhook: String,
    user_ids: Vec<String>,
}

impl FeishuNotifier {
    pub fn new(client: Client, webhook: String, user_ids: Vec<String>) -> Self {
        Self {
            client,
            webhook,
            user_ids,
        }
    }

    /// Build the interactive card payload for an event.
    pub fn build_message(&self, event: &Event) -> Value {
        let content = summary_fields(event)
            .into_iter()
            .map(|(label, value)| format!("**{}**: {}", label, value))
            .collect::<Vec<_>>()
            .join("\n");

        let mut elements = vec![json!({
            "tag": "div",
            "text": { "tag": "lark_md", "content": content }
        })];

        if !self.user_ids.is_empty() {
            let mentions: String = self
                .user_ids
                .iter()
                .map(|id| format!("<at id={}>@user</at>", id))
                .collect();
            elements.push(json!({
                "tag": "div",
                "text": { "tag": "lark_md", "content": format!("{} Please take a look!", mentions) }
            }));
        }

        json!({
            "msg_type": "interactive",
            "card": {
                "config": { "wide_screen_mode": true },
                "header": {
                    "title": { "tag": "plain_text", "content": event.title() },
                    "template": card_color(event)
                },
                "elements": elements
            }
        })
    }
}

fn card_color(event: &Event) -> &'static str {
    match event.kind() {
        "error" => "red",
        "warning" => "orange",
        "recovery" => "green",
        _ => "blue",
    }
}

#[async_trait]
impl Notifier for FeishuNotifier {
    fn name(&self) -> &'static str {
        "feishu"
    }

    async fn notify(&self, event: &Event) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.webhook)
            .json(&self.build_message(event))
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                channel: "feishu",
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::tests::{sample_alert, sample_recovery};

    fn notifier(user_ids: Vec<String>) -> FeishuNotifier {
        FeishuNotifier::new(Client::new(), "https://open.feishu.cn/hook/test".to_string(), user_ids)
    }

    #[test]
    fn test_alert_card() {
        let message = notifier(vec![]).build_message(&sample_alert());

        assert_eq!(message["msg_type"], "interactive");
        assert_eq!(message["card"]["header"]["template"], "red");
        assert_eq!(message["card"]["header"]["title"]["content"], "API Monitor Alert: prod");

        let content = message["card"]["elements"][0]["text"]["content"].as_str().unwrap();
        assert!(content.contains("**Status Code**: 503"));
        assert!(content.contains("**URL**: https://api.example.com/health"));
        assert_eq!(message["card"]["elements"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_recovery_card_mentions_users() {
        let message = notifier(vec!["u1".to_string(), "u2".to_string()]).build_message(&sample_recovery());

        assert_eq!(message["card"]["header"]["template"], "green");
        assert_eq!(message["card"]["header"]["title"]["content"], "API Recovery: prod");

        let mention = message["card"]["elements"][1]["text"]["content"].as_str().unwrap();
        assert!(mention.contains("<at id=u1>@user</at><at id=u2>@user</at>"));
    }
}
