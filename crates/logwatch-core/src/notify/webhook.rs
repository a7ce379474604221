use super::{Notification, Notifier, NotifierSettings};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Hands the digest to a mail relay that accepts JSON over HTTP.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: Client,
    url: String,
    api_key: Option<String>,
    sender: String,
}

impl WebhookNotifier {
    pub fn new(settings: &NotifierSettings) -> Result<Self> {
        let url = settings
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| anyhow!("webhook notifier requires an endpoint"))?
            .to_string();
        let http = Client::builder()
            .user_agent("logwatch/0.3")
            .timeout(Duration::from_secs(settings.timeout_secs.unwrap_or(30)))
            .build()
            .context("failed to build notifier HTTP client")?;
        let sender = settings
            .sender
            .clone()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(default_sender);
        Ok(Self {
            http,
            url,
            api_key: settings.api_key.clone(),
            sender,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let payload = RelayMessage {
            from: &self.sender,
            reply_to: &self.sender,
            to: &notification.recipients,
            subject: &notification.subject,
            body: &notification.body,
        };
        let mut request = self.http.post(&self.url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .context("failed to reach mail relay")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("mail relay error ({}): {}", status, body);
        }
        Ok(())
    }
}

fn default_sender() -> String {
    let host = std::env::var("HOSTNAME")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        })
        .unwrap_or_else(|| "localhost".to_string());
    format!("noreply@{host}")
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    reply_to: &'a str,
    to: &'a [String],
    subject: &'a str,
    body: &'a str,
}
