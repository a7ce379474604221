mod webhook;

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

pub use webhook::WebhookNotifier;

pub const DEFAULT_SUBJECT: &str = "LogWatcher Alert";

/// One outbound digest message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub recipients: Vec<String>,
}

/// Port for delivering a digest. Delivery is attempted once; callers log failures.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Emits the digest through the operational log instead of delivering it.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        info!(
            subject = %notification.subject,
            recipients = %notification.recipients.join(", "),
            "digest (not delivered)\n{}",
            notification.body
        );
        Ok(())
    }
}

/// Delivery settings for the notification sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierSettings {
    /// `log` (default) or `webhook`.
    pub provider: String,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Sender address; defaults to `noreply@<hostname>`.
    pub sender: Option<String>,
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            provider: "log".into(),
            endpoint: None,
            api_key: None,
            timeout_secs: None,
            sender: None,
        }
    }
}

/// Build the notifier named by `settings.provider`.
pub fn build_notifier(settings: &NotifierSettings) -> Result<Arc<dyn Notifier>> {
    match settings.provider.to_ascii_lowercase().as_str() {
        "log" => Ok(Arc::new(LogNotifier)),
        "webhook" => Ok(Arc::new(WebhookNotifier::new(settings)?)),
        other => bail!("unsupported notifier provider `{other}` (expected log or webhook)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let notification = Notification {
            subject: DEFAULT_SUBJECT.into(),
            body: "File: a.log\n1: ERROR".into(),
            recipients: vec!["ops@example.com".into()],
        };
        LogNotifier.send(&notification).await.unwrap();
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let settings = NotifierSettings {
            provider: "pigeon".into(),
            ..NotifierSettings::default()
        };
        let err = build_notifier(&settings).err().expect("should reject provider");
        assert!(err.to_string().contains("pigeon"));
    }
}
