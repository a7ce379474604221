mod http;
mod settings;

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use http::HttpClassifier;
pub use settings::ClassifierSettings;

/// Binary judgement on whether a matched line is a real issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    TruePositive,
    FalsePositive,
}

impl Verdict {
    pub fn is_true_positive(self) -> bool {
        matches!(self, Self::TruePositive)
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "true_positive" => Some(Self::TruePositive),
            "false_positive" => Some(Self::FalsePositive),
            _ => None,
        }
    }
}

/// Port to the (slow, remote) model that separates real issues from benign matches.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Judge one piece of text. Called at most once per matched or candidate line.
    async fn classify(&self, text: &str) -> Result<Verdict>;

    /// Refresh whatever asset backs the classifier. Blocks until done.
    async fn refresh(&self) -> Result<()> {
        Ok(())
    }
}

/// Used when no inference service is configured: every candidate is reported.
#[derive(Debug, Default, Clone)]
pub struct NoopClassifier;

#[async_trait]
impl Classifier for NoopClassifier {
    async fn classify(&self, _text: &str) -> Result<Verdict> {
        Ok(Verdict::TruePositive)
    }
}

/// Build the classifier named by `settings.provider`.
pub fn build_classifier(settings: &ClassifierSettings) -> Result<Arc<dyn Classifier>> {
    match settings.provider.to_ascii_lowercase().as_str() {
        "noop" => Ok(Arc::new(NoopClassifier)),
        "http" => Ok(Arc::new(HttpClassifier::new(settings)?)),
        other => bail!("unsupported classifier provider `{other}` (expected noop or http)"),
    }
}
