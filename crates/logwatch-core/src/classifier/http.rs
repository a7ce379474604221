use super::{Classifier, ClassifierSettings, Verdict};
use crate::scanner::truncate_chars;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Characters forwarded per call.
const MAX_INPUT_CHARS: usize = 512;

/// Classifier backed by an inference service speaking a small JSON protocol.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    http: Client,
    classify_url: String,
    refresh_url: String,
    api_key: Option<String>,
}

impl HttpClassifier {
    pub fn new(settings: &ClassifierSettings) -> Result<Self> {
        let base = settings
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| anyhow!("http classifier requires an endpoint"))?
            .trim_end_matches('/')
            .to_string();
        let http = Client::builder()
            .user_agent("logwatch/0.3")
            .timeout(Duration::from_secs(settings.timeout_secs.unwrap_or(30)))
            .build()
            .context("failed to build classifier HTTP client")?;
        Ok(Self {
            http,
            classify_url: format!("{base}/classify"),
            refresh_url: format!("{base}/refresh"),
            api_key: settings.api_key.clone(),
        })
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.http.post(url);
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, text: &str) -> Result<Verdict> {
        let payload = ClassifyRequest {
            text: truncate_chars(text, MAX_INPUT_CHARS),
        };
        let response = self
            .post(&self.classify_url)
            .json(&payload)
            .send()
            .await
            .context("failed to call classifier service")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("classifier service error ({}): {}", status, body);
        }

        let parsed: ClassifyResponse = response
            .json()
            .await
            .context("failed to parse classifier response")?;
        Verdict::parse(&parsed.label)
            .ok_or_else(|| anyhow!("classifier returned unknown label `{}`", parsed.label))
    }

    async fn refresh(&self) -> Result<()> {
        let response = self
            .post(&self.refresh_url)
            .send()
            .await
            .context("failed to request classifier model refresh")?;
        if !response.status().is_success() {
            bail!("classifier refresh failed ({})", response.status());
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ClassifyRequest {
    text: String,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    label: String,
}
