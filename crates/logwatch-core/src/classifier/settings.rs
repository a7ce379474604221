use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Connection details for the classifier service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub provider: String,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            provider: "noop".into(),
            endpoint: None,
            api_key: None,
            timeout_secs: None,
        }
    }
}

impl ClassifierSettings {
    const PROVIDER_ENV: &'static str = "LOGWATCH_CLASSIFIER_PROVIDER";
    const ENDPOINT_ENV: &'static str = "LOGWATCH_CLASSIFIER_ENDPOINT";
    const API_KEY_ENV: &'static str = "LOGWATCH_CLASSIFIER_API_KEY";
    const TIMEOUT_ENV: &'static str = "LOGWATCH_CLASSIFIER_TIMEOUT_SECS";

    /// Load settings from environment variables.
    ///
    /// * `LOGWATCH_CLASSIFIER_PROVIDER`: `noop` (default) or `http`.
    /// * `LOGWATCH_CLASSIFIER_ENDPOINT`: base URL, required for `http`.
    /// * `LOGWATCH_CLASSIFIER_API_KEY`: optional bearer token.
    /// * `LOGWATCH_CLASSIFIER_TIMEOUT_SECS`: request timeout, 30 when unset.
    pub fn from_env() -> Result<Self> {
        Self::from_map(std::env::vars().collect())
    }

    fn from_map(vars: HashMap<String, String>) -> Result<Self> {
        let non_blank = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let provider = non_blank(Self::PROVIDER_ENV).unwrap_or_else(|| "noop".to_string());
        let endpoint = non_blank(Self::ENDPOINT_ENV);
        if provider.eq_ignore_ascii_case("http") && endpoint.is_none() {
            bail!(
                "environment variable {} must be set when the http classifier is selected",
                Self::ENDPOINT_ENV
            );
        }
        let timeout_secs = non_blank(Self::TIMEOUT_ENV).and_then(|v| v.parse::<u64>().ok());

        Ok(Self {
            provider,
            endpoint,
            api_key: non_blank(Self::API_KEY_ENV),
            timeout_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_to_noop_provider() {
        let settings = ClassifierSettings::from_map(HashMap::new()).unwrap();
        assert_eq!(settings, ClassifierSettings::default());
    }

    #[test]
    fn http_requires_endpoint() {
        let err = ClassifierSettings::from_map(vars(&[(ClassifierSettings::PROVIDER_ENV, "http")]))
            .expect_err("missing endpoint should error");
        assert!(err.to_string().contains(ClassifierSettings::ENDPOINT_ENV));
    }

    #[test]
    fn parses_full_http_settings() {
        let settings = ClassifierSettings::from_map(vars(&[
            (ClassifierSettings::PROVIDER_ENV, "http"),
            (ClassifierSettings::ENDPOINT_ENV, " http://localhost:9000 "),
            (ClassifierSettings::API_KEY_ENV, "secret"),
            (ClassifierSettings::TIMEOUT_ENV, "45"),
        ]))
        .unwrap();
        assert_eq!(settings.provider, "http");
        assert_eq!(settings.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(settings.api_key.as_deref(), Some("secret"));
        assert_eq!(settings.timeout_secs, Some(45));
    }

    #[test]
    fn unparsable_timeout_is_ignored() {
        let settings =
            ClassifierSettings::from_map(vars(&[(ClassifierSettings::TIMEOUT_ENV, "soon")]))
                .unwrap();
        assert!(settings.timeout_secs.is_none());
    }
}
