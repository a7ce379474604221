use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use logwatch_core::{ClassifierSettings, NotifierSettings};
use serde::Deserialize;

/// Service-level settings, fixed for the lifetime of the process.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub watch_config: PathBuf,
    pub default_patterns: PathBuf,
    pub custom_patterns: PathBuf,
    pub exclusions: PathBuf,
    pub log_dir: PathBuf,
    pub export_dir: PathBuf,
    /// humantime duration, e.g. `1h` or `30m`.
    pub refresh_interval: String,
    pub classifier: Option<ClassifierSettings>,
    pub notifier: NotifierSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            watch_config: PathBuf::from("config.txt"),
            default_patterns: PathBuf::from("patterns/default.txt"),
            custom_patterns: PathBuf::from("patterns/custom.txt"),
            exclusions: PathBuf::from("patterns/exclusions.txt"),
            log_dir: PathBuf::from("logs"),
            export_dir: PathBuf::from("exports"),
            refresh_interval: "1h".into(),
            classifier: None,
            notifier: NotifierSettings::default(),
        }
    }
}

impl AppSettings {
    /// Layer an optional settings file under `LOGWATCH_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix("LOGWATCH")
                .prefix_separator("_")
                .separator("__"),
        );
        let config = builder.build().with_context(|| match path {
            Some(path) => format!("failed to load settings from {}", path.display()),
            None => "failed to load settings from environment".to_string(),
        })?;
        config
            .try_deserialize()
            .context("invalid logwatch settings")
    }

    pub fn refresh_interval(&self) -> Result<Duration> {
        humantime::parse_duration(&self.refresh_interval).with_context(|| {
            format!("invalid refresh_interval `{}`", self.refresh_interval)
        })
    }

    /// Settings-file classifier section, falling back to `LOGWATCH_CLASSIFIER_*`.
    pub fn classifier_settings(&self) -> Result<ClassifierSettings> {
        match &self.classifier {
            Some(settings) => Ok(settings.clone()),
            None => ClassifierSettings::from_env(),
        }
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.log_dir.join("matches.log")
    }

    pub fn operational_log_path(&self) -> PathBuf {
        self.log_dir.join("logwatch.log")
    }
}
