use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    audit::AuditLog,
    classifier::Classifier,
    config::{WatchConfig, DEFAULT_SCAN_INTERVAL},
    digest::{build_digest, DigestOptions},
    export::RecordExporter,
    notify::{Notification, Notifier},
    scanner::{
        exclusion::ExclusionFilter, file_scanner::FileScanner, patterns::PatternSet, FsReader,
        ScanResult, SourceReader,
    },
};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The end-of-cycle pause.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Applies the `debug` config key to the running log filter.
pub trait VerbosityControl: Send + Sync {
    fn set_verbosity(&self, level: u8);
}

/// Files re-read at the start of every cycle, plus locations named in digests.
#[derive(Debug, Clone)]
pub struct SchedulerPaths {
    pub watch_config: PathBuf,
    pub default_patterns: PathBuf,
    pub custom_patterns: PathBuf,
    pub exclusions: PathBuf,
    pub export_dir: PathBuf,
}

/// State carried from one cycle to the next.
#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
    pub last_refresh: Option<DateTime<Utc>>,
    pub cycles_run: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Skipped(String),
    Completed {
        matches: usize,
        notified: bool,
        exported: Option<PathBuf>,
    },
}

/// What one cycle did and how long to wait before the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub next_sleep: Duration,
}

impl CycleReport {
    fn skipped(reason: impl Into<String>, next_sleep: Duration) -> Self {
        Self {
            outcome: CycleOutcome::Skipped(reason.into()),
            next_sleep,
        }
    }
}

/// Runs load → scan → digest → notify/export → sleep, forever.
pub struct CycleScheduler {
    paths: SchedulerPaths,
    classifier: Arc<dyn Classifier>,
    notifier: Arc<dyn Notifier>,
    exporter: Arc<dyn RecordExporter>,
    reader: Arc<dyn SourceReader>,
    audit: Option<Arc<AuditLog>>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    verbosity: Option<Arc<dyn VerbosityControl>>,
    refresh_interval: Duration,
    state: SchedulerState,
}

impl CycleScheduler {
    pub fn new(
        paths: SchedulerPaths,
        classifier: Arc<dyn Classifier>,
        notifier: Arc<dyn Notifier>,
        exporter: Arc<dyn RecordExporter>,
    ) -> Self {
        Self {
            paths,
            classifier,
            notifier,
            exporter,
            reader: Arc::new(FsReader),
            audit: None,
            clock: Arc::new(SystemClock),
            sleeper: Arc::new(TokioSleeper),
            verbosity: None,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            state: SchedulerState::default(),
        }
    }

    pub fn with_reader(mut self, reader: Arc<dyn SourceReader>) -> Self {
        self.reader = reader;
        self
    }

    pub fn with_audit_log(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Arc<dyn VerbosityControl>) -> Self {
        self.verbosity = Some(verbosity);
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Never returns. Every cycle failure is logged and followed by the usual sleep.
    pub async fn run_forever(&mut self) {
        loop {
            let pause = self.tick().await;
            self.sleeper.sleep(pause).await;
        }
    }

    /// Run `count` cycles with the configured pause between consecutive ones.
    pub async fn run_cycles(&mut self, count: usize) -> Vec<CycleOutcome> {
        let mut outcomes = Vec::with_capacity(count);
        for idx in 0..count {
            let (outcome, pause) = match self.run_cycle().await {
                Ok(report) => (report.outcome, report.next_sleep),
                Err(err) => {
                    error!(error = ?err, "cycle failed");
                    (CycleOutcome::Skipped(err.to_string()), DEFAULT_SCAN_INTERVAL)
                }
            };
            outcomes.push(outcome);
            if idx + 1 < count {
                self.sleeper.sleep(pause).await;
            }
        }
        outcomes
    }

    async fn tick(&mut self) -> Duration {
        match self.run_cycle().await {
            Ok(report) => report.next_sleep,
            Err(err) => {
                error!(error = ?err, "cycle failed");
                DEFAULT_SCAN_INTERVAL
            }
        }
    }

    /// One full cycle. Configuration problems produce a skipped report, not an error.
    #[instrument(name = "cycle", skip(self), fields(cycle = self.state.cycles_run + 1))]
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let started = self.clock.now();
        self.state.cycles_run += 1;

        let config = match WatchConfig::load(&self.paths.watch_config) {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, "invalid config; skipping cycle");
                return Ok(CycleReport::skipped(err.to_string(), DEFAULT_SCAN_INTERVAL));
            }
        };
        if let Some(verbosity) = &self.verbosity {
            verbosity.set_verbosity(config.debug);
        }

        let mut patterns = PatternSet::load(&[
            self.paths.default_patterns.clone(),
            self.paths.custom_patterns.clone(),
        ]);
        if let Some(inline) = &config.inline_pattern {
            if let Err(err) = patterns.insert(inline) {
                warn!(error = %err, "ignoring inline pattern from config");
            }
        }
        let exclusions = ExclusionFilter::load(&self.paths.exclusions);

        let directory = match config.validate(patterns.len()) {
            Ok(directory) => directory.to_path_buf(),
            Err(err) => {
                warn!(error = %err, "invalid config; skipping cycle");
                return Ok(CycleReport::skipped(err.to_string(), config.scan_interval));
            }
        };
        debug!(
            patterns = patterns.len(),
            exclusions = exclusions.len(),
            directory = %directory.display(),
            "cycle inputs loaded"
        );

        self.refresh_classifier_if_due().await;

        let mut scanner =
            FileScanner::new(Arc::clone(&self.classifier)).with_reader(Arc::clone(&self.reader));
        if let Some(audit) = &self.audit {
            scanner = scanner.with_audit_log(Arc::clone(audit));
        }
        let result = match scanner
            .scan(&directory, &patterns, &exclusions, &config.scan_options())
            .await
        {
            Ok(result) => result,
            Err(err) => {
                error!(error = %err, "scan failed; continuing with empty result");
                ScanResult::default()
            }
        };

        let digest_options = DigestOptions {
            max_records: config.max_digest_records,
            audit_log: self.audit.as_ref().map(|audit| audit.path().to_path_buf()),
            export_dir: config.export.then(|| self.paths.export_dir.clone()),
        };
        let notified = match build_digest(&result.records, &digest_options)? {
            Some(digest) => {
                let notification = Notification {
                    subject: config.subject.clone(),
                    body: digest.body,
                    recipients: config.recipients.clone(),
                };
                match self.notifier.send(&notification).await {
                    Ok(()) => {
                        info!(shown = digest.shown, total = digest.total, "digest sent");
                        true
                    }
                    Err(err) => {
                        error!(error = ?err, "failed to send digest");
                        false
                    }
                }
            }
            None => {
                info!("no matches this cycle");
                false
            }
        };

        let exported = if config.export && !result.exports.is_empty() {
            match self.exporter.export(started, &result.exports) {
                Ok(path) => {
                    info!(path = %path.display(), rows = result.exports.len(), "exported matches");
                    Some(path)
                }
                Err(err) => {
                    error!(error = ?err, "failed to export matches");
                    None
                }
            }
        } else {
            None
        };

        Ok(CycleReport {
            outcome: CycleOutcome::Completed {
                matches: result.records.len(),
                notified,
                exported,
            },
            next_sleep: config.scan_interval,
        })
    }

    async fn refresh_classifier_if_due(&mut self) {
        let now = self.clock.now();
        let due = match self.state.last_refresh {
            None => true,
            Some(last) => now
                .signed_duration_since(last)
                .to_std()
                .map_or(true, |elapsed| elapsed >= self.refresh_interval),
        };
        if !due {
            return;
        }
        info!("refreshing classifier");
        if let Err(err) = self.classifier.refresh().await {
            error!(error = ?err, "classifier refresh failed; scanning with current model");
        }
        self.state.last_refresh = Some(now);
    }
}
