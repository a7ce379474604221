mod logging;
mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use logwatch_core::{
    build_classifier, build_notifier, AuditLog, CsvExporter, CycleOutcome, CycleScheduler,
    ExclusionFilter, PatternSet, SchedulerPaths, WatchConfig, DEFAULT_MAX_LOG_BYTES,
};
use tracing::info;

use crate::settings::AppSettings;

#[derive(Parser, Debug)]
#[command(
    name = "logwatch",
    author,
    version,
    about = "Periodic log scanner with classifier-filtered digests"
)]
struct Cli {
    /// Optional settings file (TOML, YAML or JSON)
    #[arg(long, value_name = "FILE", global = true)]
    settings: Option<PathBuf>,

    /// Watch config re-read every cycle (key=value)
    #[arg(long = "watch-config", value_name = "FILE", global = true)]
    watch_config: Option<PathBuf>,

    /// Directory for the operational and audit logs
    #[arg(long = "log-dir", value_name = "DIR", global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan on the configured interval until the process is stopped
    Run,
    /// Run a single cycle and exit
    Once,
    /// List the merged pattern set and exclusions
    ListPatterns {
        /// Emit as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = AppSettings::load(cli.settings.as_deref())?;
    if let Some(path) = cli.watch_config {
        settings.watch_config = path;
    }
    if let Some(dir) = cli.log_dir {
        settings.log_dir = dir;
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::ListPatterns { json } => list_patterns(&settings, json),
        Commands::Run => {
            let mut scheduler = build_scheduler(&settings)?;
            info!("logwatch started");
            scheduler.run_forever().await;
            Ok(())
        }
        Commands::Once => {
            let mut scheduler = build_scheduler(&settings)?;
            let report = scheduler.run_cycle().await?;
            match report.outcome {
                CycleOutcome::Skipped(reason) => println!("cycle skipped: {reason}"),
                CycleOutcome::Completed {
                    matches,
                    notified,
                    exported,
                } => {
                    println!("{matches} match(es); digest sent: {notified}");
                    if let Some(path) = exported {
                        println!("exported to {}", path.display());
                    }
                }
            }
            Ok(())
        }
    }
}

fn build_scheduler(settings: &AppSettings) -> Result<CycleScheduler> {
    let verbosity = logging::init_tracing(&settings.operational_log_path())?;
    let classifier = build_classifier(&settings.classifier_settings()?)
        .context("failed to configure classifier")?;
    let notifier = build_notifier(&settings.notifier).context("failed to configure notifier")?;
    let audit = AuditLog::open(settings.audit_log_path(), DEFAULT_MAX_LOG_BYTES)
        .with_context(|| format!("failed to open audit log {}", settings.audit_log_path().display()))?;

    let paths = SchedulerPaths {
        watch_config: settings.watch_config.clone(),
        default_patterns: settings.default_patterns.clone(),
        custom_patterns: settings.custom_patterns.clone(),
        exclusions: settings.exclusions.clone(),
        export_dir: settings.export_dir.clone(),
    };
    Ok(CycleScheduler::new(
        paths,
        classifier,
        notifier,
        Arc::new(CsvExporter::new(&settings.export_dir)),
    )
    .with_audit_log(Arc::new(audit))
    .with_verbosity(verbosity)
    .with_refresh_interval(settings.refresh_interval()?))
}

fn list_patterns(settings: &AppSettings, json: bool) -> Result<()> {
    let mut patterns = PatternSet::load(&[
        settings.default_patterns.clone(),
        settings.custom_patterns.clone(),
    ]);
    if let Ok(config) = WatchConfig::load(&settings.watch_config) {
        if let Some(inline) = &config.inline_pattern {
            patterns.insert(inline).ok();
        }
    }
    let exclusions = ExclusionFilter::load(&settings.exclusions);

    if json {
        let value = serde_json::json!({
            "patterns": patterns.sources().collect::<Vec<_>>(),
            "exclusions": exclusions.terms(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{} pattern(s) loaded", patterns.len());
    for source in patterns.sources() {
        println!("- {source}");
    }
    println!("{} exclusion(s) loaded", exclusions.len());
    for term in exclusions.terms() {
        println!("- {term}");
    }
    Ok(())
}
