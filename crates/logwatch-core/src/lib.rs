pub mod audit;
pub mod capped_writer;
pub mod classifier;
pub mod config;
pub mod digest;
pub mod export;
pub mod notify;
pub mod scanner;
pub mod scheduler;

pub use audit::AuditLog;
pub use capped_writer::{CappedFileWriter, DEFAULT_MAX_LOG_BYTES};
pub use classifier::{build_classifier, Classifier, ClassifierSettings, NoopClassifier, Verdict};
pub use config::{ConfigError, WatchConfig};
pub use digest::{build_digest, Digest, DigestOptions};
pub use export::{CsvExporter, RecordExporter};
pub use notify::{build_notifier, LogNotifier, Notification, Notifier, NotifierSettings};
pub use scanner::{
    exclusion::ExclusionFilter, file_scanner::FileScanner, patterns::PatternSet, ExportRecord,
    FsReader, LossyLines, MatchMode, MatchRecord, ScanError, ScanOptions, ScanResult, SourceReader,
    SourceStream,
};
pub use scheduler::{
    Clock, CycleOutcome, CycleReport, CycleScheduler, SchedulerPaths, SchedulerState, Sleeper,
    VerbosityControl,
};
