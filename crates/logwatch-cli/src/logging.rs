use std::{
    io::{self, Write},
    path::Path,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc, Mutex,
    },
};

use anyhow::{Context, Result};
use logwatch_core::{CappedFileWriter, VerbosityControl, DEFAULT_MAX_LOG_BYTES};
use tracing_subscriber::{
    fmt::MakeWriter, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

const DEFAULT_LOG_FILTER: &str = "info,reqwest=warn,hyper=warn";

/// Initialize tracing with stderr output and a size-capped operational log file.
///
/// The returned handle lets each cycle apply the `debug` key from the watch config.
/// When `RUST_LOG` is set it wins and the handle leaves the filter alone.
pub fn init_tracing(log_file: &Path) -> Result<Arc<ReloadableVerbosity>> {
    let from_env = EnvFilter::try_from_default_env().ok();
    let pinned = from_env.is_some();
    let filter = from_env.unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER));
    let (filter, handle) = reload::Layer::new(filter);

    let file_writer = SharedCappedWriter::open(log_file)?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(Arc::new(ReloadableVerbosity {
        handle,
        pinned,
        current: AtomicU8::new(0),
    }))
}

/// Maps the watch config's `debug` level onto the live filter.
pub struct ReloadableVerbosity {
    handle: reload::Handle<EnvFilter, Registry>,
    pinned: bool,
    current: AtomicU8,
}

impl VerbosityControl for ReloadableVerbosity {
    fn set_verbosity(&self, level: u8) {
        if self.pinned || self.current.swap(level, Ordering::SeqCst) == level {
            return;
        }
        if let Err(err) = self.handle.reload(EnvFilter::new(filter_for(level))) {
            tracing::warn!(error = %err, "failed to change log verbosity");
        }
    }
}

fn filter_for(level: u8) -> String {
    let ours = match level {
        0 => return DEFAULT_LOG_FILTER.to_string(),
        1 => "debug",
        _ => "trace",
    };
    format!("{DEFAULT_LOG_FILTER},logwatch_core={ours},logwatch={ours}")
}

#[derive(Clone)]
struct SharedCappedWriter {
    inner: Arc<Mutex<CappedFileWriter>>,
}

impl SharedCappedWriter {
    fn open(path: &Path) -> Result<Self> {
        let writer = CappedFileWriter::open(path, DEFAULT_MAX_LOG_BYTES)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(writer)),
        })
    }
}

struct SharedCappedWriterGuard {
    inner: Arc<Mutex<CappedFileWriter>>,
}

impl<'a> MakeWriter<'a> for SharedCappedWriter {
    type Writer = SharedCappedWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        SharedCappedWriterGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Write for SharedCappedWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        guard.flush()
    }
}
