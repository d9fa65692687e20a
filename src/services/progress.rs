use crate::error::UploadError;
use crate::services::dispatcher::Dispatcher;
use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Receives upload notifications on the main execution context.
///
/// Implementations are shared with the payload through an `Arc`; the caller
/// keeps its own handle and remains the owner.
pub trait ProgressListener: Send + Sync {
    /// Percentage of the payload handed to the sink, in `0..=100`.
    fn on_progress_update(&self, percentage: u8);

    /// The write pass failed. The same error is also returned to the caller.
    fn on_error(&self, error: &ProgressError);
}

/// Snapshot of a failed write pass, delivered to [`ProgressListener::on_error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressError {
    pub kind: io::ErrorKind,
    pub message: String,
}

impl From<&UploadError> for ProgressError {
    fn from(error: &UploadError) -> Self {
        Self {
            kind: error.io_kind(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for ProgressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.message, self.kind)
    }
}

/// Which byte count a chunk's notification carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressMode {
    /// Bytes accumulated before the chunk just read. The last chunk is never
    /// reflected, so 100 is never reported.
    Legacy,
    /// Bytes accumulated including the chunk just read; the final
    /// notification of a completed pass is 100.
    #[default]
    Complete,
}

impl FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "legacy" => Ok(ProgressMode::Legacy),
            "complete" => Ok(ProgressMode::Complete),
            other => Err(format!("unknown progress mode '{}'", other)),
        }
    }
}

impl fmt::Display for ProgressMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressMode::Legacy => f.write_str("legacy"),
            ProgressMode::Complete => f.write_str("complete"),
        }
    }
}

/// `floor(100 * uploaded / total)`, clamped to 100.
///
/// Returns `None` for an empty payload instead of dividing by zero.
pub fn percentage(uploaded: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let pct = (100 * u128::from(uploaded)) / u128::from(total);
    Some(pct.min(100) as u8)
}

/// A listener bound to the context its notifications must run on.
#[derive(Clone)]
pub struct Reporter {
    listener: Arc<dyn ProgressListener>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl Reporter {
    pub fn new(listener: Arc<dyn ProgressListener>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            listener,
            dispatcher,
        }
    }

    /// Posts a progress notification; returns without waiting for it to run.
    pub fn progress(&self, uploaded: u64, total: u64) {
        let listener = Arc::clone(&self.listener);
        self.dispatcher.post(Box::new(move || {
            if let Some(pct) = percentage(uploaded, total) {
                listener.on_progress_update(pct);
            }
        }));
    }

    /// Posts an error notification; returns without waiting for it to run.
    pub fn error(&self, error: &UploadError) {
        let listener = Arc::clone(&self.listener);
        let report = ProgressError::from(error);
        self.dispatcher.post(Box::new(move || listener.on_error(&report)));
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter").finish_non_exhaustive()
    }
}

/// Drops notifications that arrive sooner than `interval` after the last one.
#[derive(Debug)]
struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Per-pass progress bookkeeping.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    reporter: Option<Reporter>,
    mode: ProgressMode,
    throttle: Option<Throttle>,
    total: u64,
    uploaded: u64,
}

impl ProgressTracker {
    pub(crate) fn new(reporter: Option<Reporter>, mode: ProgressMode, total: u64) -> Self {
        Self {
            reporter,
            mode,
            throttle: None,
            total,
            uploaded: 0,
        }
    }

    pub(crate) fn throttled(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.throttle = Some(Throttle {
                interval,
                last: None,
            });
        }
        self
    }

    pub(crate) fn uploaded(&self) -> u64 {
        self.uploaded
    }

    /// Accounts for one chunk of `read` bytes and posts its notification.
    pub(crate) fn advance(&mut self, read: u64) {
        match self.mode {
            ProgressMode::Legacy => {
                let last = self.uploaded + read >= self.total;
                self.notify(self.uploaded, last);
                self.uploaded += read;
            }
            ProgressMode::Complete => {
                self.uploaded += read;
                let finished = self.uploaded >= self.total;
                self.notify(self.uploaded, finished);
            }
        }
    }

    fn notify(&mut self, uploaded: u64, force: bool) {
        let Some(reporter) = &self.reporter else {
            return;
        };
        if let Some(throttle) = &mut self.throttle {
            if !throttle.ready(Instant::now()) && !force {
                return;
            }
        }
        reporter.progress(uploaded, self.total);
    }
}
