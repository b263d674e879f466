//! Offset-tracking watcher for the append-only hook log.
//!
//! The watcher remembers how many bytes of the log it has already consumed
//! (`known_length`) and the file size it saw last. Each check compares the
//! current size against both:
//!
//! ```text
//!   0                 known_length            current size
//!   |-------------------|~~~~~~~~~~~~~~~~~~~~~~~~|
//!        already seen        delta window (new)
//! ```
//!
//! - growth: only the delta window is read, parsed and emitted as one
//!   [`LogBatch`];
//! - shrink below the last observed size: the file was truncated or
//!   replaced, both offsets drop to the new size and nothing is emitted;
//! - equal: nothing happens.
//!
//! Only complete (newline-terminated) lines are consumed. A trailing
//! unterminated line stays in the delta window until its newline arrives,
//! which is why the consumed offset can lag behind the observed size.
//!
//! Checks run on a fixed poll interval and, when available, whenever the OS
//! reports a change in the log's directory. Notifications only *trigger* a
//! check; the size comparison is always the source of truth, so a missed or
//! coalesced notification is caught by the next poll.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::WatchError;
use crate::record::{parse_chunk, LogRecord};

/// Default interval between size checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// How often the file size is compared, regardless of OS notifications.
    pub poll_interval: Duration,
    /// Also check on OS file-change notifications for the log's directory.
    pub fs_events: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            fs_events: true,
        }
    }
}

/// Records appended to the log since the previous check.
#[derive(Debug, Clone, PartialEq)]
pub struct LogBatch {
    pub records: Vec<LogRecord>,
    /// Lines in the window that could not be parsed.
    pub malformed: usize,
    /// Byte window `[start, end)` the batch was parsed from.
    pub start: u64,
    pub end: u64,
}

/// Result of a single [`LogWatcher::check_for_changes`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    Unchanged,
    /// Bytes were appended but they do not complete a line yet.
    Pending,
    Grew { start: u64, end: u64, records: usize },
    Truncated { from: u64, to: u64 },
}

#[derive(Debug, Default)]
struct WatchState {
    /// End of the last complete line handed out.
    consumed: u64,
    /// File size at the last check, including any pending partial line.
    observed: u64,
}

impl WatchState {
    fn reset(&mut self, len: u64) {
        self.consumed = len;
        self.observed = len;
    }
}

struct WatchTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Tails a single log file and emits appended records through a channel.
///
/// One watcher owns the offset for its path. Checks are serialized on an
/// internal lock, so overlapping ticks can never compute a delta window
/// from a stale offset.
pub struct LogWatcher {
    path: PathBuf,
    config: WatcherConfig,
    state: Mutex<WatchState>,
    task: Mutex<Option<WatchTask>>,
    tx: mpsc::UnboundedSender<LogBatch>,
}

impl LogWatcher {
    /// Create a stopped watcher and the receiving end of its batch channel.
    pub fn new(
        path: impl Into<PathBuf>,
        config: WatcherConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<LogBatch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = Arc::new(Self {
            path: path.into(),
            config,
            state: Mutex::new(WatchState::default()),
            task: Mutex::new(None),
            tx,
        });
        (watcher, rx)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte offset consumed so far.
    pub async fn known_length(&self) -> u64 {
        self.state.lock().await.consumed
    }

    pub async fn is_running(&self) -> bool {
        self.task.lock().await.is_some()
    }

    /// Sample the current file size and begin periodic checking.
    ///
    /// Content already in the file is treated as seen. Calling `start` on a
    /// running watcher does nothing.
    pub async fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            debug!(path = %self.path.display(), "Log watcher already running");
            return;
        }

        let initial = match file_len(&self.path).await {
            Ok(len) => len,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not size log file; starting from 0");
                0
            }
        };
        self.state.lock().await.reset(initial);

        // Registered before returning so writes right after `start` are seen.
        let (trigger_tx, trigger_rx) = mpsc::channel::<()>(1);
        let fs_watcher = if self.config.fs_events {
            match self.watch_fs_events(trigger_tx) {
                Ok(w) => Some(w),
                Err(e) => {
                    warn!(error = %e, "File notifications unavailable; polling only");
                    None
                }
            }
        } else {
            None
        };

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(self.clone().run(cancel.clone(), trigger_rx, fs_watcher));
        *task = Some(WatchTask { cancel, handle });

        info!(
            path = %self.path.display(),
            known_length = initial,
            poll_ms = self.config.poll_interval.as_millis() as u64,
            "Log watcher started"
        );
    }

    /// Halt periodic checking and wait for the loop to exit. Idempotent.
    pub async fn stop(&self) {
        let Some(task) = self.task.lock().await.take() else {
            return;
        };
        task.cancel.cancel();
        if let Err(e) = task.handle.await {
            if e.is_panic() {
                warn!(path = %self.path.display(), "Log watcher loop panicked");
            }
        }
        info!(path = %self.path.display(), "Log watcher stopped");
    }

    /// Compare the file size against the consumed offset and emit any newly
    /// appended records.
    ///
    /// A missing file counts as size 0. I/O errors leave the offset
    /// untouched so the next check retries the same window.
    pub async fn check_for_changes(&self) -> Result<ChangeOutcome, WatchError> {
        let mut state = self.state.lock().await;
        let current = file_len(&self.path).await?;
        let observed = state.observed;

        if current < observed {
            state.reset(current);
            info!(
                path = %self.path.display(),
                from = observed,
                to = current,
                "Log file shrank (truncated or replaced); offset reset"
            );
            return Ok(ChangeOutcome::Truncated { from: observed, to: current });
        }

        if current == observed {
            return Ok(ChangeOutcome::Unchanged);
        }

        let known = state.consumed;
        let bytes = read_window(&self.path, known, current).await?;
        state.observed = current;
        let Some(last_newline) = bytes.iter().rposition(|&b| b == b'\n') else {
            return Ok(ChangeOutcome::Pending);
        };
        let complete = &bytes[..=last_newline];
        let end = known + complete.len() as u64;

        let chunk = parse_chunk(&String::from_utf8_lossy(complete));
        state.consumed = end;

        if chunk.malformed > 0 {
            warn!(
                path = %self.path.display(),
                start = known,
                end,
                malformed = chunk.malformed,
                "Skipped malformed log lines"
            );
        }

        let outcome = ChangeOutcome::Grew {
            start: known,
            end,
            records: chunk.records.len(),
        };
        let batch = LogBatch {
            records: chunk.records,
            malformed: chunk.malformed,
            start: known,
            end,
        };
        if self.tx.send(batch).is_err() {
            debug!(path = %self.path.display(), "No batch receiver; dropping appended records");
        }

        Ok(outcome)
    }

    async fn run(
        self: Arc<Self>,
        cancel: CancellationToken,
        mut trigger_rx: mpsc::Receiver<()>,
        // Held so notifications keep flowing until the loop exits.
        _fs_watcher: Option<RecommendedWatcher>,
    ) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; `start` has just sampled the size.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
                Some(()) = trigger_rx.recv() => {}
            }

            if let Err(e) = self.check_for_changes().await {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Log check failed; retrying on next tick"
                );
            }
        }

        debug!(path = %self.path.display(), "Log watcher loop exited");
    }

    /// Watch the log's parent directory (the file itself may not exist yet)
    /// and turn relevant events into check triggers.
    fn watch_fs_events(&self, trigger: mpsc::Sender<()>) -> Result<RecommendedWatcher, WatchError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = self.path.file_name().map(|n| n.to_os_string());

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    if !matches!(
                        event.kind,
                        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                    ) {
                        return;
                    }
                    if event.paths.iter().any(|p| p.file_name() == file_name.as_deref()) {
                        // Full channel: a check is already queued.
                        let _ = trigger.try_send(());
                    }
                }
                Err(e) => warn!(error = %e, "File watcher error"),
            }
        })
        .map_err(|source| WatchError::Notify {
            path: dir.clone(),
            source,
        })?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Notify {
                path: dir.clone(),
                source,
            })?;
        debug!(dir = %dir.display(), "Watching log directory for changes");

        Ok(watcher)
    }
}

async fn file_len(path: &Path) -> Result<u64, WatchError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(WatchError::io(path, e)),
    }
}

/// Read at most `end - start` bytes starting at `start`.
async fn read_window(path: &Path, start: u64, end: u64) -> Result<Vec<u8>, WatchError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| WatchError::io(path, e))?;
    file.seek(std::io::SeekFrom::Start(start))
        .await
        .map_err(|e| WatchError::io(path, e))?;

    let mut buf = Vec::with_capacity((end - start) as usize);
    file.take(end - start)
        .read_to_end(&mut buf)
        .await
        .map_err(|e| WatchError::io(path, e))?;
    Ok(buf)
}
