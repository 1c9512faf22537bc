//! File sink
//!
//! Buffered writer with rotation, retention and optional gzip compression of
//! rotated segments. Two write modes: `Sync` writes on the producer thread
//! under a mutex; `Enqueued` pushes rendered lines onto a bounded channel
//! drained by a dedicated worker thread, so the producer never blocks on
//! file I/O.
//!
//! Rotation decisions use the record timestamp carried with each write, so
//! time-based rotation is deterministic for a given record stream.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, Timelike};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;

use crate::core::error::{EngineError, Result};
use crate::core::fallback::{self, Source};

/// Capacity of the enqueued-mode channel.
const ENQUEUE_CAPACITY: usize = 10_000;

/// How long a producer may block when the channel is full before the
/// message is dropped and counted.
const ENQUEUE_FULL_TIMEOUT: Duration = Duration::from_millis(100);

/// Idle flush interval for the worker thread.
const WORKER_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// How long `flush` waits for the worker's drain acknowledgement.
const DRAIN_WAIT: Duration = Duration::from_secs(5);

/// Shutdown timeout used when the sink is dropped without an explicit
/// shutdown.
const DROP_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Rotation policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    Never,
    /// Rotate when the active file would reach this many bytes.
    Size(u64),
    Daily,
    Hourly,
}

/// Retention policy applied to rotated files after each rotation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Retention {
    #[default]
    None,
    /// Keep at most this many rotated files.
    Count(usize),
    /// Delete rotated files older than this.
    Age(chrono::Duration),
}

/// File sink configuration.
#[derive(Clone, Debug)]
pub struct FileSinkConfig {
    pub path: PathBuf,
    pub rotation: Rotation,
    pub retention: Retention,
    pub compression: bool,
    pub enqueue: bool,
    /// Handler id, used for fallback error reporting.
    pub handler_id: u64,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        FileSinkConfig {
            path: PathBuf::from("app.log"),
            rotation: Rotation::Never,
            retention: Retention::None,
            compression: false,
            enqueue: false,
            handler_id: 0,
        }
    }
}

/// The wall-clock period an active file belongs to under time-based
/// rotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Period {
    Day(NaiveDate),
    Hour(NaiveDate, u32),
}

fn period_of(rotation: Rotation, ts: &DateTime<Local>) -> Option<Period> {
    match rotation {
        Rotation::Daily => Some(Period::Day(ts.date_naive())),
        Rotation::Hourly => Some(Period::Hour(ts.date_naive(), ts.hour())),
        _ => None,
    }
}

fn period_tag(period: Period) -> String {
    match period {
        Period::Day(date) => date.format("%Y-%m-%d").to_string(),
        Period::Hour(date, hour) => format!("{}_{:02}", date.format("%Y-%m-%d"), hour),
    }
}

/// Append a suffix to a full file name, e.g. `app.1.log` + `.gz`.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Writer state and rotation machinery. Owned by the producer side (behind a
/// mutex) in sync mode, or by the worker thread in enqueued mode.
struct FileState {
    path: PathBuf,
    rotation: Rotation,
    retention: Retention,
    compression: bool,
    handler_id: u64,
    writer: Option<BufWriter<File>>,
    current_size: u64,
    current_period: Option<Period>,
}

impl FileState {
    fn open(config: &FileSinkConfig) -> Result<Self> {
        let path = config.path.clone();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    EngineError::io_operation("creating log directory", parent.display().to_string(), e)
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| EngineError::io_operation("opening", path.display().to_string(), e))?;

        let current_size = file
            .metadata()
            .map_err(|e| EngineError::io_operation("reading metadata of", path.display().to_string(), e))?
            .len();

        Ok(FileState {
            path,
            rotation: config.rotation,
            retention: config.retention,
            compression: config.compression,
            handler_id: config.handler_id,
            writer: Some(BufWriter::new(file)),
            current_size,
            // Seeded by the first write so rotation follows the record
            // stream's clock, not construction time.
            current_period: None,
        })
    }

    fn should_rotate(&self, incoming: u64, ts: &DateTime<Local>) -> bool {
        match self.rotation {
            Rotation::Never => false,
            Rotation::Size(threshold) => {
                self.current_size > 0 && self.current_size + incoming >= threshold
            }
            Rotation::Daily | Rotation::Hourly => match self.current_period {
                Some(period) => period_of(self.rotation, ts) != Some(period),
                None => false,
            },
        }
    }

    /// Write one line (newline appended here), rotating first if the policy
    /// requires it.
    fn write_line(&mut self, line: &str, ts: DateTime<Local>) -> io::Result<()> {
        let incoming = line.len() as u64 + 1;

        if self.should_rotate(incoming, &ts) {
            if let Err(e) = self.rotate(&ts) {
                fallback::report(Source::Handler(self.handler_id), "rotation", &e);
                self.recover_after_failed_rotation();
            }
        }

        if self.current_period.is_none() {
            self.current_period = period_of(self.rotation, &ts);
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::other("writer not available"))?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        self.current_size += incoming;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }

    /// Close, rename the active file to its rotated name, reopen fresh,
    /// then run compression and retention on the rotated siblings.
    fn rotate(&mut self, ts: &DateTime<Local>) -> io::Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }

        let tag = match self.rotation {
            Rotation::Daily | Rotation::Hourly => {
                let departing = self
                    .current_period
                    .or_else(|| period_of(self.rotation, ts))
                    .expect("time-based rotation always has a period");
                period_tag(departing)
            }
            _ => self.next_ordinal().to_string(),
        };
        let rotated = self.free_rotated_path(&tag);

        if self.path.exists() {
            fs::rename(&self.path, &rotated)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.writer = Some(BufWriter::new(file));
        self.current_size = 0;
        self.current_period = period_of(self.rotation, ts);

        // Past this point the write path has its fresh file; compression and
        // retention failures must not fail the rotation.
        if self.compression && rotated.exists() {
            if let Err(e) = compress_file(&rotated) {
                fallback::report(Source::Handler(self.handler_id), "compression", &e);
            }
        }
        self.apply_retention(ts);

        Ok(())
    }

    fn recover_after_failed_rotation(&mut self) {
        if self.writer.is_none() {
            match OpenOptions::new().create(true).append(true).open(&self.path) {
                Ok(file) => {
                    self.current_size = file.metadata().map(|m| m.len()).unwrap_or(0);
                    self.writer = Some(BufWriter::new(file));
                }
                Err(e) => {
                    fallback::report(Source::Handler(self.handler_id), "reopen", &e);
                }
            }
        }
        // Let the file exceed its limit rather than retry-rotating forever.
        if matches!(self.rotation, Rotation::Size(_)) {
            self.current_size = 0;
        }
    }

    fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("log")
    }

    fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|s| s.to_str())
    }

    fn rotated_path(&self, tag: &str) -> PathBuf {
        let filename = match self.extension() {
            Some(ext) => format!("{}.{}.{}", self.stem(), tag, ext),
            None => format!("{}.{}", self.stem(), tag),
        };
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(filename),
            _ => PathBuf::from(filename),
        }
    }

    /// Resolve collisions (process restart mid-period, stale segments) by
    /// probing `{tag}`, `{tag}.1`, `{tag}.2`, ...
    fn free_rotated_path(&self, tag: &str) -> PathBuf {
        let candidate = self.rotated_path(tag);
        if !candidate.exists() && !with_suffix(&candidate, ".gz").exists() {
            return candidate;
        }
        for n in 1.. {
            let candidate = self.rotated_path(&format!("{}.{}", tag, n));
            if !candidate.exists() && !with_suffix(&candidate, ".gz").exists() {
                return candidate;
            }
        }
        unreachable!()
    }

    /// Extract the ordinal from a rotated sibling's file name, if it is one
    /// of ours: `{stem}.{N}.{ext}` with an optional `.gz`.
    fn parse_ordinal(&self, filename: &str) -> Option<u64> {
        let name = filename.strip_suffix(".gz").unwrap_or(filename);
        let name = match self.extension() {
            Some(ext) => name.strip_suffix(ext)?.strip_suffix('.')?,
            None => name,
        };
        name.strip_prefix(self.stem())?
            .strip_prefix('.')?
            .parse()
            .ok()
    }

    fn next_ordinal(&self) -> u64 {
        let parent = self.parent_dir();
        let max = fs::read_dir(parent)
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                self.parse_ordinal(name.to_str()?)
            })
            .max()
            .unwrap_or(0);
        max + 1
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Rotated siblings: `{stem}.` prefixed files other than the active one.
    fn rotated_siblings(&self) -> Vec<(PathBuf, std::time::SystemTime)> {
        let prefix = format!("{}.", self.stem());
        let active = self.path.file_name();
        fs::read_dir(self.parent_dir())
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                let name = path.file_name()?;
                if Some(name) == active {
                    return None;
                }
                if !name.to_str()?.starts_with(&prefix) {
                    return None;
                }
                let modified = entry.metadata().ok()?.modified().ok()?;
                Some((path, modified))
            })
            .collect()
    }

    fn apply_retention(&self, now: &DateTime<Local>) {
        let mut rotated = match self.retention {
            Retention::None => return,
            _ => self.rotated_siblings(),
        };
        rotated.sort_by_key(|(_, mtime)| *mtime);

        match self.retention {
            Retention::None => {}
            Retention::Count(keep) => {
                let excess = rotated.len().saturating_sub(keep);
                for (path, _) in rotated.drain(..excess) {
                    if let Err(e) = fs::remove_file(&path) {
                        fallback::report(Source::Handler(self.handler_id), "retention", &e);
                    }
                }
            }
            Retention::Age(max_age) => {
                let cutoff: std::time::SystemTime = (*now - max_age).into();
                for (path, mtime) in &rotated {
                    if *mtime < cutoff {
                        if let Err(e) = fs::remove_file(path) {
                            fallback::report(Source::Handler(self.handler_id), "retention", &e);
                        }
                    }
                }
            }
        }
    }
}

impl Drop for FileState {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }
}

/// Gzip `path` into `path.gz` via a temporary sibling, removing the original
/// only after the compressed file is fully in place.
fn compress_file(path: &Path) -> io::Result<()> {
    let gz_path = with_suffix(path, ".gz");
    let tmp_path = with_suffix(path, ".gz.tmp");

    let result = (|| {
        let mut reader = io::BufReader::new(File::open(path)?);
        let output = BufWriter::new(File::create(&tmp_path)?);
        let mut encoder = GzEncoder::new(output, Compression::default());
        io::copy(&mut reader, &mut encoder)?;
        encoder.finish()?.flush()?;
        fs::rename(&tmp_path, &gz_path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    // The compressed copy exists; a leftover original is cleaned up by the
    // next retention pass.
    let _ = fs::remove_file(path);
    Ok(())
}

enum WorkerMessage {
    Write {
        line: String,
        timestamp: DateTime<Local>,
    },
    Flush(Sender<()>),
    Shutdown,
}

struct EnqueuedBackend {
    sender: Sender<WorkerMessage>,
    handle: Mutex<Option<JoinHandle<()>>>,
    quarantined: Arc<AtomicBool>,
    dropped: AtomicU64,
    closed: AtomicBool,
}

enum Backend {
    Sync(Mutex<FileState>),
    Enqueued(EnqueuedBackend),
}

pub struct FileSink {
    path: PathBuf,
    handler_id: u64,
    backend: Backend,
}

impl FileSink {
    pub fn new(config: FileSinkConfig) -> Result<Self> {
        let mut state = FileState::open(&config)?;
        let path = config.path.clone();
        let handler_id = config.handler_id;

        let backend = if config.enqueue {
            let (sender, receiver) = bounded::<WorkerMessage>(ENQUEUE_CAPACITY);
            let quarantined = Arc::new(AtomicBool::new(false));
            let worker_quarantine = Arc::clone(&quarantined);

            let handle = thread::Builder::new()
                .name(format!("logpipe-{}", state.stem()))
                .spawn(move || loop {
                    match receiver.recv_timeout(WORKER_FLUSH_INTERVAL) {
                        Ok(WorkerMessage::Write { line, timestamp }) => {
                            let outcome = catch_unwind(AssertUnwindSafe(|| {
                                state.write_line(&line, timestamp)
                            }));
                            match outcome {
                                Ok(Ok(())) => {}
                                Ok(Err(e)) => {
                                    fallback::report(Source::Handler(handler_id), "write", &e);
                                }
                                Err(_) => {
                                    worker_quarantine.store(true, Ordering::SeqCst);
                                    fallback::report(
                                        Source::Handler(handler_id),
                                        "worker panic",
                                        &"sink quarantined, subsequent messages are dropped",
                                    );
                                    break;
                                }
                            }
                        }
                        Ok(WorkerMessage::Flush(ack)) => {
                            if let Err(e) = state.flush() {
                                fallback::report(Source::Handler(handler_id), "flush", &e);
                            }
                            let _ = ack.send(());
                        }
                        Ok(WorkerMessage::Shutdown) => {
                            let _ = state.flush();
                            break;
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            let _ = state.flush();
                        }
                        Err(RecvTimeoutError::Disconnected) => {
                            let _ = state.flush();
                            break;
                        }
                    }
                })
                .map_err(EngineError::from)?;

            Backend::Enqueued(EnqueuedBackend {
                sender,
                handle: Mutex::new(Some(handle)),
                quarantined,
                dropped: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            })
        } else {
            Backend::Sync(Mutex::new(state))
        };

        Ok(FileSink {
            path,
            handler_id,
            backend,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one rendered line. In enqueued mode this never blocks longer
    /// than the bounded full-channel wait; overflow is dropped and counted.
    pub fn write(&self, line: &str, timestamp: DateTime<Local>) -> Result<()> {
        match &self.backend {
            Backend::Sync(state) => state
                .lock()
                .write_line(line, timestamp)
                .map_err(|e| EngineError::io_operation("writing", self.path.display().to_string(), e)),
            Backend::Enqueued(backend) => {
                if backend.closed.load(Ordering::SeqCst)
                    || backend.quarantined.load(Ordering::SeqCst)
                {
                    backend.dropped.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
                let message = WorkerMessage::Write {
                    line: line.to_string(),
                    timestamp,
                };
                if backend
                    .sender
                    .send_timeout(message, ENQUEUE_FULL_TIMEOUT)
                    .is_err()
                {
                    let dropped = backend.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    // Report the first overflow and then once per thousand.
                    if dropped % 1000 == 1 {
                        fallback::report_dropped(&self.path, dropped);
                    }
                }
                Ok(())
            }
        }
    }

    /// Flush pending output. For an enqueued sink this waits (bounded) until
    /// the worker has drained everything queued before the call; a sink whose
    /// worker is gone (shut down or quarantined) returns
    /// [`EngineError::ChannelClosed`].
    pub fn flush(&self) -> Result<()> {
        match &self.backend {
            Backend::Sync(state) => state
                .lock()
                .flush()
                .map_err(|e| EngineError::io_operation("flushing", self.path.display().to_string(), e)),
            Backend::Enqueued(backend) => {
                if backend.closed.load(Ordering::SeqCst)
                    || backend.quarantined.load(Ordering::SeqCst)
                {
                    return Err(EngineError::ChannelClosed);
                }
                let (ack_tx, ack_rx) = bounded(1);
                if backend.sender.send(WorkerMessage::Flush(ack_tx)).is_err() {
                    return Err(EngineError::ChannelClosed);
                }
                if ack_rx.recv_timeout(DRAIN_WAIT).is_err() {
                    fallback::report(
                        Source::Handler(self.handler_id),
                        "drain",
                        &"flush acknowledgement timed out",
                    );
                }
                Ok(())
            }
        }
    }

    /// Stop accepting writes, drain and join the worker. Returns `false` if
    /// the worker did not finish within `timeout`.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        match &self.backend {
            Backend::Sync(state) => {
                let _ = state.lock().flush();
                true
            }
            Backend::Enqueued(backend) => {
                if backend.closed.swap(true, Ordering::SeqCst) {
                    return true;
                }
                let _ = backend.sender.send(WorkerMessage::Shutdown);

                let finished = if let Some(handle) = backend.handle.lock().take() {
                    let start = std::time::Instant::now();
                    loop {
                        if handle.is_finished() {
                            let _ = handle.join();
                            break true;
                        }
                        if start.elapsed() >= timeout {
                            break false;
                        }
                        thread::sleep(Duration::from_millis(10));
                    }
                } else {
                    true
                };

                fallback::report_dropped(&self.path, backend.dropped.load(Ordering::Relaxed));
                finished
            }
        }
    }

    /// Messages dropped because the queue was full, the worker was
    /// quarantined or the sink was already shut down.
    pub fn dropped_count(&self) -> u64 {
        match &self.backend {
            Backend::Sync(_) => 0,
            Backend::Enqueued(backend) => backend.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        self.shutdown(DROP_SHUTDOWN_TIMEOUT);
    }
}
