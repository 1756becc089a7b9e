//! Incremental file tailing across daily rotation.
//!
//! Runs the filesystem watch on its own OS thread (`notify`'s callback
//! thread) and hands each notification's complete lines to the cooperative
//! runtime as one unit through an unbounded channel — the only thread-safe
//! primitive that crosses that boundary. The async-side consumer gates each
//! notification's worth of lines by trading hours as a single batch before
//! handing it to the queue.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::cache::Cache;
use crate::error::PipelineError;
use crate::hours::TradingHoursValidator;
use crate::parser::{self, ParseLimits};
use crate::queue::QueueProducer;

/// Keeps the `notify` watcher alive for as long as tailing should continue;
/// dropping it stops the watch thread.
pub struct Tailer {
    _watcher: RecommendedWatcher,
}

impl Tailer {
    /// Watches `watch_root` recursively for changes to any file named
    /// `target_filename`, returning the handle (keep it alive) and a
    /// receiver of one `Vec<String>` per filesystem notification.
    pub fn spawn(
        watch_root: impl Into<PathBuf>,
        target_filename: impl Into<String>,
    ) -> Result<(Self, UnboundedReceiver<Vec<String>>), PipelineError> {
        let watch_root = watch_root.into();
        if !watch_root.is_dir() {
            return Err(PipelineError::WatchRootMissing(watch_root));
        }
        let target_filename = target_filename.into();
        let (tx, rx) = unbounded_channel();
        let offsets: Arc<StdMutex<HashMap<PathBuf, u64>>> = Arc::new(StdMutex::new(HashMap::new()));

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "filesystem watch error");
                    return;
                }
            };
            if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                return;
            }
            for path in &event.paths {
                if path.file_name().and_then(|n| n.to_str()) != Some(target_filename.as_str()) {
                    continue;
                }
                if let Err(e) = poll_file(path, &offsets, &tx) {
                    tracing::warn!(path = %path.display(), error = %e, "failed reading tailed file");
                }
            }
        })?;
        watcher.watch(&watch_root, RecursiveMode::Recursive)?;

        Ok((Self { _watcher: watcher }, rx))
    }
}

/// Reads any newly-appended, newline-terminated lines from `path` since the
/// last poll and sends them as a single unit, one send per notification. On
/// first sight, seeks to EOF and skips existing content — as does a shrunk
/// file, treated as a rotation (both decisions documented in DESIGN.md). A
/// trailing partial line is left unconsumed for the next poll. Sends nothing
/// when a notification yields no complete lines.
fn poll_file(
    path: &Path,
    offsets: &Arc<StdMutex<HashMap<PathBuf, u64>>>,
    tx: &UnboundedSender<Vec<String>>,
) -> std::io::Result<()> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let mut offsets = offsets.lock().unwrap();

    let start = match offsets.get(path).copied() {
        None => {
            offsets.insert(path.to_path_buf(), len);
            return Ok(());
        }
        Some(off) if off > len => {
            tracing::warn!(path = %path.display(), "tailed file shrank, treating as rotated");
            offsets.insert(path.to_path_buf(), len);
            return Ok(());
        }
        Some(off) => off,
    };
    if start == len {
        return Ok(());
    }

    file.seek(SeekFrom::Start(start))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    let text = String::from_utf8_lossy(&buf);

    let mut consumed = 0usize;
    let mut lines = Vec::new();
    for line in text.split_inclusive('\n') {
        if !line.ends_with('\n') {
            break;
        }
        consumed += line.len();
        lines.push(line.trim_end_matches(['\r', '\n']).to_string());
    }
    offsets.insert(path.to_path_buf(), start + consumed as u64);
    if !lines.is_empty() {
        let _ = tx.send(lines);
    }
    Ok(())
}

/// Turns one notification's lines into orders, gating the whole notification
/// by trading hours as a single atomic check before handing its batch to the
/// queue.
pub async fn run_consumer(
    mut rx: UnboundedReceiver<Vec<String>>,
    cache: Arc<Cache>,
    hours: TradingHoursValidator,
    limits: ParseLimits,
    producer: QueueProducer,
) {
    while let Some(lines) = rx.recv().await {
        let now = Utc::now();
        let (allowed, reason) = hours.is_allowed(now);
        if !allowed {
            tracing::debug!(reason, dropped = lines.len(), "discarding batch outside trading hours");
            continue;
        }

        let mut batch = Vec::with_capacity(lines.len());
        for line in &lines {
            match parser::parse_line(line, &cache, &limits, now) {
                Ok(order) => batch.push(order),
                Err(rejection) => tracing::debug!(?rejection, "line rejected"),
            }
        }
        if !batch.is_empty() {
            producer.try_enqueue(batch);
        }
    }
}
