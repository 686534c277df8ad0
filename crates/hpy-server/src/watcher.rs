//! File watching for incremental rebuilds.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

use crate::orchestrator::{ChangeEvent, ChangeKind};

/// Events arriving this close together are delivered as one batch.
const BATCH_WINDOW: Duration = Duration::from_millis(100);

/// File watcher delivering batches of change events.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Create a new file watcher for the given paths.
    ///
    /// Returns the watcher and a channel to receive batches on. Events stop
    /// when the watcher is dropped.
    pub fn new(
        paths: &[PathBuf],
    ) -> Result<(Self, async_mpsc::Receiver<Vec<ChangeEvent>>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(16);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            match res {
                Ok(event) => {
                    let _ = sync_tx.send(event);
                }
                Err(e) => tracing::warn!("Watch error: {}", e),
            }
        })
        .map_err(std::io::Error::other)?;

        for path in paths {
            if path.exists() {
                watcher
                    .watch(path, RecursiveMode::Recursive)
                    .map_err(std::io::Error::other)?;
                tracing::debug!("Watching {}", path.display());
            }
        }

        std::thread::spawn(move || {
            while let Ok(first) = sync_rx.recv() {
                let mut pending = BTreeMap::new();
                absorb(&mut pending, first);

                let deadline = Instant::now() + BATCH_WINDOW;
                let mut disconnected = false;
                while let Some(wait) = deadline.checked_duration_since(Instant::now()) {
                    match sync_rx.recv_timeout(wait) {
                        Ok(event) => absorb(&mut pending, event),
                        Err(mpsc::RecvTimeoutError::Timeout) => break,
                        Err(mpsc::RecvTimeoutError::Disconnected) => {
                            disconnected = true;
                            break;
                        }
                    }
                }

                correct_by_existence(&mut pending);
                let batch: Vec<ChangeEvent> = pending
                    .into_iter()
                    .map(|(path, kind)| ChangeEvent::new(path, kind))
                    .collect();

                if !batch.is_empty() && async_tx.blocking_send(batch).is_err() {
                    break;
                }
                if disconnected {
                    break;
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Fold a notify event into the pending batch.
///
/// Renames become a removal of the old path and a creation of the new one.
fn absorb(pending: &mut BTreeMap<PathBuf, ChangeKind>, event: notify::Event) {
    let mut record = |path: PathBuf, kind: ChangeKind| {
        let merged = match (pending.get(&path), kind) {
            (Some(ChangeKind::Created), ChangeKind::Modified) => ChangeKind::Created,
            _ => kind,
        };
        pending.insert(path, merged);
    };

    match event.kind {
        EventKind::Create(_) => event
            .paths
            .into_iter()
            .for_each(|p| record(p, ChangeKind::Created)),
        EventKind::Remove(_) => event
            .paths
            .into_iter()
            .for_each(|p| record(p, ChangeKind::Removed)),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = event.paths.into_iter();
            if let Some(from) = paths.next() {
                record(from, ChangeKind::Removed);
            }
            paths.for_each(|to| record(to, ChangeKind::Created));
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .into_iter()
            .for_each(|p| record(p, ChangeKind::Removed)),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .into_iter()
            .for_each(|p| record(p, ChangeKind::Created)),
        EventKind::Modify(ModifyKind::Metadata(_)) => {}
        EventKind::Modify(_) => event
            .paths
            .into_iter()
            .for_each(|p| record(p, ChangeKind::Modified)),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
    }
}

/// Reconcile event kinds with what is on disk now.
///
/// Unqualified renames arrive as plain modifications, so they are settled here too.
fn correct_by_existence(pending: &mut BTreeMap<PathBuf, ChangeKind>) {
    pending.retain(|path, kind| {
        let exists = path.exists();
        match *kind {
            ChangeKind::Created if !exists => {
                tracing::debug!("Discarding created (gone): {}", path.display());
                false
            }
            ChangeKind::Modified if !exists => {
                *kind = ChangeKind::Removed;
                true
            }
            ChangeKind::Removed if exists => {
                *kind = ChangeKind::Modified;
                true
            }
            _ => true,
        }
    });
}
