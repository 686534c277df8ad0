//! Watch orchestration: classify change events, plan rebuild actions, apply them.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use hpy_static::{ProjectBuilder, ProjectConfig, ProjectIndex, SourceKind};

use crate::reload::{ReloadHub, ReloadMessage};

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The path appeared
    Created,

    /// The contents changed
    Modified,

    /// The path is gone
    Removed,
}

impl ChangeKind {
    /// Lowercase name for log messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// One filesystem change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Changed path
    pub path: PathBuf,

    /// What happened to it
    pub kind: ChangeKind,
}

impl ChangeEvent {
    /// Create an event.
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Work the builder has to do in response to changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildAction {
    /// Rebuild every page
    FullRebuild,

    /// Rebuild one page
    RebuildPage(PathBuf),

    /// Copy a static file or directory into the output dir
    SyncStatic(PathBuf),

    /// Delete the mirror of a static file or directory
    RemoveStatic(PathBuf),

    /// Delete the HTML of a removed page
    RemovePage(PathBuf),
}

impl fmt::Display for RebuildAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullRebuild => write!(f, "full rebuild"),
            Self::RebuildPage(p) => write!(f, "rebuild {}", p.display()),
            Self::SyncStatic(p) => write!(f, "sync {}", p.display()),
            Self::RemoveStatic(p) => write!(f, "remove static {}", p.display()),
            Self::RemovePage(p) => write!(f, "remove page {}", p.display()),
        }
    }
}

/// Turn a batch of changes into an ordered list of actions.
///
/// Static actions come first, then page removals, then either a single full
/// rebuild or the distinct page rebuilds.
pub fn plan(
    config: &ProjectConfig,
    index: &ProjectIndex,
    events: &[ChangeEvent],
) -> Vec<RebuildAction> {
    let mut statics: Vec<RebuildAction> = Vec::new();
    let mut removals: BTreeSet<PathBuf> = BTreeSet::new();
    let mut rebuilds: BTreeSet<PathBuf> = BTreeSet::new();
    let mut full = false;

    for event in events {
        let kind = index.classify(config, &event.path);
        tracing::debug!(
            "{} {} -> {:?}",
            event.kind.label(),
            event.path.display(),
            kind
        );

        match (kind, event.kind) {
            (SourceKind::StaticAsset, ChangeKind::Removed) => {
                push_unique(&mut statics, RebuildAction::RemoveStatic(event.path.clone()));
            }
            (SourceKind::StaticAsset, _) => {
                push_unique(&mut statics, RebuildAction::SyncStatic(event.path.clone()));
            }
            (SourceKind::Layout | SourceKind::AppShell, _) => full = true,
            (SourceKind::Page, ChangeKind::Removed) => {
                removals.insert(event.path.clone());
            }
            (SourceKind::Page, _) => {
                rebuilds.insert(event.path.clone());
            }
            (SourceKind::CompanionScript { owner }, _) => {
                rebuilds.insert(owner);
            }
            (SourceKind::ExplicitScript { pages }, _) => rebuilds.extend(pages),
            (SourceKind::Ignorable, _) => {}
        }
    }

    let mut actions = statics;
    actions.extend(removals.iter().cloned().map(RebuildAction::RemovePage));

    if full {
        actions.push(RebuildAction::FullRebuild);
    } else {
        actions.extend(
            rebuilds
                .into_iter()
                .filter(|page| !removals.contains(page))
                .map(RebuildAction::RebuildPage),
        );
    }

    actions
}

fn push_unique(actions: &mut Vec<RebuildAction>, action: RebuildAction) {
    if !actions.contains(&action) {
        actions.push(action);
    }
}

/// Applies rebuild plans to the output tree and tells browsers to reload.
pub struct Orchestrator {
    builder: ProjectBuilder,
    index: ProjectIndex,
    hub: Option<ReloadHub>,
}

impl Orchestrator {
    /// Create an orchestrator from the index of an initial build.
    pub fn new(builder: ProjectBuilder, index: ProjectIndex, hub: Option<ReloadHub>) -> Self {
        Self {
            builder,
            index,
            hub,
        }
    }

    /// Current project index.
    pub fn index(&self) -> &ProjectIndex {
        &self.index
    }

    /// Plan actions for a batch against the current index.
    pub fn plan(&self, events: &[ChangeEvent]) -> Vec<RebuildAction> {
        plan(self.builder.config(), &self.index, events)
    }

    /// Run each action in order.
    ///
    /// Failures are logged and skipped. Returns the number of actions that
    /// succeeded; if any did, connected browsers are told to reload.
    pub fn apply(&mut self, actions: &[RebuildAction]) -> usize {
        let mut applied = 0;

        for action in actions {
            match self.apply_one(action) {
                Ok(()) => applied += 1,
                Err(e) => {
                    tracing::error!("Failed to {}: {}", action, e);
                    for (page, script) in e.missing_scripts() {
                        tracing::debug!("Waiting for {}", script.display());
                        self.index.record_missing_script(&page, &script);
                    }
                }
            }
        }

        if applied > 0 {
            if let Some(hub) = &self.hub {
                hub.send(ReloadMessage::Reload);
            }
        }

        applied
    }

    fn apply_one(&mut self, action: &RebuildAction) -> Result<(), hpy_static::BuildError> {
        match action {
            RebuildAction::FullRebuild => {
                let result = self.builder.build()?;
                tracing::info!(
                    "Rebuilt {} page(s) in {}ms",
                    result.pages,
                    result.duration_ms
                );
                self.index = result.index;
            }
            RebuildAction::RebuildPage(page) => {
                let compiled = self.builder.build_page(page)?;
                self.index
                    .record_page(&compiled.source, compiled.explicit_script.as_deref());
                tracing::info!("Rebuilt {}", display_name(page));
            }
            RebuildAction::SyncStatic(path) => {
                self.builder.sync_static_path(path)?;
                tracing::info!("Synced {}", display_name(path));
            }
            RebuildAction::RemoveStatic(path) => {
                self.builder.remove_static_path(path)?;
                tracing::info!("Removed {}", display_name(path));
            }
            RebuildAction::RemovePage(page) => {
                self.builder.remove_page(page)?;
                self.index.forget_page(page);
            }
        }
        Ok(())
    }

    /// Consume change batches until the channel closes.
    ///
    /// Each plan runs to completion before the next batch is taken.
    pub async fn run(mut self, mut batches: mpsc::Receiver<Vec<ChangeEvent>>) {
        while let Some(batch) = batches.recv().await {
            let actions = self.plan(&batch);
            if actions.is_empty() {
                continue;
            }

            tokio::task::block_in_place(|| self.apply(&actions));
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
