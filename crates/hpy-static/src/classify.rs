//! Path classification for incremental rebuilds.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use hpy_document::{DOCUMENT_EXTENSION, SCRIPT_EXTENSION};

use crate::config::ProjectConfig;

/// What a path in the project is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// The layout document or its companion script
    Layout,

    /// The app shell template
    AppShell,

    /// A page document
    Page,

    /// `<stem>.py` next to a page
    CompanionScript {
        /// Page owning the script
        owner: PathBuf,
    },

    /// A script referenced through `<python src>`
    ExplicitScript {
        /// Pages referencing the script
        pages: Vec<PathBuf>,
    },

    /// A file or directory under the static asset directory
    StaticAsset,

    /// Anything else
    Ignorable,
}

/// Layout, pages and explicit script references found in the project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectIndex {
    /// Layout path, if the project has one
    pub layout: Option<PathBuf>,

    /// Known page documents
    pub pages: BTreeSet<PathBuf>,

    /// Explicit script → pages referencing it
    pub explicit_scripts: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
}

impl ProjectIndex {
    /// Record a page and the explicit script it references, if any.
    pub fn record_page(&mut self, page: &Path, explicit_script: Option<&Path>) {
        self.forget_page(page);
        self.pages.insert(page.to_path_buf());

        if let Some(script) = explicit_script {
            self.explicit_scripts
                .entry(script.to_path_buf())
                .or_default()
                .insert(page.to_path_buf());
        }
    }

    /// Remember that `page` references `script` before the script exists,
    /// so creating it triggers a rebuild of the page.
    pub fn record_missing_script(&mut self, page: &Path, script: &Path) {
        self.explicit_scripts
            .entry(script.to_path_buf())
            .or_default()
            .insert(page.to_path_buf());
    }

    /// Drop a page and its script references.
    pub fn forget_page(&mut self, page: &Path) {
        self.pages.remove(page);
        self.explicit_scripts.retain(|_, pages| {
            pages.remove(page);
            !pages.is_empty()
        });
    }

    /// Classify `path` against the project layout.
    pub fn classify(&self, config: &ProjectConfig, path: &Path) -> SourceKind {
        if path.starts_with(&config.output_dir) || !path.starts_with(&config.input_dir) {
            return SourceKind::Ignorable;
        }

        if config.single_file.is_none() {
            if config.is_static(path) {
                return SourceKind::StaticAsset;
            }

            let layout = config.layout_path();
            if path == layout || path == layout.with_extension(SCRIPT_EXTENSION) {
                return SourceKind::Layout;
            }

            if path == config.app_shell_path() {
                return SourceKind::AppShell;
            }
        }

        if config.is_page(path) {
            return SourceKind::Page;
        }

        let has_extension = |ext: &str| path.extension().is_some_and(|e| e == ext);
        if !has_extension(SCRIPT_EXTENSION) {
            return SourceKind::Ignorable;
        }

        let companion_owner = path.with_extension(DOCUMENT_EXTENSION);
        let owns_companion = self.pages.contains(&companion_owner)
            || (config.is_page(&companion_owner) && companion_owner.is_file());

        if let Some(referencing) = self.explicit_scripts.get(path) {
            let mut pages: Vec<PathBuf> = referencing.iter().cloned().collect();
            if owns_companion && !referencing.contains(&companion_owner) {
                pages.push(companion_owner);
                pages.sort();
            }
            return SourceKind::ExplicitScript { pages };
        }

        if owns_companion {
            return SourceKind::CompanionScript {
                owner: companion_owner,
            };
        }

        SourceKind::Ignorable
    }
}
