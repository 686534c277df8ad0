//! Project configuration passed to the builder and the watch orchestrator.

use std::path::{Path, PathBuf};

use hpy_document::{normalize_path, ParseContext, DOCUMENT_EXTENSION, LAYOUT_FILENAME};

use crate::compositor::APP_SHELL_FILENAME;

/// Resolved project paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Directory relative paths were resolved against
    pub project_root: PathBuf,

    /// Source directory holding `.hpy` documents
    pub input_dir: PathBuf,

    /// Directory the site is written to
    pub output_dir: PathBuf,

    /// Name of the static asset subdirectory, if static handling is enabled
    pub static_dir_name: Option<String>,

    /// Set when a single document is compiled on its own
    pub single_file: Option<PathBuf>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            input_dir: PathBuf::from("src"),
            output_dir: PathBuf::from("dist"),
            static_dir_name: None,
            single_file: None,
        }
    }
}

impl ProjectConfig {
    /// Configuration for compiling one document with no layout or static handling.
    pub fn single_file(file: &Path, output_dir: PathBuf) -> Self {
        let file = normalize_path(file);
        let parent = file.parent().map(Path::to_path_buf).unwrap_or_default();
        Self {
            project_root: parent.clone(),
            input_dir: parent,
            output_dir: normalize_path(&output_dir),
            static_dir_name: None,
            single_file: Some(file),
        }
    }

    /// The same configuration with `.` and `..` removed from every path.
    ///
    /// Source paths from walks and script resolution are compared against
    /// these directories component by component.
    pub fn normalized(self) -> Self {
        Self {
            project_root: normalize_path(&self.project_root),
            input_dir: normalize_path(&self.input_dir),
            output_dir: normalize_path(&self.output_dir),
            static_dir_name: self.static_dir_name,
            single_file: self.single_file.as_deref().map(normalize_path),
        }
    }

    /// Static asset directory under the input dir.
    pub fn static_source_dir(&self) -> Option<PathBuf> {
        self.static_dir_name
            .as_ref()
            .map(|name| self.input_dir.join(name))
    }

    /// Mirror of the static asset directory under the output dir.
    pub fn static_output_dir(&self) -> Option<PathBuf> {
        self.static_dir_name
            .as_ref()
            .map(|name| self.output_dir.join(name))
    }

    /// Layout file at the input root.
    pub fn layout_path(&self) -> PathBuf {
        self.input_dir.join(LAYOUT_FILENAME)
    }

    /// App shell at the input root.
    pub fn app_shell_path(&self) -> PathBuf {
        self.input_dir.join(APP_SHELL_FILENAME)
    }

    /// Context used to resolve script references.
    pub fn parse_context(&self) -> ParseContext {
        ParseContext {
            input_dir: self.input_dir.clone(),
            static_dir: self.static_source_dir(),
        }
    }

    /// Mirrored output path of a file inside the input dir.
    ///
    /// `None` for paths outside the input dir.
    pub fn mirror_path(&self, source: &Path) -> Option<PathBuf> {
        let source = normalize_path(source);
        let relative = source.strip_prefix(normalize_path(&self.input_dir)).ok()?;
        Some(self.output_dir.join(relative))
    }

    /// Output HTML path of a page.
    pub fn page_output_path(&self, page: &Path) -> Option<PathBuf> {
        self.mirror_path(page).map(|path| path.with_extension("html"))
    }

    /// Whether `path` lies in the static asset directory.
    pub fn is_static(&self, path: &Path) -> bool {
        self.static_source_dir()
            .is_some_and(|dir| path.starts_with(dir))
    }

    /// Whether `path` is a page document.
    pub fn is_page(&self, path: &Path) -> bool {
        if let Some(file) = &self.single_file {
            return path == file;
        }

        path.starts_with(&self.input_dir)
            && !path.starts_with(&self.output_dir)
            && !self.is_static(path)
            && path.extension().is_some_and(|ext| ext == DOCUMENT_EXTENSION)
            && path.file_name().is_some_and(|name| name != LAYOUT_FILENAME)
    }
}

/// Development or production output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildMode {
    /// Brython debug level 1, CSS kept as written
    #[default]
    Development,

    /// Brython debug level 0, CSS minified
    Production,
}

impl BuildMode {
    /// Value passed to `brython({'debug': N})`.
    pub fn brython_debug(self) -> u8 {
        match self {
            Self::Development => 1,
            Self::Production => 0,
        }
    }
}

/// Options that affect the emitted HTML.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Output mode
    pub mode: BuildMode,

    /// Inject the live reload client
    pub live_reload: bool,
}

impl BuildOptions {
    /// Options for watch mode.
    pub fn watch() -> Self {
        Self {
            mode: BuildMode::Development,
            live_reload: true,
        }
    }

    /// Options for a production build.
    pub fn production() -> Self {
        Self {
            mode: BuildMode::Production,
            live_reload: false,
        }
    }
}
