//! Project builder.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use walkdir::WalkDir;

use hpy_document::{LayoutDocument, ParseError, SourceDocument, DOCUMENT_EXTENSION};

use crate::assets::AssetPipeline;
use crate::classify::ProjectIndex;
use crate::compositor::{AppShell, CompiledPage, Compositor};
use crate::config::{BuildOptions, ProjectConfig};

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildResult {
    /// Number of pages written
    pub pages: usize,

    /// Number of script files written
    pub scripts: usize,

    /// Number of static files copied
    pub static_files: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,

    /// Layout, pages and script references found during the build
    pub index: ProjectIndex,
}

/// A page that failed to compile.
#[derive(Debug)]
pub struct PageFailure {
    /// Page document
    pub path: PathBuf,
    /// What went wrong
    pub reason: String,
    /// Explicit script the page references but which does not exist yet
    pub missing_script: Option<PathBuf>,
}

impl fmt::Display for PageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Input directory not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("{} is outside the input directory", .0.display())]
    OutsideInput(PathBuf),

    #[error("Failed to scan {}: {source}", .path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Invalid layout: {0}")]
    Layout(#[source] ParseError),

    #[error("Failed to read app shell {}: {source}", .path.display())]
    AppShell {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Failed to render {}: {message}", .path.display())]
    Template { path: PathBuf, message: String },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} page(s) failed to build:\n{}", .0.len(), format_failures(.0))]
    Pages(Vec<PageFailure>),
}

impl BuildError {
    /// `(page, script)` pairs for explicit scripts that were referenced but not found.
    pub fn missing_scripts(&self) -> Vec<(PathBuf, PathBuf)> {
        match self {
            Self::Parse(ParseError::ScriptNotFound { path, resolved, .. }) => {
                vec![(path.clone(), resolved.clone())]
            }
            Self::Pages(failures) => failures
                .iter()
                .filter_map(|f| Some((f.path.clone(), f.missing_script.clone()?)))
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn format_failures(failures: &[PageFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("  {f}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Builds a project, or single pages of it.
pub struct ProjectBuilder {
    config: ProjectConfig,
    compositor: Compositor,
}

impl ProjectBuilder {
    /// Create a new project builder.
    pub fn new(config: ProjectConfig, options: BuildOptions) -> Self {
        Self {
            config: config.normalized(),
            compositor: Compositor::new(options),
        }
    }

    /// Project configuration.
    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Build every page.
    ///
    /// Static assets are synced first. If any page fails, the failures are
    /// returned together and no page is written.
    pub fn build(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();

        if let Some(file) = &self.config.single_file {
            let compiled = self.compile_file(file)?;
            let mut index = ProjectIndex::default();
            index.record_page(&compiled.source, compiled.explicit_script.as_deref());

            return Ok(BuildResult {
                pages: 1,
                scripts: compiled.script_files.len(),
                static_files: 0,
                duration_ms: start.elapsed().as_millis() as u64,
                output_dir: self.config.output_dir.clone(),
                index,
            });
        }

        if !self.config.input_dir.is_dir() {
            return Err(BuildError::InputNotFound(self.config.input_dir.clone()));
        }

        fs::create_dir_all(&self.config.output_dir).map_err(|source| BuildError::Write {
            path: self.config.output_dir.clone(),
            source,
        })?;

        let static_files =
            AssetPipeline::sync_static(&self.config).map_err(|source| BuildError::Write {
                path: self.config.static_output_dir().unwrap_or_default(),
                source,
            })?;

        let layout = self.load_layout()?;
        let shell = self.load_app_shell()?;
        let pages = self.discover_pages()?;

        tracing::debug!("Compiling {} page(s)", pages.len());

        let mut compiled = Vec::with_capacity(pages.len());
        let mut failures = Vec::new();

        for page in &pages {
            match self.compile_page(page, layout.as_ref(), shell.as_ref()) {
                Ok(result) => compiled.push(result),
                Err(e) => {
                    tracing::debug!("Page failed: {}", e);
                    failures.push(PageFailure {
                        path: page.clone(),
                        reason: e.to_string(),
                        missing_script: e.missing_scripts().into_iter().next().map(|(_, s)| s),
                    });
                }
            }
        }

        if !failures.is_empty() {
            return Err(BuildError::Pages(failures));
        }

        let mut index = ProjectIndex {
            layout: layout.as_ref().map(|l| l.document().path.clone()),
            ..Default::default()
        };
        let mut written_scripts = HashSet::new();

        for page in &compiled {
            for script in &page.script_files {
                if written_scripts.insert(script.source.clone()) {
                    self.write_script(&script.source, &script.output)?;
                }
            }
            write_html(page)?;
            index.record_page(&page.source, page.explicit_script.as_deref());
        }

        let duration = start.elapsed();

        Ok(BuildResult {
            pages: compiled.len(),
            scripts: written_scripts.len(),
            static_files,
            duration_ms: duration.as_millis() as u64,
            output_dir: self.config.output_dir.clone(),
            index,
        })
    }

    /// Rebuild one page against the layout and app shell currently on disk.
    ///
    /// Nothing is written unless the page compiles.
    pub fn build_page(&self, page: &Path) -> Result<CompiledPage, BuildError> {
        if self.config.single_file.is_some() {
            return self.compile_file(page);
        }

        let layout = self.load_layout()?;
        let shell = self.load_app_shell()?;
        let compiled = self.compile_page(page, layout.as_ref(), shell.as_ref())?;

        self.write_compiled(&compiled)?;
        Ok(compiled)
    }

    /// Compile one document on its own: no layout, no app shell, no static handling.
    pub fn compile_file(&self, file: &Path) -> Result<CompiledPage, BuildError> {
        let compiled = self.compile_page(file, None, None)?;
        self.write_compiled(&compiled)?;
        Ok(compiled)
    }

    /// Delete the HTML produced for a page.
    pub fn remove_page(&self, page: &Path) -> Result<(), BuildError> {
        let output = self
            .config
            .page_output_path(page)
            .ok_or_else(|| BuildError::OutsideInput(page.to_path_buf()))?;

        match fs::remove_file(&output) {
            Ok(()) => {
                tracing::info!("Removed {}", output.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(BuildError::Write {
                path: output,
                source,
            }),
        }
    }

    /// Mirror one static file or directory.
    pub fn sync_static_path(&self, path: &Path) -> Result<usize, BuildError> {
        AssetPipeline::sync_static_path(&self.config, path).map_err(|source| BuildError::Write {
            path: self.config.mirror_path(path).unwrap_or_else(|| path.to_path_buf()),
            source,
        })
    }

    /// Remove the mirror of one static file or directory.
    pub fn remove_static_path(&self, path: &Path) -> Result<(), BuildError> {
        AssetPipeline::remove_static_path(&self.config, path).map_err(|source| BuildError::Write {
            path: self.config.mirror_path(path).unwrap_or_else(|| path.to_path_buf()),
            source,
        })
    }

    /// Layout at the input root, validated.
    fn load_layout(&self) -> Result<Option<LayoutDocument>, BuildError> {
        let path = self.config.layout_path();
        if !path.is_file() {
            return Ok(None);
        }

        let layout = LayoutDocument::load(&path, &self.config.parse_context())
            .map_err(BuildError::Layout)?;
        tracing::debug!("Using layout {}", path.display());
        Ok(Some(layout))
    }

    /// App shell at the input root.
    fn load_app_shell(&self) -> Result<Option<AppShell>, BuildError> {
        let path = self.config.app_shell_path();
        if !path.is_file() {
            return Ok(None);
        }

        let shell = AppShell::load(&path).map_err(|source| BuildError::AppShell {
            path: path.clone(),
            source,
        })?;
        tracing::debug!("Using app shell {}", path.display());
        Ok(Some(shell))
    }

    /// All page documents, sorted by path.
    fn discover_pages(&self) -> Result<Vec<PathBuf>, BuildError> {
        let static_dir = self.config.static_source_dir();
        let output_dir = &self.config.output_dir;

        let walker = WalkDir::new(&self.config.input_dir)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| {
                let path = e.path();
                !path.starts_with(output_dir)
                    && !static_dir.as_ref().is_some_and(|dir| path.starts_with(dir))
            });

        let mut pages = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|source| BuildError::Scan {
                path: source
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.config.input_dir.clone()),
                source,
            })?;

            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().is_some_and(|ext| ext == DOCUMENT_EXTENSION)
                && self.config.is_page(path)
            {
                pages.push(entry.into_path());
            }
        }

        pages.sort();
        Ok(pages)
    }

    fn compile_page(
        &self,
        page: &Path,
        layout: Option<&LayoutDocument>,
        shell: Option<&AppShell>,
    ) -> Result<CompiledPage, BuildError> {
        let document = SourceDocument::load(page, &self.config.parse_context())?;

        self.compositor
            .compose(&self.config, layout, shell, &document)
            .map_err(|e| BuildError::Template {
                path: page.to_path_buf(),
                message: e.to_string(),
            })
    }

    /// Write script files first, then the HTML.
    fn write_compiled(&self, compiled: &CompiledPage) -> Result<(), BuildError> {
        for script in &compiled.script_files {
            self.write_script(&script.source, &script.output)?;
        }
        write_html(compiled)
    }

    fn write_script(&self, source: &Path, output: &Path) -> Result<(), BuildError> {
        AssetPipeline::copy_script(source, output).map_err(|e| BuildError::Write {
            path: output.to_path_buf(),
            source: e,
        })?;
        tracing::debug!("Wrote script {}", output.display());
        Ok(())
    }
}

fn write_html(compiled: &CompiledPage) -> Result<(), BuildError> {
    AssetPipeline::write_atomic(&compiled.output_path, compiled.html.as_bytes()).map_err(
        |source| BuildError::Write {
            path: compiled.output_path.clone(),
            source,
        },
    )?;
    tracing::debug!("Wrote {}", compiled.output_path.display());
    Ok(())
}
