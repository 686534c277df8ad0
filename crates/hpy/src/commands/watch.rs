//! Watch command: build, serve and rebuild on change.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hpy_server::{DevServer, DevServerConfig, FileWatcher, Orchestrator, ReloadHub};
use hpy_static::{BuildOptions, ProjectBuilder, ProjectConfig, ProjectIndex};

use crate::config::{OutputTarget, Settings};

/// Run the watch command.
pub async fn run(
    config: Option<&Path>,
    source: Option<PathBuf>,
    output: Option<PathBuf>,
    port: u16,
    open: bool,
) -> Result<()> {
    let settings = Settings::load(config, source.as_deref())?;
    let project = settings.project_config(source.as_deref(), output.as_deref(), OutputTarget::Dev)?;
    let root = project.output_dir.clone();
    let watched = watch_root(&project);

    let builder = ProjectBuilder::new(project, BuildOptions::watch());

    // Initial build failures are logged; watching starts regardless.
    let index = match builder.build() {
        Ok(result) => {
            tracing::info!("Built {} pages in {}ms", result.pages, result.duration_ms);
            result.index
        }
        Err(e) => {
            tracing::error!("Initial build failed: {}", e);
            ProjectIndex::default()
        }
    };

    let hub = ReloadHub::new();
    let orchestrator = Orchestrator::new(builder, index, Some(hub.clone()));

    let (_watcher, batches) = FileWatcher::new(std::slice::from_ref(&watched))
        .with_context(|| format!("Failed to watch {}", watched.display()))?;
    tracing::info!("Watching {} for changes", watched.display());

    tokio::spawn(orchestrator.run(batches));

    let config = DevServerConfig {
        root,
        port,
        open,
        ..Default::default()
    };

    DevServer::new(config, hub).start().await?;

    Ok(())
}

/// Directory to watch: the input dir, or the single file's directory.
fn watch_root(project: &ProjectConfig) -> PathBuf {
    project
        .single_file
        .as_ref()
        .and_then(|file| file.parent())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| project.input_dir.clone())
}
