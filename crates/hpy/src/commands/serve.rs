//! Development server command.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use hpy_server::{DevServer, DevServerConfig, ReloadHub};
use hpy_static::{BuildOptions, ProjectBuilder};

use crate::config::{OutputTarget, Settings};

/// Run the serve command.
pub async fn run(
    config: Option<&Path>,
    source: Option<PathBuf>,
    output: Option<PathBuf>,
    port: u16,
    build: bool,
    open: bool,
) -> Result<()> {
    let settings = Settings::load(config, source.as_deref())?;
    let project = settings.project_config(source.as_deref(), output.as_deref(), OutputTarget::Dev)?;
    let root = project.output_dir.clone();

    if build {
        let result = ProjectBuilder::new(project, BuildOptions::default())
            .build()
            .context("Build failed")?;
        tracing::info!("Built {} pages in {}ms", result.pages, result.duration_ms);
    } else if !root.is_dir() {
        bail!(
            "Directory not found: {}. Run 'hpy serve' without --no-build first.",
            root.display()
        );
    }

    let config = DevServerConfig {
        root,
        port,
        open,
        ..Default::default()
    };

    DevServer::new(config, ReloadHub::new()).start().await?;

    Ok(())
}
