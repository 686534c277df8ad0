//! Static site build command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hpy_static::{BuildOptions, ProjectBuilder};

use crate::config::{OutputTarget, Settings};

/// Run the build command.
pub async fn run(
    config: Option<&Path>,
    source: Option<PathBuf>,
    output: Option<PathBuf>,
    production: bool,
) -> Result<()> {
    let settings = Settings::load(config, source.as_deref())?;
    let project = settings.project_config(source.as_deref(), output.as_deref(), OutputTarget::Build)?;

    let options = if production {
        BuildOptions::production()
    } else {
        BuildOptions::default()
    };

    tracing::info!(
        "Building {} -> {}",
        project.single_file.as_ref().unwrap_or(&project.input_dir).display(),
        project.output_dir.display()
    );

    let result = ProjectBuilder::new(project, options)
        .build()
        .context("Build failed")?;

    tracing::info!(
        "Built {} pages with {} scripts and {} static files in {}ms",
        result.pages,
        result.scripts,
        result.static_files,
        result.duration_ms
    );

    tracing::info!("Output: {}", result.output_dir.display());

    Ok(())
}
