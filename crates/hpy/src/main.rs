//! hpy CLI - build documentation sites from `.hpy` documents.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

use commands::init::Template;

#[derive(Parser)]
#[command(name = "hpy")]
#[command(about = "Build Brython-powered sites from .hpy documents")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to hpy.toml (searched upwards from the source when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new project from a template
    Init {
        /// Directory to create the project in
        dir: PathBuf,

        /// Project template
        #[arg(short, long, value_enum, default_value_t = Template::Full)]
        template: Template,
    },

    /// Build the site once
    Build {
        /// Source directory or single .hpy file (defaults to config or "src")
        source: Option<PathBuf>,

        /// Output directory (defaults to config or "dist")
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Minify styles and disable Brython debugging
        #[arg(long)]
        production: bool,
    },

    /// Serve the development output
    Serve {
        /// Source directory or single .hpy file to build before serving
        source: Option<PathBuf>,

        /// Output directory (defaults to config or ".hpy_dev_output")
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Serve the existing output without building
        #[arg(long)]
        no_build: bool,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },

    /// Build, serve and rebuild on change with live reload
    Watch {
        /// Source directory or single .hpy file (defaults to config or "src")
        source: Option<PathBuf>,

        /// Output directory (defaults to config or ".hpy_dev_output")
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let config = cli.config.as_deref();

    match cli.command {
        Commands::Init { dir, template } => {
            commands::init::run(&dir, template).await?;
        }
        Commands::Build {
            source,
            output,
            production,
        } => {
            commands::build::run(config, source, output, production).await?;
        }
        Commands::Serve {
            source,
            output,
            port,
            no_build,
            no_open,
        } => {
            commands::serve::run(config, source, output, port, !no_build, !no_open).await?;
        }
        Commands::Watch {
            source,
            output,
            port,
            no_open,
        } => {
            commands::watch::run(config, source, output, port, !no_open).await?;
        }
    }

    Ok(())
}
