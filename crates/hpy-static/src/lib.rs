//! Project builder for hpy sites.
//!
//! Merges `.hpy` pages into the project layout and app shell, emits Brython
//! scripts next to the HTML and mirrors the static asset directory.

pub mod assets;
pub mod builder;
pub mod classify;
pub mod compositor;
pub mod config;

pub use assets::AssetPipeline;
pub use builder::{BuildError, BuildResult, PageFailure, ProjectBuilder};
pub use classify::{ProjectIndex, SourceKind};
pub use compositor::{
    AppShell, CompiledPage, Compositor, ScriptFile, APP_SHELL_FILENAME, HELPER_PREAMBLE,
    LIVE_RELOAD_PATH,
};
pub use config::{BuildMode, BuildOptions, ProjectConfig};
