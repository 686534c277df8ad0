//! Watch mode and development server for hpy.
//!
//! File changes are batched by [`FileWatcher`], turned into rebuild actions by
//! the [`Orchestrator`], and announced to browsers through the [`ReloadHub`].

pub mod orchestrator;
pub mod reload;
pub mod server;
pub mod watcher;

pub use orchestrator::{plan, ChangeEvent, ChangeKind, Orchestrator, RebuildAction};
pub use reload::{ReloadHub, ReloadMessage};
pub use server::{DevServer, DevServerConfig, ServerError};
pub use watcher::FileWatcher;
