//! Parser for `.hpy` documents.
//!
//! A document carries a required `<html>` body, optional `<style>` sections, an
//! optional `<hpy-head>` zone and an optional Brython script, either inline
//! `<python>` blocks or a file on disk.

pub mod error;
pub mod head;
pub mod layout;
pub mod parser;
pub mod script;

/// Extension of source documents.
pub const DOCUMENT_EXTENSION: &str = "hpy";

/// Extension of script files.
pub const SCRIPT_EXTENSION: &str = "py";

pub use error::{ErrorKind, ParseError};
pub use head::HeadZone;
pub use layout::{LayoutDocument, LAYOUT_FILENAME, LAYOUT_PLACEHOLDER};
pub use parser::{parse_document, SourceDocument};
pub use script::{normalize_path, ParseContext, ScriptOrigin};
