//! Layout documents.

use std::path::Path;

use crate::error::ParseError;
use crate::parser::SourceDocument;
use crate::script::ParseContext;

/// File name of the layout at the input root.
pub const LAYOUT_FILENAME: &str = "_layout.hpy";

/// Marker replaced by each page's body.
pub const LAYOUT_PLACEHOLDER: &str = "<!-- HPY_PAGE_CONTENT -->";

/// A document whose body contains the placeholder exactly once.
#[derive(Debug, Clone)]
pub struct LayoutDocument {
    document: SourceDocument,
}

impl LayoutDocument {
    /// Validate a parsed document as a layout.
    pub fn new(document: SourceDocument) -> Result<Self, ParseError> {
        let count = document.body.matches(LAYOUT_PLACEHOLDER).count();
        if count != 1 {
            return Err(ParseError::Placeholder {
                path: document.path.clone(),
                count,
            });
        }

        if document.styles.is_empty() {
            tracing::debug!("Layout {} has no <style> section", document.path.display());
        }

        Ok(Self { document })
    }

    /// Read, parse and validate a layout file.
    pub fn load(path: &Path, ctx: &ParseContext) -> Result<Self, ParseError> {
        Self::new(SourceDocument::load(path, ctx)?)
    }

    /// The underlying document.
    pub fn document(&self) -> &SourceDocument {
        &self.document
    }

    /// Substitute a page body for the placeholder.
    pub fn wrap(&self, page_body: &str) -> String {
        self.document
            .body
            .replacen(LAYOUT_PLACEHOLDER, page_body, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::parser::parse_document;
    use std::path::PathBuf;

    fn parse(source: &str) -> SourceDocument {
        let ctx = ParseContext {
            input_dir: PathBuf::from("/nonexistent/src"),
            static_dir: None,
        };
        parse_document(Path::new("/nonexistent/src/_layout.hpy"), source, &ctx).unwrap()
    }

    #[test]
    fn wraps_page_body() {
        let layout = LayoutDocument::new(parse(
            "<html><header>H</header><!-- HPY_PAGE_CONTENT --><footer>F</footer></html>",
        ))
        .unwrap();

        let merged = layout.wrap("<p>Page</p>");

        assert_eq!(merged, "<header>H</header><p>Page</p><footer>F</footer>");
        assert!(!merged.contains(LAYOUT_PLACEHOLDER));
    }

    #[test]
    fn rejects_missing_placeholder() {
        let err = LayoutDocument::new(parse("<html>No placeholder</html>")).unwrap_err();

        assert!(matches!(err, ParseError::Placeholder { count: 0, .. }));
        assert_eq!(err.kind(), ErrorKind::Structure);
    }

    #[test]
    fn rejects_duplicate_placeholder() {
        let err = LayoutDocument::new(parse(
            "<html><!-- HPY_PAGE_CONTENT --><!-- HPY_PAGE_CONTENT --></html>",
        ))
        .unwrap_err();

        assert!(matches!(err, ParseError::Placeholder { count: 2, .. }));
    }
}
