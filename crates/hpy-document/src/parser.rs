//! `.hpy` document parser.

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ParseError;
use crate::head::HeadZone;
use crate::script::{
    find_companion, find_explicit_reference, join_inline, resolve_explicit, ParseContext,
    ScriptOrigin,
};

static BODY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<html(?:\s[^>]*)?>(.*?)</html\s*>").expect("Invalid body regex")
});

static HEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<hpy-head(?:\s[^>]*)?>(.*?)</hpy-head\s*>").expect("Invalid head regex")
});

static STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<style(?:\s[^>]*)?>(.*?)</style\s*>").expect("Invalid style regex")
});

static PYTHON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<python(?:\s[^>]*)?>(.*?)</python\s*>").expect("Invalid python regex")
});

/// A parsed `.hpy` document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Document path
    pub path: PathBuf,

    /// Raw document text
    pub source: String,

    /// Exact inner text of the `<html>` section
    pub body: String,

    /// Inner text of each top-level `<style>` section, in document order
    pub styles: Vec<String>,

    /// `<hpy-head>` section, if present
    pub head: Option<HeadZone>,

    /// Resolved script origin, if the document has a script
    pub script: Option<ScriptOrigin>,
}

impl SourceDocument {
    /// Read and parse a document from disk.
    pub fn load(path: &Path, ctx: &ParseContext) -> Result<Self, ParseError> {
        let source = fs::read_to_string(path).map_err(|source| ParseError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        parse_document(path, &source, ctx)
    }

    /// Style sections joined with a newline.
    pub fn combined_styles(&self) -> String {
        self.styles.join("\n")
    }

    /// Document file name, for labels and log lines.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Parse document text.
///
/// The body section is required. Head, style and script sections are looked up
/// outside the body, so markup inside the body is never mistaken for them.
pub fn parse_document(
    path: &Path,
    source: &str,
    ctx: &ParseContext,
) -> Result<SourceDocument, ParseError> {
    let body_caps = BODY_RE
        .captures(source)
        .ok_or_else(|| ParseError::MissingBody {
            path: path.to_path_buf(),
        })?;
    let body = body_caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let outside_body = cut(source, body_caps.get(0).map(|m| m.range()));

    let head_caps = HEAD_RE.captures(&outside_body);
    let head = head_caps
        .as_ref()
        .and_then(|caps| caps.get(1))
        .map(|m| HeadZone::parse(m.as_str()));
    let top_level = cut(
        &outside_body,
        head_caps.as_ref().and_then(|caps| caps.get(0)).map(|m| m.range()),
    );

    let styles: Vec<String> = STYLE_RE
        .captures_iter(&top_level)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect();

    let script = resolve_script(path, &top_level, ctx)?;

    Ok(SourceDocument {
        path: path.to_path_buf(),
        source: source.to_string(),
        body: body.to_string(),
        styles,
        head,
        script,
    })
}

/// Pick the script origin: explicit reference, then companion file, then inline blocks.
fn resolve_script(
    path: &Path,
    top_level: &str,
    ctx: &ParseContext,
) -> Result<Option<ScriptOrigin>, ParseError> {
    let inline = || {
        join_inline(
            PYTHON_RE
                .captures_iter(top_level)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str()),
        )
    };

    if let Some(reference) = find_explicit_reference(top_level) {
        let resolved = resolve_explicit(path, &reference, ctx)?;
        if inline().is_some() {
            tracing::warn!(
                "Inline <python> content in {} ignored because <python src=\"{}\"> is used",
                path.display(),
                reference
            );
        }
        return Ok(Some(ScriptOrigin::Explicit {
            reference,
            path: resolved,
        }));
    }

    if let Some(companion) = find_companion(path, ctx) {
        if inline().is_some() {
            tracing::debug!(
                "Inline <python> content in {} ignored in favour of {}",
                path.display(),
                companion.display()
            );
        }
        return Ok(Some(ScriptOrigin::Companion(companion)));
    }

    Ok(inline().map(ScriptOrigin::Inline))
}

/// Remove `range` from `text`.
fn cut(text: &str, range: Option<Range<usize>>) -> String {
    match range {
        Some(range) => format!("{}\n{}", &text[..range.start], &text[range.end..]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn memory_ctx() -> ParseContext {
        ParseContext {
            input_dir: PathBuf::from("/nonexistent/src"),
            static_dir: None,
        }
    }

    fn parse(source: &str) -> Result<SourceDocument, ParseError> {
        parse_document(Path::new("/nonexistent/src/page.hpy"), source, &memory_ctx())
    }

    #[test]
    fn parses_complete_document() {
        let source = r#"<html>
    <div class="page">Hello</div>
</html>
<hpy-head>
    <title>Index</title>
    <meta name="description" content="d">
</hpy-head>
<style>.page { color: red; }</style>
<python>
    from browser import alert
    alert("hi")
</python>
"#;

        let doc = parse(source).unwrap();

        assert_eq!(doc.body, "\n    <div class=\"page\">Hello</div>\n");
        assert_eq!(doc.styles, vec![".page { color: red; }".to_string()]);

        let head = doc.head.unwrap();
        assert_eq!(head.title.as_deref(), Some("Index"));
        assert_eq!(head.content, r#"<meta name="description" content="d">"#);

        assert_eq!(
            doc.script,
            Some(ScriptOrigin::Inline(
                "from browser import alert\nalert(\"hi\")".to_string()
            ))
        );
    }

    #[test]
    fn body_round_trips_exactly() {
        let inner = "\n  <p>Spacing  kept</p>\n\t<br>\n";
        let doc = parse(&format!("<style>p{{}}</style><html lang=\"en\">{inner}</html>")).unwrap();

        assert_eq!(doc.body, inner);
        assert!(doc
            .source
            .ends_with(&format!("<html lang=\"en\">{}</html>", doc.body)));
    }

    #[test]
    fn fails_without_body() {
        let err = parse("<style>p{}</style><python>x = 1</python>").unwrap_err();

        assert!(matches!(err, ParseError::MissingBody { .. }));
        assert_eq!(err.kind(), ErrorKind::Structure);
    }

    #[test]
    fn joins_styles_in_order() {
        let doc = parse("<style>a{}</style><html></html><STYLE media=\"print\">b{}</STYLE>").unwrap();

        assert_eq!(doc.styles.len(), 2);
        assert_eq!(doc.combined_styles(), "a{}\nb{}");
    }

    #[test]
    fn ignores_sections_inside_body() {
        let doc = parse("<html><style>inner{}</style><python>inner()</python></html>").unwrap();

        assert!(doc.styles.is_empty());
        assert!(doc.script.is_none());
        assert!(doc.body.contains("<style>inner{}</style>"));
    }

    #[test]
    fn concatenates_inline_blocks() {
        let doc = parse("<html></html><python>a = 1</python><python>b = 2</python>").unwrap();

        assert_eq!(doc.script, Some(ScriptOrigin::Inline("a = 1\n\nb = 2".to_string())));
    }

    #[test]
    fn companion_wins_over_inline() {
        let temp = tempdir().unwrap();
        let page = temp.path().join("conv.hpy");
        fs::write(temp.path().join("conv.py"), "print('companion')").unwrap();

        let ctx = ParseContext {
            input_dir: temp.path().to_path_buf(),
            static_dir: None,
        };
        let doc = parse_document(&page, "<html>x</html><python>print('inline')</python>", &ctx)
            .unwrap();

        assert_eq!(doc.script, Some(ScriptOrigin::Companion(temp.path().join("conv.py"))));
    }

    #[test]
    fn explicit_wins_over_companion() {
        let temp = tempdir().unwrap();
        let page = temp.path().join("page.hpy");
        fs::write(temp.path().join("page.py"), "").unwrap();
        fs::create_dir_all(temp.path().join("scripts")).unwrap();
        fs::write(temp.path().join("scripts/logic.py"), "").unwrap();
        fs::write(temp.path().join("scripts/other.py"), "").unwrap();

        let ctx = ParseContext {
            input_dir: temp.path().to_path_buf(),
            static_dir: None,
        };
        let doc = parse_document(
            &page,
            r#"<html>x</html><python src="scripts/logic.py"></python><python src="scripts/other.py"></python>"#,
            &ctx,
        )
        .unwrap();

        assert_eq!(
            doc.script,
            Some(ScriptOrigin::Explicit {
                reference: "scripts/logic.py".to_string(),
                path: temp.path().join("scripts/logic.py"),
            })
        );
    }

    #[test]
    fn escaping_reference_is_path_error() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(temp.path().join("evil.py"), "").unwrap();

        let ctx = ParseContext {
            input_dir: src.clone(),
            static_dir: None,
        };
        let err = parse_document(
            &src.join("page.hpy"),
            r#"<html>x</html><python src="../evil.py"></python>"#,
            &ctx,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PathResolution);
    }

    #[test]
    fn missing_explicit_script_fails() {
        let err = parse(r#"<html>x</html><python src="nope.py"></python>"#).unwrap_err();

        assert!(matches!(err, ParseError::ScriptNotFound { .. }));
    }

    #[test]
    fn no_script_is_none() {
        let doc = parse("<html><p>static</p></html>").unwrap();

        assert!(doc.script.is_none());
        assert!(doc.head.is_none());
    }
}
