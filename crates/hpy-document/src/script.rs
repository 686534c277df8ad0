//! Script origin resolution.

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ParseError;
use crate::SCRIPT_EXTENSION;

/// Where a document's script comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOrigin {
    /// Concatenated `<python>` blocks, dedented.
    Inline(String),

    /// `<stem>.py` next to the document.
    Companion(PathBuf),

    /// `<python src="...">` reference.
    Explicit {
        /// The attribute value as written
        reference: String,
        /// Resolved, normalized path inside the input directory
        path: PathBuf,
    },
}

impl ScriptOrigin {
    /// Path of the script file, if the origin is file-based.
    pub fn file(&self) -> Option<&Path> {
        match self {
            Self::Inline(_) => None,
            Self::Companion(path) | Self::Explicit { path, .. } => Some(path),
        }
    }
}

/// Directories a script reference is checked against.
#[derive(Debug, Clone)]
pub struct ParseContext {
    /// Project input directory; explicit references must stay inside it.
    pub input_dir: PathBuf,

    /// Static asset directory, if configured; explicit references must stay out of it.
    pub static_dir: Option<PathBuf>,
}

impl ParseContext {
    /// Context for a document whose own directory acts as the input root.
    pub fn standalone(document: &Path) -> Self {
        Self {
            input_dir: document
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
            static_dir: None,
        }
    }
}

static PYTHON_SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<python\b[^>]*?\bsrc\s*=\s*(?:"([^"]*)"|'([^']*)')[^>]*>"#)
        .expect("Invalid python src regex")
});

/// Find the first `<python src="...">` reference in `text`.
///
/// Later references are ignored. Empty attribute values count as absent.
pub fn find_explicit_reference(text: &str) -> Option<String> {
    let mut references = PYTHON_SRC_RE.captures_iter(text).filter_map(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().trim().to_string())
    });

    let first = references.next()?;
    if first.is_empty() {
        tracing::warn!("Ignoring <python src> with an empty value");
        return None;
    }

    let ignored = references.count();
    if ignored > 0 {
        tracing::debug!("{} additional <python src> tag(s) ignored, using '{}'", ignored, first);
    }

    Some(first)
}

/// Resolve an explicit reference relative to the referencing document.
pub fn resolve_explicit(
    document: &Path,
    reference: &str,
    ctx: &ParseContext,
) -> Result<PathBuf, ParseError> {
    let base = document.parent().unwrap_or(Path::new(""));
    let resolved = normalize_path(&base.join(reference));
    let input_dir = normalize_path(&ctx.input_dir);

    if !resolved.starts_with(&input_dir) {
        return Err(ParseError::ScriptOutsideInput {
            path: document.to_path_buf(),
            reference: reference.to_string(),
            resolved,
            input_dir,
        });
    }

    if let Some(static_dir) = &ctx.static_dir {
        let static_dir = normalize_path(static_dir);
        if resolved.starts_with(&static_dir) {
            return Err(ParseError::ScriptInStaticDir {
                path: document.to_path_buf(),
                reference: reference.to_string(),
                static_dir,
            });
        }
    }

    if !resolved.is_file() {
        return Err(ParseError::ScriptNotFound {
            path: document.to_path_buf(),
            reference: reference.to_string(),
            resolved,
        });
    }

    Ok(resolved)
}

/// Locate `<stem>.py` next to the document.
pub fn find_companion(document: &Path, ctx: &ParseContext) -> Option<PathBuf> {
    let candidate = document.with_extension(SCRIPT_EXTENSION);
    if !candidate.is_file() {
        return None;
    }

    if let Some(static_dir) = &ctx.static_dir {
        if normalize_path(&candidate).starts_with(normalize_path(static_dir)) {
            return None;
        }
    }

    Some(candidate)
}

/// Join inline script blocks, each dedented and trimmed, with a blank line.
///
/// Returns `None` when every block is empty.
pub fn join_inline<'a>(blocks: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let parts: Vec<String> = blocks
        .into_iter()
        .map(|block| dedent(block).trim().to_string())
        .filter(|block| !block.is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Remove the common leading whitespace from every line.
///
/// Whitespace-only lines do not take part in computing the margin.
pub fn dedent(text: &str) -> String {
    let margin = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                line.get(margin..).unwrap_or(line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Normalize `.` and `..` components without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn finds_first_explicit_reference() {
        let text = r#"<python src="a.py"></python><python src='b.py'></python>"#;
        assert_eq!(find_explicit_reference(text), Some("a.py".to_string()));

        assert_eq!(
            find_explicit_reference(r#"<PYTHON type="x" SRC = 'lib/c.py'></PYTHON>"#),
            Some("lib/c.py".to_string())
        );
        assert_eq!(find_explicit_reference("<python>print(1)</python>"), None);
        assert_eq!(find_explicit_reference(r#"<python src=""></python>"#), None);
    }

    #[test]
    fn dedents_blocks() {
        assert_eq!(dedent("    a\n      b\n\n    c"), "a\n  b\n\nc");
        assert_eq!(dedent("a\n b"), "a\n b");
    }

    #[test]
    fn joins_inline_blocks() {
        let joined = join_inline(["\n    x = 1\n    y = 2\n", "  ", "print(x)"]).unwrap();
        assert_eq!(joined, "x = 1\ny = 2\n\nprint(x)");
        assert_eq!(join_inline(["", "  \n"]), None);
    }

    #[test]
    fn normalizes_paths() {
        assert_eq!(
            normalize_path(Path::new("/p/src/pages/../scripts/./a.py")),
            PathBuf::from("/p/src/scripts/a.py")
        );
        assert_eq!(
            normalize_path(Path::new("/p/src/../../x.py")),
            PathBuf::from("/x.py")
        );
        assert_eq!(normalize_path(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn rejects_reference_outside_input() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(temp.path().join("outside.py"), "print('x')").unwrap();

        let ctx = ParseContext {
            input_dir: src.clone(),
            static_dir: None,
        };
        let err = resolve_explicit(&src.join("page.hpy"), "../outside.py", &ctx).unwrap_err();

        assert!(matches!(err, ParseError::ScriptOutsideInput { .. }));
    }

    #[test]
    fn rejects_reference_into_static_dir() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("assets")).unwrap();
        fs::write(src.join("assets/a.py"), "").unwrap();

        let ctx = ParseContext {
            input_dir: src.clone(),
            static_dir: Some(src.join("assets")),
        };
        let err = resolve_explicit(&src.join("page.hpy"), "assets/a.py", &ctx).unwrap_err();

        assert!(matches!(err, ParseError::ScriptInStaticDir { .. }));
    }

    #[test]
    fn resolves_nested_reference() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("sub/scripts")).unwrap();
        fs::write(src.join("sub/scripts/n.py"), "").unwrap();

        let ctx = ParseContext {
            input_dir: src.clone(),
            static_dir: None,
        };
        let resolved = resolve_explicit(&src.join("sub/page.hpy"), "scripts/n.py", &ctx).unwrap();

        assert_eq!(resolved, src.join("sub/scripts/n.py"));
    }
}
