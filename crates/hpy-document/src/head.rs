//! Head zone extraction.

use std::sync::LazyLock;

use regex::Regex;

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title(?:\s[^>]*)?>(.*?)</title\s*>").expect("Invalid title regex")
});

/// Contents of a document's `<hpy-head>` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadZone {
    /// Text of the first `<title>` element, if non-empty
    pub title: Option<String>,

    /// Remaining head markup with the title element removed
    pub content: String,
}

impl HeadZone {
    /// Split raw head markup into its title and remaining content.
    pub fn parse(raw: &str) -> Self {
        let Some(caps) = TITLE_RE.captures(raw) else {
            return Self {
                title: None,
                content: raw.trim().to_string(),
            };
        };

        let title = caps
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .filter(|t| !t.is_empty());

        let span = caps.get(0).map(|m| m.range()).unwrap_or_default();
        let content = format!("{}{}", &raw[..span.start], &raw[span.end..]);

        Self {
            title,
            content: content.trim().to_string(),
        }
    }

    /// Whether the zone carries anything besides an empty title.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_empty()
    }
}
