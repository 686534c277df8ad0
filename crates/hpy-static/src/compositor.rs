//! Layout compositing and HTML emission.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use minijinja::{context, Environment};
use regex::{NoExpand, Regex};

use hpy_document::{HeadZone, LayoutDocument, ScriptOrigin, SourceDocument};

use crate::assets::AssetPipeline;
use crate::config::{BuildMode, BuildOptions, ProjectConfig};

/// File name of the app shell at the input root.
pub const APP_SHELL_FILENAME: &str = "_app.html";

/// App shell marker receiving styles and head content.
pub const APP_SHELL_HEAD_PLACEHOLDER: &str = "<!-- HPY_HEAD_CONTENT -->";

/// App shell marker receiving the page body.
pub const APP_SHELL_BODY_PLACEHOLDER: &str = "<!-- HPY_BODY_CONTENT -->";

/// Title used when neither documents nor app shell provide one.
pub const DEFAULT_TITLE: &str = "HPY Application";

/// Brython release loaded from the CDN.
pub const BRYTHON_VERSION: &str = "3.11.3";

/// WebSocket endpoint the live reload client connects to.
pub const LIVE_RELOAD_PATH: &str = "/__hpy/reload";

/// Helper functions prepended to every emitted script.
pub const HELPER_PREAMBLE: &str = r#"# --- hpy helpers ---
from browser import document

def byid(element_id):
    try:
        return document[element_id]
    except KeyError:
        return None

def qs(selector):
    return document.select_one(selector)

def qsa(selector):
    return document.select(selector)
# --- end hpy helpers ---
"#;

static SHELL_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title(?:\s[^>]*)?>(.*?)</title\s*>").expect("Invalid title regex")
});

static HEAD_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</head\s*>").expect("Invalid head end regex"));

static BODY_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</body\s*>").expect("Invalid body end regex"));

static BRYTHON_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)brython\s*\(\s*\{[^}]*\}\s*\)").expect("Invalid brython call regex")
});

/// Prepend the helper preamble unless the script already carries it.
pub fn with_helpers(code: &str) -> String {
    if code.contains(HELPER_PREAMBLE.trim()) {
        code.to_string()
    } else {
        format!("{HELPER_PREAMBLE}\n{code}")
    }
}

/// A script file the page references and the builder must copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFile {
    /// Script in the input tree
    pub source: PathBuf,
    /// Mirrored path in the output tree
    pub output: PathBuf,
}

/// A fully composited page, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPage {
    /// Source document
    pub source: PathBuf,

    /// HTML file to write
    pub output_path: PathBuf,

    /// Final HTML text
    pub html: String,

    /// Script files referenced by the HTML, layout first
    pub script_files: Vec<ScriptFile>,

    /// Script the page itself references through `<python src>`
    pub explicit_script: Option<PathBuf>,
}

/// User-supplied outer HTML document.
#[derive(Debug, Clone)]
pub struct AppShell {
    template: String,
    title: Option<String>,
}

impl AppShell {
    /// Wrap shell text, warning about missing placeholders.
    pub fn new(path: &Path, template: String) -> Self {
        for placeholder in [APP_SHELL_HEAD_PLACEHOLDER, APP_SHELL_BODY_PLACEHOLDER] {
            if !template.contains(placeholder) {
                tracing::warn!("App shell {} is missing {}", path.display(), placeholder);
            }
        }

        let title = SHELL_TITLE_RE
            .captures(&template)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|t| !t.is_empty());

        Self { template, title }
    }

    /// Read the shell from disk.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        Ok(Self::new(path, std::fs::read_to_string(path)?))
    }

    /// Title written in the shell itself.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn render(&self, parts: &PageParts, debug: u8) -> String {
        let title = parts
            .title
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or(DEFAULT_TITLE);
        let title_tag = format!("<title>{title}</title>");

        let mut html = if SHELL_TITLE_RE.is_match(&self.template) {
            SHELL_TITLE_RE
                .replace(&self.template, NoExpand(&title_tag))
                .into_owned()
        } else if let Some(head_end) = HEAD_END_RE.find(&self.template) {
            format!(
                "{}    {}\n{}",
                &self.template[..head_end.start()],
                title_tag,
                &self.template[head_end.start()..]
            )
        } else {
            self.template.clone()
        };

        let call = format!("brython({{'debug': {debug}}})");
        html = BRYTHON_CALL_RE.replace_all(&html, NoExpand(&call)).into_owned();

        let scripts = format!("\n{}\n", parts.tail());
        html = match BODY_END_RE.find(&html) {
            Some(body_end) => format!(
                "{}{}{}",
                &html[..body_end.start()],
                scripts,
                &html[body_end.start()..]
            ),
            None => html + &scripts,
        };

        let mut head_injection = Vec::new();
        if !parts.styles.is_empty() {
            head_injection.push(format!("<style>\n{}\n</style>", parts.styles));
        }
        if !parts.head.is_empty() {
            head_injection.push(parts.head.clone());
        }

        html.replace(APP_SHELL_HEAD_PLACEHOLDER, &head_injection.join("\n"))
            .replace(APP_SHELL_BODY_PLACEHOLDER, &parts.body)
    }
}

/// Pieces of a page before they are placed in a skeleton.
struct PageParts {
    title: Option<String>,
    head: String,
    styles: String,
    body: String,
    scripts: Vec<String>,
    reload: Option<String>,
}

impl PageParts {
    /// Script tags followed by the reload client.
    fn tail(&self) -> String {
        self.scripts
            .iter()
            .chain(self.reload.as_ref())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Merges a page with the layout and app shell.
pub struct Compositor {
    env: Environment<'static>,
    options: BuildOptions,
}

impl Compositor {
    /// Create a compositor with the built-in skeleton.
    pub fn new(options: BuildOptions) -> Self {
        let mut env = Environment::new();

        env.add_template_owned("page.html".to_string(), PAGE_TEMPLATE.to_string())
            .expect("Failed to add page template");

        Self { env, options }
    }

    /// Output options.
    pub fn options(&self) -> BuildOptions {
        self.options
    }

    /// Composite a page.
    pub fn compose(
        &self,
        config: &ProjectConfig,
        layout: Option<&LayoutDocument>,
        shell: Option<&AppShell>,
        page: &SourceDocument,
    ) -> Result<CompiledPage, minijinja::Error> {
        let output_path = config
            .page_output_path(&page.path)
            .ok_or_else(|| outside_input(&page.path))?;
        let page_dir = output_path.parent().unwrap_or(Path::new(""));

        let layout_doc = layout.map(LayoutDocument::document);
        let layout_head = layout_doc.and_then(|d| d.head.as_ref());
        let page_head = page.head.as_ref();

        let title = page_head
            .and_then(|h| h.title.clone())
            .or_else(|| layout_head.and_then(|h| h.title.clone()));

        let head = [layout_head, page_head]
            .into_iter()
            .flatten()
            .map(|h: &HeadZone| h.content.as_str())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let body = match layout {
            Some(layout) => layout.wrap(&page.body),
            None => page.body.clone(),
        };

        let mut script_files: Vec<ScriptFile> = Vec::new();
        let scripts = layout_doc
            .into_iter()
            .chain(std::iter::once(page))
            .filter_map(|doc| {
                let origin = doc.script.as_ref()?;
                Some(script_tag(config, page_dir, origin, &mut script_files))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let explicit_script = match &page.script {
            Some(ScriptOrigin::Explicit { path, .. }) => Some(path.clone()),
            _ => None,
        };

        let parts = PageParts {
            title,
            head,
            styles: self.styles(layout_doc, page),
            body: body.trim().to_string(),
            scripts,
            reload: (self.options.live_reload && self.options.mode == BuildMode::Development)
                .then(reload_client_script),
        };

        let debug = self.options.mode.brython_debug();
        let html = match shell {
            Some(shell) => shell.render(&parts, debug),
            None => self.render_skeleton(&parts, debug)?,
        };

        Ok(CompiledPage {
            source: page.path.clone(),
            output_path,
            html,
            script_files,
            explicit_script,
        })
    }

    /// Layout styles then page styles, each labelled with its source file.
    fn styles(&self, layout: Option<&SourceDocument>, page: &SourceDocument) -> String {
        let blocks: Vec<String> = layout
            .map(|doc| ("Layout", doc))
            .into_iter()
            .chain(std::iter::once(("Page", page)))
            .filter_map(|(label, doc)| {
                let css = doc.combined_styles();
                let css = css.trim();
                (!css.is_empty())
                    .then(|| format!("/* {label} styles: {} */\n{css}", doc.file_name()))
            })
            .collect();

        let css = blocks.join("\n\n");
        if self.options.mode != BuildMode::Production || css.is_empty() {
            return css;
        }

        match AssetPipeline::minify_css(&css) {
            Ok(minified) => minified,
            Err(e) => {
                tracing::warn!("Keeping unminified CSS: {}", e);
                css
            }
        }
    }

    fn render_skeleton(&self, parts: &PageParts, debug: u8) -> Result<String, minijinja::Error> {
        let tmpl = self.env.get_template("page.html")?;

        tmpl.render(context! {
            title => parts.title.as_deref().unwrap_or(DEFAULT_TITLE),
            brython_version => BRYTHON_VERSION,
            styles => &parts.styles,
            head => &parts.head,
            onload => format!("brython({{'debug': {debug}}})"),
            body => &parts.body,
            tail => parts.tail(),
        })
    }
}

/// Emit the script tag for one document, recording any file to copy.
fn script_tag(
    config: &ProjectConfig,
    page_dir: &Path,
    origin: &ScriptOrigin,
    script_files: &mut Vec<ScriptFile>,
) -> Result<String, minijinja::Error> {
    let Some(source) = origin.file() else {
        let code = match origin {
            ScriptOrigin::Inline(code) => code.as_str(),
            _ => "",
        };
        return Ok(format!(
            "<script type=\"text/python\">\n{}\n</script>",
            with_helpers(code).trim_end()
        ));
    };

    let output = config
        .mirror_path(source)
        .ok_or_else(|| outside_input(source))?;
    let href = AssetPipeline::relative_href(page_dir, &output);

    if !script_files.iter().any(|s| s.source == source) {
        script_files.push(ScriptFile {
            source: source.to_path_buf(),
            output,
        });
    }

    Ok(format!("<script type=\"text/python\" src=\"{href}\"></script>"))
}

fn outside_input(path: &Path) -> minijinja::Error {
    minijinja::Error::new(
        minijinja::ErrorKind::InvalidOperation,
        format!("{} is outside the input directory", path.display()),
    )
}

/// Client snippet that reloads the page when the dev server says so.
pub fn reload_client_script() -> String {
    format!(
        r#"<script>
(function() {{
  'use strict';

  const scheme = location.protocol === 'https:' ? 'wss://' : 'ws://';
  let attempts = 0;

  function connect() {{
    const ws = new WebSocket(scheme + location.host + '{LIVE_RELOAD_PATH}');

    ws.onopen = function() {{
      attempts = 0;
    }};

    ws.onmessage = function(event) {{
      const msg = JSON.parse(event.data);
      if (msg.type === 'reload') {{
        location.reload();
      }}
    }};

    ws.onclose = function() {{
      if (attempts < 10) {{
        attempts++;
        setTimeout(connect, 1000 * attempts);
      }}
    }};
  }}

  connect();
}})();
</script>"#
    )
}

const PAGE_TEMPLATE: &str = r##"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{{ title | safe }}</title>
    <script src="https://cdn.jsdelivr.net/npm/brython@{{ brython_version }}/brython.min.js"></script>
    <script src="https://cdn.jsdelivr.net/npm/brython@{{ brython_version }}/brython_stdlib.js"></script>
{% if styles %}    <style>
{{ styles | safe }}
    </style>
{% endif %}{% if head %}    {{ head | safe }}
{% endif %}</head>
<body onload="{{ onload | safe }}">
{{ body | safe }}
{{ tail | safe }}
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use hpy_document::{parse_document, ParseContext};

    fn config() -> ProjectConfig {
        ProjectConfig {
            project_root: PathBuf::from("/p"),
            input_dir: PathBuf::from("/p/src"),
            output_dir: PathBuf::from("/p/dist"),
            static_dir_name: None,
            single_file: None,
        }
    }

    fn doc(path: &str, source: &str) -> SourceDocument {
        let ctx = ParseContext {
            input_dir: PathBuf::from("/p/src"),
            static_dir: None,
        };
        parse_document(Path::new(path), source, &ctx).unwrap()
    }

    fn layout() -> LayoutDocument {
        LayoutDocument::new(doc(
            "/p/src/_layout.hpy",
            r#"<html><nav>N</nav><!-- HPY_PAGE_CONTENT --></html>
<hpy-head><title>Site</title><meta name="site"></hpy-head>
<style>nav { color: red; }</style>
<python>print("layout")</python>"#,
        ))
        .unwrap()
    }

    #[test]
    fn merges_page_into_layout() {
        let compositor = Compositor::new(BuildOptions::default());
        let page = doc(
            "/p/src/index.hpy",
            r#"<html><p>Hello</p></html><style>p { margin: 0; }</style><python>print("page")</python>"#,
        );

        let compiled = compositor
            .compose(&config(), Some(&layout()), None, &page)
            .unwrap();
        let html = &compiled.html;

        assert_eq!(compiled.output_path, PathBuf::from("/p/dist/index.html"));
        assert!(html.contains("<nav>N</nav><p>Hello</p>"));
        assert!(!html.contains("HPY_PAGE_CONTENT"));
        assert!(html.contains("<title>Site</title>"));
        assert!(html.contains(r#"<meta name="site">"#));
        assert!(html.contains("brython({'debug': 1})"));

        let layout_css = html.find("nav { color: red; }").unwrap();
        let page_css = html.find("p { margin: 0; }").unwrap();
        assert!(layout_css < page_css);
        assert!(html.contains("/* Layout styles: _layout.hpy */"));

        let layout_script = html.find("print(\"layout\")").unwrap();
        let page_script = html.find("print(\"page\")").unwrap();
        assert!(layout_script < page_script);
        assert!(html.contains("def byid(element_id):"));
    }

    #[test]
    fn page_title_wins() {
        let compositor = Compositor::new(BuildOptions::default());
        let page = doc(
            "/p/src/a.hpy",
            "<html>x</html><hpy-head><title>Page</title></hpy-head>",
        );

        let compiled = compositor
            .compose(&config(), Some(&layout()), None, &page)
            .unwrap();

        assert!(compiled.html.contains("<title>Page</title>"));
        assert!(!compiled.html.contains("<title>Site</title>"));
    }

    #[test]
    fn defaults_title_without_layout() {
        let compositor = Compositor::new(BuildOptions::default());
        let page = doc("/p/src/a.hpy", "<html>x</html>");

        let compiled = compositor.compose(&config(), None, None, &page).unwrap();

        assert!(compiled.html.contains("<title>HPY Application</title>"));
        assert!(compiled.html.contains(&format!("brython@{BRYTHON_VERSION}")));
        assert!(compiled.script_files.is_empty());
    }

    #[test]
    fn fills_app_shell() {
        let compositor = Compositor::new(BuildOptions::production());
        let shell = AppShell::new(
            Path::new("/p/src/_app.html"),
            r#"<!DOCTYPE html><html><head><title>Shell</title><!-- HPY_HEAD_CONTENT --></head>
<body onload="brython({'debug': 1})"><!-- HPY_BODY_CONTENT --></body></html>"#
                .to_string(),
        );
        let page = doc(
            "/p/src/a.hpy",
            "<html><main>M</main></html><style>main { color: blue; }</style><python>x = 1</python>",
        );

        let compiled = compositor.compose(&config(), None, Some(&shell), &page).unwrap();
        let html = &compiled.html;

        assert_eq!(shell.title(), Some("Shell"));
        assert!(html.contains("<title>Shell</title>"));
        assert!(html.contains("brython({'debug': 0})"));
        assert!(html.contains("<main>M</main>"));
        assert!(html.contains("main{color:"));
        assert!(!html.contains("/* Page styles"));
        assert!(!html.contains(APP_SHELL_HEAD_PLACEHOLDER));
        assert!(!html.contains(APP_SHELL_BODY_PLACEHOLDER));
        assert!(html.find("x = 1").unwrap() < html.find("</body>").unwrap());
    }

    #[test]
    fn inserts_title_into_shell_without_one() {
        let compositor = Compositor::new(BuildOptions::default());
        let shell = AppShell::new(
            Path::new("/p/src/_app.html"),
            "<html><head><!-- HPY_HEAD_CONTENT --></head><body><!-- HPY_BODY_CONTENT --></body></html>"
                .to_string(),
        );
        let page = doc("/p/src/a.hpy", "<html>x</html>");

        let compiled = compositor.compose(&config(), None, Some(&shell), &page).unwrap();

        assert!(compiled.html.contains("<title>HPY Application</title>\n</head>"));
    }

    #[test]
    fn file_scripts_become_references() {
        let compositor = Compositor::new(BuildOptions::default());
        let mut page = doc("/p/src/docs/guide.hpy", "<html>x</html>");
        page.script = Some(ScriptOrigin::Explicit {
            reference: "../scripts/app.py".to_string(),
            path: PathBuf::from("/p/src/scripts/app.py"),
        });

        let compiled = compositor.compose(&config(), None, None, &page).unwrap();

        assert!(compiled
            .html
            .contains(r#"<script type="text/python" src="../scripts/app.py"></script>"#));
        assert_eq!(
            compiled.script_files,
            vec![ScriptFile {
                source: PathBuf::from("/p/src/scripts/app.py"),
                output: PathBuf::from("/p/dist/scripts/app.py"),
            }]
        );
        assert_eq!(
            compiled.explicit_script,
            Some(PathBuf::from("/p/src/scripts/app.py"))
        );
    }

    #[test]
    fn live_reload_only_when_enabled() {
        let page = doc("/p/src/a.hpy", "<html>x</html>");

        let watch = Compositor::new(BuildOptions::watch())
            .compose(&config(), None, None, &page)
            .unwrap();
        let plain = Compositor::new(BuildOptions::default())
            .compose(&config(), None, None, &page)
            .unwrap();

        assert!(watch.html.contains(LIVE_RELOAD_PATH));
        assert!(!plain.html.contains(LIVE_RELOAD_PATH));
    }

    #[test]
    fn compositing_is_deterministic() {
        let compositor = Compositor::new(BuildOptions::default());
        let page = doc("/p/src/index.hpy", "<html><p>Same</p></html><python>y = 2</python>");

        let first = compositor.compose(&config(), Some(&layout()), None, &page).unwrap();
        let second = compositor.compose(&config(), Some(&layout()), None, &page).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn helpers_not_injected_twice() {
        let code = with_helpers("print(1)");
        assert_eq!(with_helpers(&code), code);
    }
}
