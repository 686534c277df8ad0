//! Create a new hpy project.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use hpy_static::compositor::BRYTHON_VERSION;

use crate::config::CONFIG_FILENAME;

/// Starter project layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Template {
    /// App shell, layout, two pages with scripts and a static logo
    Full,
    /// App shell and a minimal layout
    Blank,
    /// One self-contained app.hpy
    Single,
}

/// Run the init command.
pub async fn run(dir: &Path, template: Template) -> Result<()> {
    if dir.exists() {
        if !dir.is_dir() {
            bail!("'{}' exists and is not a directory", dir.display());
        }
        let mut entries = fs::read_dir(dir)
            .with_context(|| format!("Failed to read {}", dir.display()))?;
        if entries.next().is_some() {
            bail!("Directory '{}' already exists and is not empty", dir.display());
        }
    }

    let files = template_files(template);
    for (relative, contents) in &files {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("Failed to write {}", relative))?;
        tracing::info!("Created {}", relative);
    }

    tracing::info!("Initialization complete!");
    match template {
        Template::Single => tracing::info!("Run 'hpy watch app.hpy' inside {} to start.", dir.display()),
        _ => tracing::info!("Run 'hpy watch' inside {} to start.", dir.display()),
    }

    Ok(())
}

/// Files written for a template, as (relative path, contents).
fn template_files(template: Template) -> Vec<(&'static str, String)> {
    let app_shell = APP_SHELL.replace("{BRYTHON_VERSION}", BRYTHON_VERSION);

    match template {
        Template::Single => vec![
            (CONFIG_FILENAME, SINGLE_CONFIG.to_string()),
            ("app.hpy", SINGLE_APP.to_string()),
        ],
        Template::Blank => vec![
            (CONFIG_FILENAME, PROJECT_CONFIG.to_string()),
            ("src/_app.html", app_shell),
            ("src/_layout.hpy", BLANK_LAYOUT.to_string()),
            ("src/index.hpy", BLANK_INDEX.to_string()),
            ("src/static/.gitkeep", String::new()),
        ],
        Template::Full => vec![
            (CONFIG_FILENAME, PROJECT_CONFIG.to_string()),
            ("src/_app.html", app_shell),
            ("src/_layout.hpy", FULL_LAYOUT.to_string()),
            ("src/index.hpy", FULL_INDEX.to_string()),
            ("src/index.py", FULL_INDEX_SCRIPT.to_string()),
            ("src/about.hpy", FULL_ABOUT.to_string()),
            ("src/scripts/about_logic.py", FULL_ABOUT_SCRIPT.to_string()),
            ("src/static/logo.svg", LOGO_SVG.to_string()),
        ],
    }
}

const PROJECT_CONFIG: &str = r#"# hpy project configuration

[tool.hpy]
# Directory holding .hpy pages, _layout.hpy and _app.html
input_dir = "src"

# Output of 'hpy build'
output_dir = "dist"

# Output of 'hpy serve' and 'hpy watch'
dev_output_dir = ".hpy_dev_output"

# Subdirectory of input_dir copied verbatim into the output
static_dir_name = "static"
"#;

const SINGLE_CONFIG: &str = r#"# hpy configuration for a single-file app

[tool.hpy]
output_dir = "dist"
dev_output_dir = ".hpy_dev_output"
"#;

const APP_SHELL: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>HPY Application</title>
    <script src="https://cdn.jsdelivr.net/npm/brython@{BRYTHON_VERSION}/brython.min.js"></script>
    <script src="https://cdn.jsdelivr.net/npm/brython@{BRYTHON_VERSION}/brython_stdlib.js"></script>
    <!-- HPY_HEAD_CONTENT -->
</head>
<body onload="brython({'debug': 1})">
<!-- HPY_BODY_CONTENT -->
</body>
</html>
"#;

const FULL_LAYOUT: &str = r#"<hpy-head>
    <title>My hpy Site</title>
    <meta name="description" content="Built with hpy">
</hpy-head>

<html>
<header class="site-header">
    <img src="/static/logo.svg" alt="Logo" width="32" height="32">
    <nav>
        <a href="/index.html">Home</a>
        <a href="/about.html">About</a>
    </nav>
</header>
<main>
    <!-- HPY_PAGE_CONTENT -->
</main>
<footer class="site-footer">Made with hpy and Brython</footer>
</html>

<style>
body { font-family: system-ui, sans-serif; margin: 0; color: #222; }
.site-header { display: flex; align-items: center; gap: 1rem; padding: 1rem 2rem; background: #f4f4f8; }
.site-header nav a { margin-right: 1rem; }
main { padding: 2rem; max-width: 48rem; }
.site-footer { padding: 1rem 2rem; color: #777; font-size: 0.9rem; }
</style>
"#;

const FULL_INDEX: &str = r#"<hpy-head>
    <title>Home</title>
</hpy-head>

<html>
<h1>Welcome</h1>
<p>This page's logic lives in the companion script <code>index.py</code>.</p>
<button id="greet">Say hello</button>
<p id="output"></p>
</html>

<style>
#greet { padding: 0.5rem 1rem; }
#output { font-weight: bold; }
</style>
"#;

const FULL_INDEX_SCRIPT: &str = r#"def greet(event):
    byid("output").text = "Hello from Brython!"


byid("greet").bind("click", greet)
"#;

const FULL_ABOUT: &str = r#"<hpy-head>
    <title>About</title>
</hpy-head>

<html>
<h1>About</h1>
<p>Clicks so far: <span id="count">0</span></p>
<button id="increment">Click me</button>
</html>

<python src="scripts/about_logic.py"></python>
"#;

const FULL_ABOUT_SCRIPT: &str = r#"count = 0


def increment(event):
    global count
    count += 1
    byid("count").text = str(count)


byid("increment").bind("click", increment)
"#;

const BLANK_LAYOUT: &str = r#"<html>
<main>
    <!-- HPY_PAGE_CONTENT -->
</main>
</html>
"#;

const BLANK_INDEX: &str = r#"<html>
<h1>Hello, hpy</h1>
</html>
"#;

const SINGLE_APP: &str = r#"<hpy-head>
    <title>My hpy App</title>
</hpy-head>

<html>
<h1>Counter</h1>
<p>Count: <span id="count">0</span></p>
<button id="increment">Increment</button>
</html>

<style>
body { font-family: system-ui, sans-serif; padding: 2rem; }
button { padding: 0.5rem 1rem; }
</style>

<python>
count = 0

def increment(event):
    global count
    count += 1
    byid("count").text = str(count)

byid("increment").bind("click", increment)
</python>
"#;

const LOGO_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 64 64" width="64" height="64">
  <rect width="64" height="64" rx="12" fill="#306998"/>
  <text x="32" y="42" font-family="sans-serif" font-size="24" font-weight="bold" fill="#ffd43b" text-anchor="middle">hpy</text>
</svg>
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use hpy_static::{BuildOptions, ProjectBuilder, ProjectConfig};
    use tempfile::tempdir;

    #[tokio::test]
    async fn refuses_non_empty_directory() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("existing.txt"), "x").unwrap();

        let err = run(temp.path(), Template::Full).await.unwrap_err();

        assert!(err.to_string().contains("not empty"));
        assert!(!temp.path().join(CONFIG_FILENAME).exists());
    }

    #[tokio::test]
    async fn full_template_builds() {
        let temp = tempdir().unwrap();
        let project = temp.path().join("site");

        run(&project, Template::Full).await.unwrap();

        let config = ProjectConfig {
            project_root: project.clone(),
            input_dir: project.join("src"),
            output_dir: project.join("dist"),
            static_dir_name: Some("static".to_string()),
            single_file: None,
        };
        let result = ProjectBuilder::new(config, BuildOptions::default())
            .build()
            .unwrap();

        assert_eq!(result.pages, 2);
        assert_eq!(result.scripts, 2);
        assert!(project.join("dist/static/logo.svg").is_file());
        let about = fs::read_to_string(project.join("dist/about.html")).unwrap();
        assert!(about.contains("<title>About</title>"));
        assert!(about.contains(BRYTHON_VERSION));
    }

    #[tokio::test]
    async fn single_template_writes_app() {
        let temp = tempdir().unwrap();

        run(temp.path(), Template::Single).await.unwrap();

        assert!(temp.path().join("app.hpy").is_file());
        assert!(temp.path().join(CONFIG_FILENAME).is_file());
        assert!(!temp.path().join("src").exists());
    }
}
