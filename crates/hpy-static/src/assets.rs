//! Static asset sync, script emission and output writes.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::compositor::with_helpers;
use crate::config::ProjectConfig;

/// Asset pipeline utilities.
pub struct AssetPipeline;

impl AssetPipeline {
    /// Minify CSS using lightningcss.
    pub fn minify_css(css: &str) -> Result<String, String> {
        use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};

        let stylesheet = StyleSheet::parse(css, ParserOptions::default())
            .map_err(|e| format!("CSS parse error: {}", e))?;

        let minified = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                ..Default::default()
            })
            .map_err(|e| format!("CSS minify error: {}", e))?;

        Ok(minified.code)
    }

    /// Write `contents` to a temp file next to `path`, then rename it into place.
    pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
        let parent = path.parent().unwrap_or(Path::new(""));
        fs::create_dir_all(parent)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = parent.join(format!(".{file_name}.hpy-tmp"));

        fs::write(&temp, contents)?;
        fs::rename(&temp, path).inspect_err(|_| {
            let _ = fs::remove_file(&temp);
        })
    }

    /// Copy a script into the output tree with the helper preamble injected.
    pub fn copy_script(source: &Path, output: &Path) -> io::Result<()> {
        let code = fs::read_to_string(source)?;
        Self::write_atomic(output, with_helpers(&code).as_bytes())
    }

    /// Copy the whole static directory into the output dir.
    ///
    /// Existing files are overwritten; nothing is pruned. Returns the number of
    /// files copied.
    pub fn sync_static(config: &ProjectConfig) -> io::Result<usize> {
        let (Some(source), Some(target)) = (config.static_source_dir(), config.static_output_dir())
        else {
            return Ok(0);
        };

        if !source.is_dir() {
            tracing::debug!("No static directory at {}", source.display());
            return Ok(0);
        }

        let copied = copy_tree(&source, &target)?;
        tracing::debug!("Copied {} static file(s) to {}", copied, target.display());
        Ok(copied)
    }

    /// Mirror one static file or directory into the output dir.
    pub fn sync_static_path(config: &ProjectConfig, path: &Path) -> io::Result<usize> {
        let target = mirror_or_refuse(config, path)?;

        if path.is_dir() {
            copy_tree(path, &target)
        } else if path.is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(path, &target)?;
            Ok(1)
        } else {
            tracing::debug!("Static path {} vanished before sync", path.display());
            Ok(0)
        }
    }

    /// Remove the mirror of a static file or directory.
    ///
    /// A mirror that is already gone is not an error.
    pub fn remove_static_path(config: &ProjectConfig, path: &Path) -> io::Result<()> {
        let target = mirror_or_refuse(config, path)?;

        let result = if target.is_dir() {
            fs::remove_dir_all(&target)
        } else {
            fs::remove_file(&target)
        };

        match result {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    /// Relative URL from `from_dir` to `target`, `/`-separated.
    pub fn relative_href(from_dir: &Path, target: &Path) -> String {
        let from: Vec<Component> = from_dir.components().collect();
        let to: Vec<Component> = target.components().collect();

        let common = from
            .iter()
            .zip(&to)
            .take_while(|(a, b)| a == b)
            .count();

        let ups = std::iter::repeat("..".to_string()).take(from.len() - common);
        let downs = to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned());

        ups.chain(downs).collect::<Vec<_>>().join("/")
    }
}

fn mirror_or_refuse(config: &ProjectConfig, path: &Path) -> io::Result<PathBuf> {
    config.mirror_path(path).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is outside the input directory", path.display()),
        )
    })
}

/// Recursively copy `source` onto `target`, returning the number of files copied.
fn copy_tree(source: &Path, target: &Path) -> io::Result<usize> {
    let mut copied = 0;

    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
        let dest = target.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &dest)?;
            copied += 1;
        }
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::HELPER_PREAMBLE;
    use tempfile::tempdir;

    fn config(root: &Path) -> ProjectConfig {
        ProjectConfig {
            project_root: root.to_path_buf(),
            input_dir: root.join("src"),
            output_dir: root.join("dist"),
            static_dir_name: Some("static".to_string()),
            single_file: None,
        }
    }

    #[test]
    fn minifies_css() {
        let css = r#"
.button {
    background-color: blue;
    padding: 10px;
}
        "#;

        let minified = AssetPipeline::minify_css(css).unwrap();

        assert!(!minified.contains('\n'));
        assert!(minified.contains(".button"));
    }

    #[test]
    fn computes_relative_hrefs() {
        let href = |from: &str, to: &str| AssetPipeline::relative_href(Path::new(from), Path::new(to));

        assert_eq!(href("/d", "/d/index.py"), "index.py");
        assert_eq!(href("/d/docs", "/d/scripts/app.py"), "../scripts/app.py");
        assert_eq!(href("/d/a/b", "/d/_layout.py"), "../../_layout.py");
    }

    #[test]
    fn syncs_static_tree() {
        let temp = tempdir().unwrap();
        let config = config(temp.path());
        let static_dir = temp.path().join("src/static");
        fs::create_dir_all(static_dir.join("img")).unwrap();
        fs::write(static_dir.join("logo.svg"), b"<svg/>").unwrap();
        fs::write(static_dir.join("img/a.png"), [0u8, 1, 2]).unwrap();

        let copied = AssetPipeline::sync_static(&config).unwrap();

        assert_eq!(copied, 2);
        assert_eq!(
            fs::read(temp.path().join("dist/static/img/a.png")).unwrap(),
            vec![0u8, 1, 2]
        );
    }

    #[test]
    fn sync_never_prunes() {
        let temp = tempdir().unwrap();
        let config = config(temp.path());
        fs::create_dir_all(temp.path().join("src/static")).unwrap();
        fs::create_dir_all(temp.path().join("dist/static")).unwrap();
        fs::write(temp.path().join("dist/static/old.txt"), "keep").unwrap();

        AssetPipeline::sync_static(&config).unwrap();

        assert!(temp.path().join("dist/static/old.txt").exists());
    }

    #[test]
    fn removes_static_mirror() {
        let temp = tempdir().unwrap();
        let config = config(temp.path());
        let mirror = temp.path().join("dist/static/gone.css");
        fs::create_dir_all(mirror.parent().unwrap()).unwrap();
        fs::write(&mirror, "x").unwrap();

        let source = temp.path().join("src/static/gone.css");
        AssetPipeline::remove_static_path(&config, &source).unwrap();
        assert!(!mirror.exists());

        AssetPipeline::remove_static_path(&config, &source).unwrap();
        AssetPipeline::remove_static_path(&config, &temp.path().join("src/static/dir")).unwrap();
    }

    #[test]
    fn refuses_static_paths_outside_input() {
        let temp = tempdir().unwrap();
        let config = config(temp.path());
        let outside = temp.path().join("other.css");
        fs::write(&outside, "x").unwrap();

        let err = AssetPipeline::sync_static_path(&config, &outside).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(fs::read_to_string(&outside).unwrap(), "x");
    }

    #[test]
    fn copies_script_with_helpers_once() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("app.py");
        let output = temp.path().join("out/app.py");
        fs::write(&source, "print(byid('x'))").unwrap();

        AssetPipeline::copy_script(&source, &output).unwrap();
        let first = fs::read_to_string(&output).unwrap();
        assert!(first.starts_with(HELPER_PREAMBLE));
        assert!(first.ends_with("print(byid('x'))"));

        AssetPipeline::copy_script(&output, &output).unwrap();
        assert_eq!(fs::read_to_string(&output).unwrap(), first);
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested/page.html");

        AssetPipeline::write_atomic(&path, b"<p>x</p>").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "<p>x</p>");
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }
}
