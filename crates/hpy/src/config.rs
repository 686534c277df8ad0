//! `hpy.toml` discovery and layering of CLI, file and default values.

use std::fs;
use std::path::{Path, PathBuf};

use hpy_static::ProjectConfig;
use serde::Deserialize;

/// Config file searched for from the source upwards.
pub const CONFIG_FILENAME: &str = "hpy.toml";

const DEFAULT_INPUT_DIR: &str = "src";
const DEFAULT_OUTPUT_DIR: &str = "dist";
const DEFAULT_DEV_OUTPUT_DIR: &str = ".hpy_dev_output";

/// Configuration file structure (hpy.toml).
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    tool: ToolTable,
}

#[derive(Debug, Deserialize, Default)]
struct ToolTable {
    #[serde(default)]
    hpy: FileSettings,
}

/// The `[tool.hpy]` table. Unset keys fall back to built-in defaults.
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct FileSettings {
    /// Source directory
    pub input_dir: Option<String>,

    /// Output of `hpy build`
    pub output_dir: Option<String>,

    /// Static asset subdirectory of the input dir
    pub static_dir_name: Option<String>,

    /// Output of `hpy serve` and `hpy watch`
    pub dev_output_dir: Option<String>,
}

/// Errors from loading or resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Output dir {} cannot be inside input dir {}", .output.display(), .input.display())]
    OutputInsideInput { output: PathBuf, input: PathBuf },
}

/// Which output directory a command writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTarget {
    /// `hpy build`: `output_dir`
    Build,
    /// `hpy serve` and `hpy watch`: `dev_output_dir`
    Dev,
}

/// Loaded configuration file, or defaults when there is none.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory relative file values resolve against
    pub project_root: PathBuf,

    /// The file that was loaded, if any
    pub config_path: Option<PathBuf>,

    /// Values from the file
    pub file: FileSettings,

    /// Directory relative CLI arguments resolve against
    cwd: PathBuf,
}

impl Settings {
    /// Load settings for an invocation from the current directory.
    pub fn load(explicit: Option<&Path>, source: Option<&Path>) -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().map_err(|source| ConfigError::Read {
            path: PathBuf::from("."),
            source,
        })?;
        Self::load_in(&cwd, explicit, source)
    }

    /// Load settings, resolving relative arguments against `cwd`.
    ///
    /// An explicit config path must exist. Otherwise `hpy.toml` is searched
    /// for upwards from the source (or `cwd`).
    pub fn load_in(
        cwd: &Path,
        explicit: Option<&Path>,
        source: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let config_path = match explicit {
            Some(path) => Some(cwd.join(path)),
            None => {
                let start = source.map(|s| cwd.join(s)).unwrap_or_else(|| cwd.to_path_buf());
                find_config(&start)
            }
        };

        let Some(path) = config_path else {
            tracing::debug!("No {} found, using defaults", CONFIG_FILENAME);
            return Ok(Self {
                project_root: cwd.to_path_buf(),
                config_path: None,
                file: FileSettings::default(),
                cwd: cwd.to_path_buf(),
            });
        };

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let parsed: ConfigFile = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        tracing::debug!("Loaded config from {}", path.display());

        let project_root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.to_path_buf());

        Ok(Self {
            project_root,
            config_path: Some(path),
            file: parsed.tool.hpy,
            cwd: cwd.to_path_buf(),
        })
    }

    /// Resolve the project configuration for a command.
    ///
    /// CLI values win over file values, which win over defaults. A file
    /// source selects single-file mode.
    pub fn project_config(
        &self,
        source: Option<&Path>,
        output: Option<&Path>,
        target: OutputTarget,
    ) -> Result<ProjectConfig, ConfigError> {
        let output_dir = self.output_dir(output, target);

        if let Some(file) = source.map(|s| self.cwd.join(s)).filter(|s| s.is_file()) {
            return Ok(ProjectConfig::single_file(&file, output_dir));
        }

        let input_dir = match source {
            Some(dir) => self.cwd.join(dir),
            None => self.from_file(self.file.input_dir.as_deref(), DEFAULT_INPUT_DIR),
        };

        let config = ProjectConfig {
            project_root: self.project_root.clone(),
            input_dir,
            output_dir,
            static_dir_name: self.file.static_dir_name.clone(),
            single_file: None,
        }
        .normalized();

        if config.output_dir.starts_with(&config.input_dir) {
            return Err(ConfigError::OutputInsideInput {
                output: config.output_dir,
                input: config.input_dir,
            });
        }

        Ok(config)
    }

    fn output_dir(&self, output: Option<&Path>, target: OutputTarget) -> PathBuf {
        if let Some(dir) = output {
            return self.cwd.join(dir);
        }
        match target {
            OutputTarget::Build => {
                self.from_file(self.file.output_dir.as_deref(), DEFAULT_OUTPUT_DIR)
            }
            OutputTarget::Dev => {
                self.from_file(self.file.dev_output_dir.as_deref(), DEFAULT_DEV_OUTPUT_DIR)
            }
        }
    }

    fn from_file(&self, value: Option<&str>, default: &str) -> PathBuf {
        self.project_root.join(value.unwrap_or(default))
    }
}

/// Walk up from `start` looking for `hpy.toml`.
pub fn find_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILENAME))
        .find(|candidate| candidate.is_file())
}
