//! Settings for the template checker.
//!
//! Files are merged in increasing priority: the user's `soyc.toml`, then
//! `.soyc.toml` and `soyc.toml` at the project root. Missing files are
//! skipped; a file that does not parse is an error.

pub mod diagnostics;

use std::path::Path;
use std::path::PathBuf;

use config::Config;
use config::File;
use config::FileFormat;
use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

pub use crate::diagnostics::DiagnosticSeverity;
pub use crate::diagnostics::DiagnosticsConfig;

const PROJECT_FILES: [&str; 2] = [".soyc.toml", "soyc.toml"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Config(#[from] config::ConfigError),
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub diagnostics: DiagnosticsConfig,
}

impl Settings {
    /// Load the settings that apply to templates under `project_root`.
    pub fn new(project_root: &Path) -> Result<Self, ConfigError> {
        Self::from_files(&config_files(user_config_file(), project_root))
    }

    fn from_files(files: &[PathBuf]) -> Result<Self, ConfigError> {
        let config = files
            .iter()
            .fold(Config::builder(), |builder, path| {
                builder.add_source(
                    File::from(path.as_path())
                        .format(FileFormat::Toml)
                        .required(false),
                )
            })
            .build()?;
        let settings: Settings = config.try_deserialize()?;

        tracing::debug!(
            files = files.len(),
            overrides = settings.diagnostics.severity.len(),
            "loaded settings"
        );
        Ok(settings)
    }
}

fn user_config_file() -> Option<PathBuf> {
    ProjectDirs::from("dev", "soyc", "soyc").map(|dirs| dirs.config_dir().join("soyc.toml"))
}

/// Candidate config files, lowest priority first.
fn config_files(user: Option<PathBuf>, project_root: &Path) -> Vec<PathBuf> {
    user.into_iter()
        .chain(PROJECT_FILES.iter().map(|name| project_root.join(name)))
        .collect()
}
