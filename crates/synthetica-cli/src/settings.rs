use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use synthetica_core::CompileOptions;
use synthetica_eval::EvaluateOptions;
use synthetica_io::OutputFormat;
use synthetica_synth::{RowCount, SynthOptions};
use thiserror::Error;

/// Default settings file looked up in the working directory.
pub const DEFAULT_SETTINGS_PATH: &str = "synthetica.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Effective run settings. Every field has a default; CLI flags override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub config: PathBuf,
    pub data_dir: PathBuf,
    pub run_dir: PathBuf,
    /// Where synthesized tables go; `<run>/data` when unset.
    pub output_dir: Option<PathBuf>,
    pub format: OutputFormat,
    /// Fixed row count per table. Takes precedence over `scale`.
    pub rows: Option<u64>,
    pub scale: f64,
    pub compile: CompileOptions,
    pub synthesis: SynthOptions,
    pub evaluation: EvaluateOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config: PathBuf::from("config.json"),
            data_dir: PathBuf::from("data"),
            run_dir: PathBuf::from("runs"),
            output_dir: None,
            format: OutputFormat::Csv,
            rows: None,
            scale: 1.0,
            compile: CompileOptions::default(),
            synthesis: SynthOptions::default(),
            evaluation: EvaluateOptions::default(),
        }
    }
}

impl Settings {
    /// Read settings from `path`, or defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| SettingsError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn row_count(&self) -> RowCount {
        match self.rows {
            Some(rows) => RowCount::Fixed(rows),
            None => RowCount::Scale(self.scale),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!("synthetica_{}.toml", uuid::Uuid::new_v4()));
        let settings = Settings::load(&path).expect("defaults");
        assert_eq!(settings.run_dir, PathBuf::from("runs"));
        assert_eq!(settings.synthesis.seed, 42);
        assert_eq!(settings.row_count(), RowCount::Scale(1.0));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let settings = Settings::parse(
            r#"
            data_dir = "fixtures"
            format = "jsonl"
            rows = 100

            [synthesis]
            seed = 7

            [evaluation]
            strict = true
            "#,
        )
        .expect("parse settings");

        assert_eq!(settings.data_dir, PathBuf::from("fixtures"));
        assert_eq!(settings.format, OutputFormat::Jsonl);
        assert_eq!(settings.row_count(), RowCount::Fixed(100));
        assert_eq!(settings.synthesis.seed, 7);
        assert_eq!(settings.synthesis.max_attempts_row, 50);
        assert!(settings.evaluation.strict);
        assert_eq!(settings.evaluation.max_examples, 20);
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(Settings::parse("format = \"parquet\"").is_err());
    }
}
