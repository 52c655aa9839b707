use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// CLI configuration: defaults, then an optional TOML file, then
/// `FACEWATCH_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum Euclidean distance for a positive match.
    pub tolerance: f32,
    /// Feature-vector length produced by the encoder.
    pub dimension: usize,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tolerance: facewatch_core::DEFAULT_TOLERANCE,
            dimension: facewatch_core::DEFAULT_DIMENSION,
            db_path: data_dir().join("facewatch.db"),
        }
    }
}

impl Config {
    /// Load from `path` (or `FACEWATCH_CONFIG`, or the XDG default), falling
    /// back to defaults when no file exists, then apply env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("FACEWATCH_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(default_config_path);

        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config at {}", path.display()))?;
            Self::from_toml(&raw).with_context(|| format!("parsing config {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Apply `FACEWATCH_TOLERANCE`, `FACEWATCH_DIMENSION` and
    /// `FACEWATCH_DB_PATH`. Unparseable numbers are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env_f32(&lookup, "FACEWATCH_TOLERANCE") {
            self.tolerance = v;
        }
        if let Some(v) = env_usize(&lookup, "FACEWATCH_DIMENSION") {
            self.dimension = v;
        }
        if let Some(v) = lookup("FACEWATCH_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
    }
}

fn env_f32(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<f32> {
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable override");
            None
        }
    }
}

fn env_usize(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<usize> {
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable override");
            None
        }
    }
}

fn xdg_dir(var: &str, fallback: &str) -> PathBuf {
    std::env::var(var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(fallback)
        })
        .join("facewatch")
}

fn data_dir() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", ".local/share")
}

fn default_config_path() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", ".config").join("config.toml")
}
