//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MHTML_INLINE_CONFIG` (environment variable)
//! 2. `~/.config/mhtml-inline/config.toml` (Linux/macOS)
//!    `%APPDATA%\mhtml-inline\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogSettings;
use crate::rewrite::InlineOptions;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "MHTML_INLINE_CONFIG";

const APP_DIR: &str = "mhtml-inline";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Rendering settings.
    pub render: RenderConfig,
    /// Archive directory listing settings.
    pub catalog: CatalogSettings,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override the directory the log file is written to.
    pub log_dir: Option<PathBuf>,
}

/// Rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Serve the raw archive when it cannot be decoded.
    pub fallback_to_raw: bool,
    /// Base URLs for relative resource references.
    pub location_hints: Vec<String>,
}

impl RenderConfig {
    /// Rewrite options for these settings.
    pub fn inline_options(&self) -> InlineOptions {
        InlineOptions {
            location_hints: self.location_hints.clone(),
        }
    }
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_dir: None,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fallback_to_raw: true,
            location_hints: Vec::new(),
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    match config_file_path() {
        Some(path) if path.exists() => load_config_from(&path),
        _ => Config::default(),
    }
}

/// Load configuration from `path`, falling back to defaults on any error.
pub fn load_config_from(path: &std::path::Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "Loaded config");
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse config, using defaults"
                );
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read config file, using defaults"
            );
            Config::default()
        }
    }
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

/// Return the directory the log file is written to.
pub fn log_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.log_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert!(cfg.render.fallback_to_raw);
        assert!(cfg.render.location_hints.is_empty());
        assert_eq!(cfg.catalog.label_prefix, "For sale_");
        assert_eq!(cfg.catalog.extensions, vec!["mhtml", "mht"]);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let mut cfg = Config::default();
        cfg.render.location_hints = vec!["https://example.test/".to_string()];
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.render.location_hints, cfg.render.location_hints);
        assert_eq!(parsed.catalog.label_prefix, cfg.catalog.label_prefix);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[render]
fallback_to_raw = false

[catalog]
label_prefix = "Listing_"
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert!(!cfg.render.fallback_to_raw);
        assert_eq!(cfg.catalog.label_prefix, "Listing_");
        // Other fields use defaults
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.catalog.extensions, vec!["mhtml", "mht"]);
    }

    #[test]
    fn test_load_config_from_invalid_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[render\nbroken").expect("write");
        let cfg = load_config_from(&path);
        assert!(cfg.render.fallback_to_raw);

        std::fs::write(&path, "[general]\nlog_level = \"debug\"\n").expect("write");
        assert_eq!(load_config_from(&path).general.log_level, "debug");
    }

    #[test]
    fn test_inline_options_from_render_config() {
        let render = RenderConfig {
            location_hints: vec!["https://a.test/".into()],
            ..RenderConfig::default()
        };
        assert_eq!(render.inline_options().location_hints, vec!["https://a.test/"]);
    }
}
