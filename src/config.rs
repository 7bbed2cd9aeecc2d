//! Runtime configuration.
//!
//! Every field has a default so an empty TOML document is a valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::geometry::degrees_to_radians;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DappyConfig {
    #[serde(default)]
    pub geometry: BuildConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Shared wall dimensions used for default object geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default = "default_wall_height")]
    pub wall_height: f32,
    #[serde(default = "default_wall_thickness")]
    pub wall_thickness: f32,
}

fn default_wall_height() -> f32 {
    0.7
}

fn default_wall_thickness() -> f32 {
    0.1
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            wall_height: default_wall_height(),
            wall_thickness: default_wall_thickness(),
        }
    }
}

/// Keyboard step sizes and click timing for the builder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default = "default_move_step")]
    pub move_step: f32,
    #[serde(default = "default_fine_move_step")]
    pub fine_move_step: f32,
    #[serde(default = "default_rotate_step_deg")]
    pub rotate_step_deg: f32,
    #[serde(default = "default_fine_rotate_step_deg")]
    pub fine_rotate_step_deg: f32,
    #[serde(default = "default_double_click_ms")]
    pub double_click_ms: u64,
}

fn default_move_step() -> f32 {
    0.1
}

fn default_fine_move_step() -> f32 {
    0.05
}

fn default_rotate_step_deg() -> f32 {
    45.0
}

fn default_fine_rotate_step_deg() -> f32 {
    5.0
}

fn default_double_click_ms() -> u64 {
    300
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            move_step: default_move_step(),
            fine_move_step: default_fine_move_step(),
            rotate_step_deg: default_rotate_step_deg(),
            fine_rotate_step_deg: default_fine_rotate_step_deg(),
            double_click_ms: default_double_click_ms(),
        }
    }
}

impl EditorConfig {
    pub fn move_amount(&self, fine: bool) -> f32 {
        if fine {
            self.fine_move_step
        } else {
            self.move_step
        }
    }

    /// Rotation step in radians.
    pub fn rotate_amount(&self, fine: bool) -> f32 {
        if fine {
            degrees_to_radians(self.fine_rotate_step_deg)
        } else {
            degrees_to_radians(self.rotate_step_deg)
        }
    }

    pub fn double_click_window(&self) -> Duration {
        Duration::from_millis(self.double_click_ms)
    }
}

/// Hazard/route polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_oracle_timeout_ms")]
    pub oracle_timeout_ms: u64,
    #[serde(default = "default_oracle_url")]
    pub oracle_url: String,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_oracle_timeout_ms() -> u64 {
    5000
}

fn default_oracle_url() -> String {
    "http://localhost:3000/get-escape-path".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            oracle_timeout_ms: default_oracle_timeout_ms(),
            oracle_url: default_oracle_url(),
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }
}

/// Floor-plan database location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,
}

fn default_storage_path() -> String {
    crate::FLOOR_PLAN_DB_PATH.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

impl DappyConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: DappyConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !positive(self.geometry.wall_height) || !positive(self.geometry.wall_thickness) {
            return Err(ConfigError::Invalid("wall dimensions must be positive".to_string()));
        }
        if !positive(self.editor.move_step) || !positive(self.editor.fine_move_step) {
            return Err(ConfigError::Invalid("move steps must be positive".to_string()));
        }
        if self.sync.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be non-zero".to_string()));
        }
        if self.sync.oracle_timeout_ms == 0 {
            return Err(ConfigError::Invalid("oracle_timeout_ms must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Finite and strictly greater than zero; NaN fails.
fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = DappyConfig::from_toml_str("").expect("empty config is valid");
        assert_eq!(config.geometry, BuildConfig::default());
        assert_eq!(config.geometry.wall_height, 0.7);
        assert_eq!(config.sync.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.editor.double_click_window(), Duration::from_millis(300));
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let raw = r#"
            [sync]
            oracle_url = "http://10.0.0.5:3000/get-escape-path"

            [geometry]
            wall_height = 1.2
        "#;
        let config = DappyConfig::from_toml_str(raw).expect("valid config");
        assert_eq!(config.sync.oracle_url, "http://10.0.0.5:3000/get-escape-path");
        assert_eq!(config.sync.oracle_timeout_ms, 5000);
        assert_eq!(config.geometry.wall_height, 1.2);
        assert_eq!(config.geometry.wall_thickness, 0.1);
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let err = DappyConfig::from_toml_str("[sync]\npoll_interval_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn non_finite_or_non_positive_steps_are_rejected() {
        for step in [0.0, -0.1, f32::NAN, f32::INFINITY] {
            let mut config = DappyConfig::default();
            config.editor.move_step = step;
            assert!(config.validate().is_err(), "step {step} accepted");
        }
        assert!(DappyConfig::default().validate().is_ok());
    }

    #[test]
    fn fine_adjust_uses_smaller_steps() {
        let editor = EditorConfig::default();
        assert_eq!(editor.move_amount(false), 0.1);
        assert_eq!(editor.move_amount(true), 0.05);
        assert!((editor.rotate_amount(false) - std::f32::consts::FRAC_PI_4).abs() < 1e-6);
        assert!((editor.rotate_amount(true) - std::f32::consts::PI / 36.0).abs() < 1e-6);
    }
}
