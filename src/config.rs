//! Configuration for the spectrum display.
//!
//! [`SpectrumConfig`] can be built in code or loaded from YAML. Every field
//! has a default, so a config file only needs to mention what it changes:
//!
//! ```yaml
//! title: "HF receiver"
//! history_depth: 2048
//! min_level: -120
//! max_level: -30
//! use_gpu: false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::gradient::DEFAULT_STRETCH;
use crate::data::history::DEFAULT_HISTORY_DEPTH;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// SpectrumConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level configuration.
///
/// | Field               | Purpose |
/// |---------------------|---------|
/// | `history_depth`     | Minimum number of retained frames |
/// | `min_level`/`max_level` | Display range in dB |
/// | `averaging`         | Exponential averaging factor of the graph |
/// | `use_gpu`           | Prefer the shader backend when available |
/// | `float_textures`    | Keep full-precision history on the GPU |
/// | `split_fraction`    | Initial waterfall share of the height |
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// Native window title.
    pub title: String,
    /// Minimum number of frames kept for the waterfall. The renderer grows
    /// this to the surface height when the surface is taller.
    pub history_depth: usize,
    /// Gradient table entries per palette segment.
    pub gradient_stretch: usize,
    /// Power mapped to the bottom of the gradient, in dB.
    pub min_level: f32,
    /// Power mapped to the top of the gradient, in dB.
    pub max_level: f32,
    /// Weight of the newest frame in the graph average, in `(0, 1]`.
    pub averaging: f32,
    pub use_gpu: bool,
    pub float_textures: bool,
    pub split_fraction: f32,
    /// RGBA color of the graph line.
    pub graph_line_color: [u8; 4],
    /// RGBA color of the area below the graph line.
    pub graph_fill_color: [u8; 4],
    /// Minimum distance between frequency axis ticks, in points.
    pub min_tick_spacing: f32,
    /// Key-value file used to remember the split position across runs.
    pub state_file: Option<std::path::PathBuf>,
    /// Optional eframe native-window options.
    #[serde(skip)]
    pub native_options: Option<eframe::NativeOptions>,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            title: "LiveSpectrum".to_string(),
            history_depth: DEFAULT_HISTORY_DEPTH,
            gradient_stretch: DEFAULT_STRETCH,
            min_level: -130.0,
            max_level: -20.0,
            averaging: 0.25,
            use_gpu: true,
            float_textures: true,
            split_fraction: 0.6,
            graph_line_color: [230, 230, 230, 255],
            graph_fill_color: [64, 96, 160, 96],
            min_tick_spacing: 80.0,
            state_file: None,
            native_options: None,
        }
    }
}

impl SpectrumConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let mut cfg: SpectrumConfig = serde_yaml::from_str(text)?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Pull out-of-range values back into range.
    pub fn sanitize(&mut self) {
        self.history_depth = self.history_depth.max(1);
        self.gradient_stretch = self.gradient_stretch.max(1);
        self.averaging = if self.averaging.is_finite() {
            self.averaging.clamp(0.001, 1.0)
        } else {
            1.0
        };
        self.split_fraction = clamp_split(self.split_fraction);
        if self.max_level < self.min_level {
            std::mem::swap(&mut self.min_level, &mut self.max_level);
        }
    }
}

/// Clamp a split fraction to `[0, 1]`; NaN becomes the default.
pub fn clamp_split(value: f32) -> f32 {
    if value.is_nan() {
        0.6
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg = SpectrumConfig::from_yaml_str("history_depth: 300\nuse_gpu: false\n").unwrap();
        assert_eq!(cfg.history_depth, 300);
        assert!(!cfg.use_gpu);
        assert!(cfg.float_textures);
        assert_eq!(cfg.min_level, -130.0);
    }

    #[test]
    fn sanitize_fixes_inverted_levels_and_split() {
        let cfg =
            SpectrumConfig::from_yaml_str("min_level: 0\nmax_level: -100\nsplit_fraction: 3.0\n")
                .unwrap();
        assert_eq!(cfg.min_level, -100.0);
        assert_eq!(cfg.max_level, 0.0);
        assert_eq!(cfg.split_fraction, 1.0);
    }

    #[test]
    fn yaml_round_trip() {
        let cfg = SpectrumConfig {
            title: "test".into(),
            ..Default::default()
        };
        let text = cfg.to_yaml_string().unwrap();
        let back = SpectrumConfig::from_yaml_str(&text).unwrap();
        assert_eq!(back.title, "test");
        assert_eq!(back.graph_fill_color, cfg.graph_fill_color);
    }
}
