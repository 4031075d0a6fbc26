use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::pixel_format::PixelFormat;
use crate::processing::engine::{self, MAX_RADIUS};

pub const RADIUS_ENV: &str = "BOXBLUR_RADIUS";
pub const PIXEL_FORMAT_ENV: &str = "BOXBLUR_PIXEL_FORMAT";
pub const DEFAULT_RADIUS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Construction-time settings for a [`crate::BoxBlur`] engine.
pub struct BlurConfig {
    pub radius: u32,
    pub intermediate_format: PixelFormat,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            radius: DEFAULT_RADIUS,
            intermediate_format: PixelFormat::default(),
        }
    }
}

impl BlurConfig {
    /// Returns the user config file path, if a config directory is available.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("boxblur").join("config.toml"))
    }

    /// Loads config from the user config path, falling back to defaults on any error.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        Self::load_from(&path).unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_toml(&contents).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Writes config to the user config path, ignoring filesystem/serialization errors.
    pub fn save(&self) {
        let Some(path) = Self::config_path() else {
            return;
        };
        let _ = self.save_to(&path);
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create config dir {}", parent.display()))?;
        }
        let s = toml::to_string_pretty(self)?;
        std::fs::write(path, s).with_context(|| format!("write config {}", path.display()))?;
        Ok(())
    }

    /// Overrides fields from `BOXBLUR_RADIUS` / `BOXBLUR_PIXEL_FORMAT`.
    /// Unparseable values and radii above [`MAX_RADIUS`] are ignored.
    pub fn apply_env(mut self) -> Self {
        let radius = std::env::var(RADIUS_ENV).ok();
        let format = std::env::var(PIXEL_FORMAT_ENV).ok();
        self.apply_overrides(radius.as_deref(), format.as_deref());
        self
    }

    fn apply_overrides(&mut self, radius: Option<&str>, format: Option<&str>) {
        if let Some(radius) = radius
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|&r| r <= MAX_RADIUS)
        {
            self.radius = radius;
        }
        if let Some(format) = format.and_then(|raw| raw.parse::<PixelFormat>().ok()) {
            self.intermediate_format = format;
        }
    }

    /// `None` when the radius is above [`MAX_RADIUS`].
    pub fn kernel_size(&self) -> Option<u32> {
        engine::kernel_size(self.radius).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::{BlurConfig, DEFAULT_RADIUS};
    use crate::pixel_format::PixelFormat;

    #[test]
    fn missing_fields_use_defaults() {
        let config = BlurConfig::from_toml("radius = 4\n").expect("partial config should parse");
        assert_eq!(config.radius, 4);
        assert_eq!(config.intermediate_format, PixelFormat::Rgba8);

        let empty = BlurConfig::from_toml("").expect("empty config should parse");
        assert_eq!(empty.radius, DEFAULT_RADIUS);
    }

    #[test]
    fn format_is_read_in_lowercase() {
        let config = BlurConfig::from_toml("intermediate_format = \"rgba16\"\n")
            .expect("format should parse");
        assert_eq!(config.intermediate_format, PixelFormat::Rgba16);
        assert!(BlurConfig::from_toml("intermediate_format = \"bgra8\"\n").is_err());
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = std::env::temp_dir().join(format!("boxblur-config-test-{}", std::process::id()));
        let path = dir.join("config.toml");
        let config = BlurConfig {
            radius: 7,
            intermediate_format: PixelFormat::Rgba32,
        };
        config.save_to(&path).expect("save should succeed");
        let loaded = BlurConfig::load_from(&path).expect("load should succeed");
        assert_eq!(loaded, config);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_from_missing_file_reports_path() {
        let err = BlurConfig::load_from(std::path::Path::new("/nonexistent/boxblur.toml"))
            .expect_err("missing file should fail");
        assert!(format!("{err:#}").contains("/nonexistent/boxblur.toml"));
    }

    #[test]
    fn overrides_ignore_garbage() {
        let mut config = BlurConfig::default();
        config.apply_overrides(Some(" 12 "), Some("f32"));
        assert_eq!(config.radius, 12);
        assert_eq!(config.intermediate_format, PixelFormat::Rgba32);

        config.apply_overrides(Some("-3"), Some("bogus"));
        assert_eq!(config.radius, 12);
        config.apply_overrides(Some("3000000000"), None);
        assert_eq!(config.radius, 12);
        assert_eq!(config.intermediate_format, PixelFormat::Rgba32);
    }

    #[test]
    fn kernel_size_is_odd() {
        let config = BlurConfig {
            radius: 0,
            ..Default::default()
        };
        assert_eq!(config.kernel_size(), Some(1));
        assert_eq!(BlurConfig::default().kernel_size(), Some(61));
        let huge = BlurConfig {
            radius: 1 << 31,
            ..Default::default()
        };
        assert_eq!(huge.kernel_size(), None);
    }
}
