use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BlurError;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Four-channel storage precision for textures the kernels write.
pub enum PixelFormat {
    #[default]
    Rgba8,
    Rgba16,
    Rgba32,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 3] = [
        PixelFormat::Rgba8,
        PixelFormat::Rgba16,
        PixelFormat::Rgba32,
    ];

    pub fn texture_format(self) -> wgpu::TextureFormat {
        match self {
            PixelFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
            PixelFormat::Rgba16 => wgpu::TextureFormat::Rgba16Float,
            PixelFormat::Rgba32 => wgpu::TextureFormat::Rgba32Float,
        }
    }

    /// Format token used in `texture_storage_2d<..., write>` declarations.
    pub fn wgsl_storage_format(self) -> &'static str {
        match self {
            PixelFormat::Rgba8 => "rgba8unorm",
            PixelFormat::Rgba16 => "rgba16float",
            PixelFormat::Rgba32 => "rgba32float",
        }
    }

    pub fn from_texture_format(format: wgpu::TextureFormat) -> Option<Self> {
        match format {
            wgpu::TextureFormat::Rgba8Unorm => Some(PixelFormat::Rgba8),
            wgpu::TextureFormat::Rgba16Float => Some(PixelFormat::Rgba16),
            wgpu::TextureFormat::Rgba32Float => Some(PixelFormat::Rgba32),
            _ => None,
        }
    }

    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Rgba16 => 8,
            PixelFormat::Rgba32 => 16,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelFormat::Rgba8 => write!(f, "RGBA8"),
            PixelFormat::Rgba16 => write!(f, "RGBA16"),
            PixelFormat::Rgba32 => write!(f, "RGBA32"),
        }
    }
}

impl FromStr for PixelFormat {
    type Err = BlurError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rgba8" | "8" | "unorm8" => Ok(PixelFormat::Rgba8),
            "rgba16" | "16" | "f16" | "half" => Ok(PixelFormat::Rgba16),
            "rgba32" | "32" | "f32" | "float" => Ok(PixelFormat::Rgba32),
            _ => Err(BlurError::UnsupportedPixelFormat(value.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PixelFormat;

    #[test]
    fn parse_handles_supported_values() {
        assert_eq!("rgba8".parse::<PixelFormat>().ok(), Some(PixelFormat::Rgba8));
        assert_eq!(" RGBA16 ".parse::<PixelFormat>().ok(), Some(PixelFormat::Rgba16));
        assert_eq!("half".parse::<PixelFormat>().ok(), Some(PixelFormat::Rgba16));
        assert_eq!("f32".parse::<PixelFormat>().ok(), Some(PixelFormat::Rgba32));
    }

    #[test]
    fn parse_rejects_unknown_values() {
        assert!("bgra8".parse::<PixelFormat>().is_err());
        assert!("".parse::<PixelFormat>().is_err());
    }

    #[test]
    fn texture_format_round_trips_for_closed_set() {
        for format in PixelFormat::ALL {
            assert_eq!(
                PixelFormat::from_texture_format(format.texture_format()),
                Some(format)
            );
        }
        assert_eq!(
            PixelFormat::from_texture_format(wgpu::TextureFormat::Bgra8Unorm),
            None
        );
    }

    #[test]
    fn display_matches_report_labels() {
        let labels: Vec<String> = PixelFormat::ALL.iter().map(|f| f.to_string()).collect();
        assert_eq!(labels, ["RGBA8", "RGBA16", "RGBA32"]);
    }
}
