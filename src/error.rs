use thiserror::Error;

/// Broad classes of engine failure. None of them are retried internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or uncompilable program, unsupported factor or format.
    Configuration,
    /// Device memory could not be allocated.
    ResourceExhaustion,
    /// Caller handed in something the kernels cannot process.
    InvalidParameter,
    /// Adapter/device acquisition or readback failure.
    Device,
}

#[derive(Error, Debug)]
pub enum BlurError {
    #[error("failed to compile pipeline `{label}`: {message}")]
    PipelineCompilation { label: String, message: String },

    #[error("no pipeline compiled for {key}")]
    MissingPipeline { key: String },

    #[error("unsupported vectorization factor {0} (expected one of 1, 2, 4, 8, 12, 16, 24, 32)")]
    UnsupportedVectorizationFactor(u32),

    #[error("unsupported pixel format: {0}")]
    UnsupportedPixelFormat(String),

    #[error("texture format {0:?} cannot be written by the blur kernels")]
    UnsupportedTextureFormat(wgpu::TextureFormat),

    #[error("box kernel must have odd, non-zero dimensions (got {width}x{height})")]
    InvalidKernelSize { width: u32, height: u32 },

    #[error("failed to allocate {width}x{height} intermediate texture: {message}")]
    ResourceExhausted {
        width: u32,
        height: u32,
        message: String,
    },

    #[error("image dimensions must be non-zero (got {width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("image {width}x{height} exceeds device limit {limit}")]
    ImageTooLarge { width: u32, height: u32, limit: u32 },

    #[error(
        "radius {radius} (kernel {kernel_size}) does not fit a {width}x{height} image"
    )]
    RadiusTooLarge {
        radius: u32,
        kernel_size: u32,
        width: u32,
        height: u32,
    },

    #[error("radius {radius} exceeds the largest supported radius {max}")]
    RadiusOutOfRange { radius: u32, max: u32 },

    #[error("source is {src_width}x{src_height} but destination is {dst_width}x{dst_height}")]
    DimensionMismatch {
        src_width: u32,
        src_height: u32,
        dst_width: u32,
        dst_height: u32,
    },

    #[error("{role} texture is missing usage {usage:?}")]
    MissingUsage {
        role: &'static str,
        usage: wgpu::TextureUsages,
    },

    #[error("source texture format {0:?} cannot be sampled as float")]
    UnsampleableFormat(wgpu::TextureFormat),

    #[error(
        "{role} texture must be a single-sampled 2D image with one layer \
         (got {dimension:?}, {layers} layers, {samples} samples, {mips} mips)"
    )]
    UnsupportedTextureShape {
        role: &'static str,
        dimension: wgpu::TextureDimension,
        layers: u32,
        samples: u32,
        mips: u32,
    },

    #[error("{strategy} cannot read and write the same texture")]
    AliasedTextures { strategy: &'static str },

    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("device request failed: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("texture readback failed: {0}")]
    Readback(String),
}

impl BlurError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BlurError::PipelineCompilation { .. }
            | BlurError::MissingPipeline { .. }
            | BlurError::UnsupportedVectorizationFactor(_)
            | BlurError::UnsupportedPixelFormat(_)
            | BlurError::UnsupportedTextureFormat(_)
            | BlurError::InvalidKernelSize { .. } => ErrorKind::Configuration,
            BlurError::ResourceExhausted { .. } => ErrorKind::ResourceExhaustion,
            BlurError::EmptyImage { .. }
            | BlurError::ImageTooLarge { .. }
            | BlurError::RadiusTooLarge { .. }
            | BlurError::RadiusOutOfRange { .. }
            | BlurError::DimensionMismatch { .. }
            | BlurError::MissingUsage { .. }
            | BlurError::UnsampleableFormat(_)
            | BlurError::UnsupportedTextureShape { .. }
            | BlurError::AliasedTextures { .. } => ErrorKind::InvalidParameter,
            BlurError::NoAdapter | BlurError::DeviceRequest(_) | BlurError::Readback(_) => {
                ErrorKind::Device
            }
        }
    }
}

pub type BlurResult<T> = Result<T, BlurError>;

#[cfg(test)]
mod tests {
    use super::{BlurError, ErrorKind};

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            BlurError::UnsupportedVectorizationFactor(3).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            BlurError::ResourceExhausted {
                width: 1,
                height: 1,
                message: String::new(),
            }
            .kind(),
            ErrorKind::ResourceExhaustion
        );
        assert_eq!(
            BlurError::RadiusTooLarge {
                radius: 9,
                kernel_size: 19,
                width: 8,
                height: 8,
            }
            .kind(),
            ErrorKind::InvalidParameter
        );
        assert_eq!(
            BlurError::AliasedTextures {
                strategy: "single_pass"
            }
            .kind(),
            ErrorKind::InvalidParameter
        );
        assert_eq!(
            BlurError::UnsampleableFormat(wgpu::TextureFormat::Rgba8Uint).kind(),
            ErrorKind::InvalidParameter
        );
        assert_eq!(BlurError::NoAdapter.kind(), ErrorKind::Device);
    }

    #[test]
    fn radius_error_message_names_dimensions() {
        let err = BlurError::RadiusTooLarge {
            radius: 4,
            kernel_size: 9,
            width: 8,
            height: 6,
        };
        assert_eq!(
            err.to_string(),
            "radius 4 (kernel 9) does not fit a 8x6 image"
        );
    }
}
