//! Box blur on the GPU with interchangeable dispatch strategies.
//!
//! [`BoxBlur`] encodes into a caller-owned `wgpu::CommandEncoder`; building,
//! submitting and waiting on it stays with the caller.

pub mod config;
pub mod error;
pub mod pixel_format;
pub mod processing;
pub mod vectorization;

#[cfg(test)]
mod test_support;

pub use config::BlurConfig;
pub use error::{BlurError, BlurResult, ErrorKind};
pub use pixel_format::PixelFormat;
pub use processing::context::{GpuContext, RuntimeStatus};
pub use processing::dispatch::{DispatchGeometry, ExecutionLimits, WorkgroupSize};
pub use processing::engine::{BoxBlur, MAX_RADIUS, Strategy};
pub use processing::intermediate::{Allocation, IntermediateTexture};
pub use processing::pipeline_cache::{
    Axis, Kernel, KernelVariant, PipelineCache, PipelineKey, PipelineObject,
};
pub use processing::reference::{BoxFilterPrimitive, EdgeMode, ImageBox, ImageBoxDescriptor};
pub use vectorization::VectorizationFactor;
