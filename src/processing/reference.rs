use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::error::{BlurError, BlurResult};
use crate::pixel_format::PixelFormat;
use crate::processing::dispatch::{DispatchGeometry, ExecutionLimits};
use crate::processing::engine::{check_distinct, check_textures};
use crate::processing::pipeline_cache::{self, PipelineObject, ProgramDesc};
use crate::processing::shaders;

/// What a box filter reads for neighbours outside the image.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum EdgeMode {
    /// Nearest edge pixel.
    #[default]
    Clamp,
    /// Transparent black.
    Zero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBoxDescriptor {
    pub kernel_width: u32,
    pub kernel_height: u32,
    pub edge_mode: EdgeMode,
}

impl ImageBoxDescriptor {
    /// Square kernel with edge clamping.
    pub fn square(kernel_size: u32) -> Self {
        Self {
            kernel_width: kernel_size,
            kernel_height: kernel_size,
            edge_mode: EdgeMode::Clamp,
        }
    }

    pub fn validate(&self) -> BlurResult<()> {
        // extents become `i32` pipeline constants
        let valid = |n: u32| n % 2 == 1 && n <= i32::MAX as u32;
        if !valid(self.kernel_width) || !valid(self.kernel_height) {
            return Err(BlurError::InvalidKernelSize {
                width: self.kernel_width,
                height: self.kernel_height,
            });
        }
        Ok(())
    }
}

/// A ready-made box filter the engine delegates its baseline pass to.
///
/// Kernel dimensions are fixed when the primitive is built; implementations
/// only encode work and never submit it.
pub trait BoxFilterPrimitive: Send + Sync {
    fn kernel_width(&self) -> u32;
    fn kernel_height(&self) -> u32;
    fn edge_mode(&self) -> EdgeMode;

    fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::Texture,
        destination: &wgpu::Texture,
    ) -> BlurResult<()>;
}

/// Built-in rectangular box filter with kernel extents and edge policy baked
/// into its programs, one program per destination format.
pub struct ImageBox {
    device: Arc<wgpu::Device>,
    descriptor: ImageBoxDescriptor,
    pipelines: HashMap<PixelFormat, PipelineObject>,
}

impl ImageBox {
    pub fn new(device: Arc<wgpu::Device>, descriptor: ImageBoxDescriptor) -> BlurResult<Self> {
        descriptor.validate()?;
        let workgroup = ExecutionLimits::from_limits(&device.limits()).occupancy_group();
        let mut constants = workgroup.as_constants();
        constants.insert("KERNEL_WIDTH".to_string(), descriptor.kernel_width as f64);
        constants.insert("KERNEL_HEIGHT".to_string(), descriptor.kernel_height as f64);
        let edge_zero = match descriptor.edge_mode {
            EdgeMode::Clamp => 0.0,
            EdgeMode::Zero => 1.0,
        };
        constants.insert("EDGE_ZERO".to_string(), edge_zero);

        let mut pipelines = HashMap::new();
        for target in PixelFormat::ALL {
            let label = format!(
                "image_box_{}x{}/{}",
                descriptor.kernel_width,
                descriptor.kernel_height,
                target.wgsl_storage_format()
            );
            let module = pipeline_cache::create_module(
                &device,
                &label,
                shaders::IMAGE_BOX_SHADER_SRC,
                target,
            )?;
            let object = pipeline_cache::create_program(
                &device,
                ProgramDesc {
                    label: &label,
                    module: &module,
                    entry_point: shaders::IMAGE_BOX_ENTRY,
                    target,
                    constants: &constants,
                    workgroup,
                    uniform: false,
                },
            )?;
            pipelines.insert(target, object);
        }
        Ok(Self {
            device,
            descriptor,
            pipelines,
        })
    }

    pub fn descriptor(&self) -> ImageBoxDescriptor {
        self.descriptor
    }
}

impl BoxFilterPrimitive for ImageBox {
    fn kernel_width(&self) -> u32 {
        self.descriptor.kernel_width
    }

    fn kernel_height(&self) -> u32 {
        self.descriptor.kernel_height
    }

    fn edge_mode(&self) -> EdgeMode {
        self.descriptor.edge_mode
    }

    fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::Texture,
        destination: &wgpu::Texture,
    ) -> BlurResult<()> {
        let target = check_textures(source, destination)?;
        check_distinct("image_box", source, destination)?;
        let object = self
            .pipelines
            .get(&target)
            .ok_or(BlurError::UnsupportedTextureFormat(destination.format()))?;

        let src_view = source.create_view(&wgpu::TextureViewDescriptor::default());
        let dst_view = destination.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(object.label()),
            layout: object.bind_group_layout(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&src_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&dst_view),
                },
            ],
        });

        let geometry =
            DispatchGeometry::full_image(source.width(), source.height(), object.workgroup());
        let (x, y, z) = geometry.workgroups();
        trace!(program = object.label(), groups = ?(x, y, z), "encode image box");
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(object.label()),
            timestamp_writes: None,
        });
        pass.set_pipeline(object.pipeline());
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(x, y, z);
        Ok(())
    }
}
