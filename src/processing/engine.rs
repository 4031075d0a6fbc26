use std::fmt;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use tracing::{debug, trace};
use wgpu::util::DeviceExt;

use crate::config::BlurConfig;
use crate::error::{BlurError, BlurResult};
use crate::pixel_format::PixelFormat;
use crate::processing::dispatch::{DispatchGeometry, WorkgroupSize};
use crate::processing::intermediate::IntermediateTexture;
use crate::processing::pipeline_cache::{Axis, Kernel, PipelineCache, PipelineKey};
use crate::processing::reference::{BoxFilterPrimitive, ImageBox, ImageBoxDescriptor};
use crate::vectorization::VectorizationFactor;

/// Largest radius whose kernel width still fits the kernels' `i32` parameters.
pub const MAX_RADIUS: u32 = (i32::MAX as u32 - 1) / 2;

/// Layout of the `BlurParams` uniform every blur program reads at binding 2.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct BlurParams {
    radius: i32,
    kernel_size: i32,
    _pad0: i32,
    _pad1: i32,
}

/// One way of producing the blur. Labels match the names used in benchmark reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    SinglePass,
    DoublePass,
    VectorizedDoublePass(VectorizationFactor),
    Reference,
}

impl Strategy {
    pub fn all() -> Vec<Strategy> {
        let mut strategies = vec![Strategy::SinglePass, Strategy::DoublePass];
        strategies.extend(
            VectorizationFactor::ALL
                .into_iter()
                .map(Strategy::VectorizedDoublePass),
        );
        strategies.push(Strategy::Reference);
        strategies
    }

    pub fn label(&self) -> String {
        match self {
            Strategy::SinglePass => "single_pass".to_string(),
            Strategy::DoublePass => "double_pass".to_string(),
            Strategy::VectorizedDoublePass(factor) => format!("fast_double_pass_{factor}"),
            Strategy::Reference => "reference".to_string(),
        }
    }

    pub fn uses_intermediate(&self) -> bool {
        matches!(
            self,
            Strategy::DoublePass | Strategy::VectorizedDoublePass(_)
        )
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Box blur engine. Encodes into caller-owned command encoders and never
/// submits or waits.
///
/// Not meant for concurrent use: separable strategies take `&mut self`
/// because they may reallocate the scratch texture. Several engines can
/// share one [`PipelineCache`].
pub struct BoxBlur {
    radius: u32,
    device: Arc<wgpu::Device>,
    pipelines: Arc<PipelineCache>,
    reference: Box<dyn BoxFilterPrimitive>,
    intermediate: IntermediateTexture,
}

impl BoxBlur {
    /// Build an engine with its own pipeline cache. Fails if any program does
    /// not compile.
    pub fn new(
        radius: u32,
        device: Arc<wgpu::Device>,
        intermediate_format: PixelFormat,
    ) -> BlurResult<Self> {
        kernel_size(radius)?;
        let pipelines = Arc::new(PipelineCache::build(&device)?);
        Self::with_pipeline_cache(radius, device, intermediate_format, pipelines)
    }

    pub fn from_config(config: &BlurConfig, device: Arc<wgpu::Device>) -> BlurResult<Self> {
        Self::new(config.radius, device, config.intermediate_format)
    }

    pub fn with_pipeline_cache(
        radius: u32,
        device: Arc<wgpu::Device>,
        intermediate_format: PixelFormat,
        pipelines: Arc<PipelineCache>,
    ) -> BlurResult<Self> {
        let reference = ImageBox::new(
            device.clone(),
            ImageBoxDescriptor::square(kernel_size(radius)?),
        )?;
        debug!(
            radius,
            %intermediate_format,
            slots = pipelines.len(),
            "box blur engine ready"
        );
        Ok(Self {
            radius,
            device,
            pipelines,
            reference: Box::new(reference),
            intermediate: IntermediateTexture::new(intermediate_format),
        })
    }

    /// Swap the baseline filter used by [`BoxBlur::reference_pass`].
    pub fn with_reference_filter(mut self, reference: Box<dyn BoxFilterPrimitive>) -> Self {
        self.reference = reference;
        self
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// Takes effect on the next dispatch. Cached programs are unaffected and
    /// the reference filter keeps the kernel it was built with.
    pub fn set_radius(&mut self, radius: u32) -> BlurResult<()> {
        kernel_size(radius)?;
        if radius != self.radius {
            debug!(from = self.radius, to = radius, "blur radius changed");
        }
        self.radius = radius;
        Ok(())
    }

    pub fn kernel_size(&self) -> u32 {
        2 * self.radius + 1
    }

    pub fn intermediate(&self) -> &IntermediateTexture {
        &self.intermediate
    }

    pub fn pipeline_cache(&self) -> &Arc<PipelineCache> {
        &self.pipelines
    }

    pub fn reference_filter(&self) -> &dyn BoxFilterPrimitive {
        self.reference.as_ref()
    }

    pub fn encode(
        &mut self,
        strategy: Strategy,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::Texture,
        destination: &wgpu::Texture,
    ) -> BlurResult<()> {
        match strategy {
            Strategy::SinglePass => self.single_pass(encoder, source, destination),
            Strategy::DoublePass => self.double_pass(encoder, source, destination),
            Strategy::VectorizedDoublePass(factor) => {
                self.vectorized_double_pass(encoder, source, destination, factor)
            }
            Strategy::Reference => self.reference_pass(encoder, source, destination),
        }
    }

    /// Full `KernelSize²` window per pixel, one thread per pixel.
    pub fn single_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::Texture,
        destination: &wgpu::Texture,
    ) -> BlurResult<()> {
        let target = check_textures(source, destination)?;
        check_distinct("single_pass", source, destination)?;
        let dims = (source.width(), source.height());
        check_radius(self.radius, dims.0, dims.1)?;
        let key = PipelineKey::new(Kernel::SinglePass, target);
        self.pipelines.require(&key)?;

        let params = params_buffer(&self.device, self.radius);
        let src_view = source.create_view(&wgpu::TextureViewDescriptor::default());
        let dst_view = destination.create_view(&wgpu::TextureViewDescriptor::default());
        PassEncoder {
            device: &self.device,
            pipelines: &self.pipelines,
            params: &params,
        }
        .encode(encoder, key, &src_view, &dst_view, dims)
    }

    /// Horizontal then vertical 1-D window, one thread per pixel in each pass.
    pub fn double_pass(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::Texture,
        destination: &wgpu::Texture,
    ) -> BlurResult<()> {
        self.encode_separable(
            encoder,
            source,
            destination,
            Kernel::DoublePass(Axis::Horizontal),
            Kernel::DoublePass(Axis::Vertical),
        )
    }

    /// Sliding-window passes, one thread per row then one per column, each
    /// consuming `factor` pixels per inner step.
    pub fn vectorized_double_pass(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::Texture,
        destination: &wgpu::Texture,
        factor: VectorizationFactor,
    ) -> BlurResult<()> {
        self.encode_separable(
            encoder,
            source,
            destination,
            Kernel::Separable(Axis::Horizontal, factor),
            Kernel::Separable(Axis::Vertical, factor),
        )
    }

    /// Delegate to the reference box filter configured at construction.
    pub fn reference_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::Texture,
        destination: &wgpu::Texture,
    ) -> BlurResult<()> {
        check_textures(source, destination)?;
        check_distinct("reference", source, destination)?;
        let (kw, kh) = (
            self.reference.kernel_width(),
            self.reference.kernel_height(),
        );
        if kw > source.width() || kh > source.height() {
            return Err(BlurError::RadiusTooLarge {
                radius: kw.max(kh) / 2,
                kernel_size: kw.max(kh),
                width: source.width(),
                height: source.height(),
            });
        }
        trace!(kernel_width = kw, kernel_height = kh, "encode reference pass");
        self.reference.encode(encoder, source, destination)
    }

    /// source → intermediate → destination. The vertical pass relies on wgpu
    /// ordering it after the horizontal pass recorded earlier in the same
    /// encoder.
    fn encode_separable(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::Texture,
        destination: &wgpu::Texture,
        horizontal: Kernel,
        vertical: Kernel,
    ) -> BlurResult<()> {
        let target = check_textures(source, destination)?;
        let dims = (source.width(), source.height());
        check_radius(self.radius, dims.0, dims.1)?;

        // Both programs are resolved before the scratch texture is touched.
        let h_key = PipelineKey::new(horizontal, self.intermediate.format());
        let v_key = PipelineKey::new(vertical, target);
        self.pipelines.require(&h_key)?;
        self.pipelines.require(&v_key)?;

        let params = params_buffer(&self.device, self.radius);
        let src_view = source.create_view(&wgpu::TextureViewDescriptor::default());
        let dst_view = destination.create_view(&wgpu::TextureViewDescriptor::default());
        let (_, scratch) = self.intermediate.acquire(&self.device, dims.0, dims.1)?;
        let passes = PassEncoder {
            device: &self.device,
            pipelines: &self.pipelines,
            params: &params,
        };
        passes.encode(encoder, h_key, &src_view, scratch, dims)?;
        passes.encode(encoder, v_key, scratch, &dst_view, dims)
    }
}

/// Records one blur program into its own compute pass.
struct PassEncoder<'a> {
    device: &'a wgpu::Device,
    pipelines: &'a PipelineCache,
    params: &'a wgpu::Buffer,
}

impl PassEncoder<'_> {
    fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        key: PipelineKey,
        input: &wgpu::TextureView,
        output: &wgpu::TextureView,
        (width, height): (u32, u32),
    ) -> BlurResult<()> {
        let object = self.pipelines.require(&key)?;
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(object.label()),
            layout: object.bind_group_layout(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(input),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(output),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.params.as_entire_binding(),
                },
            ],
        });

        let geometry = dispatch_geometry(key.kernel, width, height, object.workgroup());
        let (x, y, z) = geometry.workgroups();
        trace!(
            program = object.label(),
            threads = ?geometry.threads_per_grid,
            group = %geometry.group,
            "encode blur pass"
        );
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

/// `radius` must already have passed [`check_radius`].
fn params_buffer(device: &wgpu::Device, radius: u32) -> wgpu::Buffer {
    let params = BlurParams {
        radius: radius as i32,
        kernel_size: (2 * radius + 1) as i32,
        _pad0: 0,
        _pad1: 0,
    };
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("boxblur_params"),
        contents: bytemuck::bytes_of(&params),
        usage: wgpu::BufferUsages::UNIFORM,
    })
}

impl fmt::Debug for BoxBlur {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxBlur")
            .field("radius", &self.radius)
            .field("intermediate", &self.intermediate)
            .field("pipelines", &self.pipelines)
            .finish_non_exhaustive()
    }
}

/// `2r + 1`, or `RadiusOutOfRange` when it would not fit an `i32`.
pub(crate) fn kernel_size(radius: u32) -> BlurResult<u32> {
    if radius > MAX_RADIUS {
        return Err(BlurError::RadiusOutOfRange {
            radius,
            max: MAX_RADIUS,
        });
    }
    Ok(2 * radius + 1)
}

fn dispatch_geometry(
    kernel: Kernel,
    width: u32,
    height: u32,
    group: WorkgroupSize,
) -> DispatchGeometry {
    match kernel {
        Kernel::Separable(Axis::Horizontal, _) => DispatchGeometry::per_row(width, height, group),
        Kernel::Separable(Axis::Vertical, _) => DispatchGeometry::per_column(width, height, group),
        Kernel::SinglePass | Kernel::DoublePass(_) => {
            DispatchGeometry::full_image(width, height, group)
        }
    }
}

pub(crate) fn check_radius(radius: u32, width: u32, height: u32) -> BlurResult<()> {
    let kernel = kernel_size(radius)?;
    if kernel > width.min(height) {
        return Err(BlurError::RadiusTooLarge {
            radius,
            kernel_size: kernel,
            width,
            height,
        });
    }
    Ok(())
}

/// Checks a source/destination pair and returns the destination's format.
pub(crate) fn check_textures(
    source: &wgpu::Texture,
    destination: &wgpu::Texture,
) -> BlurResult<PixelFormat> {
    let (width, height) = (source.width(), source.height());
    if width == 0 || height == 0 {
        return Err(BlurError::EmptyImage { width, height });
    }
    if (destination.width(), destination.height()) != (width, height) {
        return Err(BlurError::DimensionMismatch {
            src_width: width,
            src_height: height,
            dst_width: destination.width(),
            dst_height: destination.height(),
        });
    }
    check_shape("source", source, false)?;
    check_shape("destination", destination, true)?;
    if !matches!(
        source.format().sample_type(None, None),
        Some(wgpu::TextureSampleType::Float { .. })
    ) {
        return Err(BlurError::UnsampleableFormat(source.format()));
    }
    if !source.usage().contains(wgpu::TextureUsages::TEXTURE_BINDING) {
        return Err(BlurError::MissingUsage {
            role: "source",
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
        });
    }
    if !destination
        .usage()
        .contains(wgpu::TextureUsages::STORAGE_BINDING)
    {
        return Err(BlurError::MissingUsage {
            role: "destination",
            usage: wgpu::TextureUsages::STORAGE_BINDING,
        });
    }
    PixelFormat::from_texture_format(destination.format())
        .ok_or(BlurError::UnsupportedTextureFormat(destination.format()))
}

/// Plain 2-D, single layer, single sample. Storage views also need a single mip.
fn check_shape(role: &'static str, texture: &wgpu::Texture, single_mip: bool) -> BlurResult<()> {
    let (dimension, layers, samples, mips) = (
        texture.dimension(),
        texture.depth_or_array_layers(),
        texture.sample_count(),
        texture.mip_level_count(),
    );
    if dimension != wgpu::TextureDimension::D2
        || layers != 1
        || samples != 1
        || (single_mip && mips != 1)
    {
        return Err(BlurError::UnsupportedTextureShape {
            role,
            dimension,
            layers,
            samples,
            mips,
        });
    }
    Ok(())
}

/// Passes that sample and store within one dispatch need two textures.
pub(crate) fn check_distinct(
    strategy: &'static str,
    source: &wgpu::Texture,
    destination: &wgpu::Texture,
) -> BlurResult<()> {
    if source == destination {
        return Err(BlurError::AliasedTextures { strategy });
    }
    Ok(())
}
