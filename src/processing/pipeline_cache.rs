use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use tracing::{debug, info};

use crate::error::{BlurError, BlurResult};
use crate::pixel_format::PixelFormat;
use crate::processing::dispatch::{ExecutionLimits, WorkgroupSize};
use crate::processing::shaders;
use crate::vectorization::VectorizationFactor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    pub const BOTH: [Axis; 2] = [Axis::Horizontal, Axis::Vertical];
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Horizontal => write!(f, "horizontal"),
            Axis::Vertical => write!(f, "vertical"),
        }
    }
}

/// Which compiled program a dispatch needs, independent of storage format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kernel {
    SinglePass,
    DoublePass(Axis),
    Separable(Axis, VectorizationFactor),
}

impl Kernel {
    fn template(self) -> &'static str {
        match self {
            Kernel::SinglePass => shaders::SINGLE_PASS_SHADER_SRC,
            Kernel::DoublePass(_) => shaders::DOUBLE_PASS_SHADER_SRC,
            Kernel::Separable(..) => shaders::SEPARABLE_SHADER_SRC,
        }
    }

    fn module_name(self) -> &'static str {
        match self {
            Kernel::SinglePass => "single_pass",
            Kernel::DoublePass(_) => "double_pass",
            Kernel::Separable(..) => "separable",
        }
    }

    fn entry_point(self, variant: KernelVariant) -> &'static str {
        match (self, variant) {
            (Kernel::SinglePass, _) => shaders::SINGLE_PASS_ENTRY,
            (Kernel::DoublePass(Axis::Horizontal), _) => shaders::DOUBLE_PASS_H_ENTRY,
            (Kernel::DoublePass(Axis::Vertical), _) => shaders::DOUBLE_PASS_V_ENTRY,
            (Kernel::Separable(Axis::Horizontal, _), KernelVariant::Primary) => shaders::HBOX_ENTRY,
            (Kernel::Separable(Axis::Horizontal, _), KernelVariant::Edge) => {
                shaders::HBOX_EDGE_ENTRY
            }
            (Kernel::Separable(Axis::Vertical, _), KernelVariant::Primary) => shaders::VBOX_ENTRY,
            (Kernel::Separable(Axis::Vertical, _), KernelVariant::Edge) => shaders::VBOX_EDGE_ENTRY,
        }
    }

    /// Program label, e.g. `hbox_blur_x4_edge`.
    pub fn label(self, variant: KernelVariant) -> String {
        match self {
            Kernel::Separable(_, factor) => {
                let base = self.entry_point(KernelVariant::Primary);
                match variant {
                    KernelVariant::Primary => format!("{base}_{factor}"),
                    KernelVariant::Edge => format!("{base}_{factor}_edge"),
                }
            }
            _ => self.entry_point(variant).to_string(),
        }
    }

    /// Sliding-window kernels run one thread per row or column.
    fn workgroup(self, limits: &ExecutionLimits) -> WorkgroupSize {
        match self {
            Kernel::Separable(..) => limits.row_group(),
            _ => limits.occupancy_group(),
        }
    }

    fn constants(self, workgroup: WorkgroupSize) -> HashMap<String, f64> {
        let mut constants = workgroup.as_constants();
        if let Kernel::Separable(_, factor) = self {
            let items = factor.items().min(shaders::MAX_ITEMS);
            constants.insert("ITEMS".to_string(), items as f64);
        }
        constants
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kernel::SinglePass => write!(f, "single pass"),
            Kernel::DoublePass(axis) => write!(f, "double pass ({axis})"),
            Kernel::Separable(axis, factor) => write!(f, "separable {factor} ({axis})"),
        }
    }
}

/// Sliding-window kernels come in two flavours per axis. Both are compiled
/// but they share one cache slot and the edge variant is written last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelVariant {
    Primary,
    Edge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub kernel: Kernel,
    /// Storage format of the texture the program writes.
    pub target: PixelFormat,
}

impl PipelineKey {
    pub fn new(kernel: Kernel, target: PixelFormat) -> Self {
        Self { kernel, target }
    }
}

impl fmt::Display for PipelineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} writing {}", self.kernel, self.target)
    }
}

/// A validated compute pipeline plus the layout and group shape it was built with.
pub struct PipelineObject {
    label: String,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    workgroup: WorkgroupSize,
}

impl PipelineObject {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn pipeline(&self) -> &wgpu::ComputePipeline {
        &self.pipeline
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    pub fn workgroup(&self) -> WorkgroupSize {
        self.workgroup
    }
}

impl fmt::Debug for PipelineObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineObject")
            .field("label", &self.label)
            .field("workgroup", &self.workgroup)
            .finish_non_exhaustive()
    }
}

/// Every program the engine can dispatch, compiled once and read-only afterwards.
pub struct PipelineCache {
    pipelines: HashMap<PipelineKey, PipelineObject>,
    compiled: Vec<String>,
    limits: ExecutionLimits,
}

impl PipelineCache {
    /// Compile all kernels for every storage format and vectorization factor.
    pub fn build(device: &wgpu::Device) -> BlurResult<Self> {
        Self::build_with(device, &PixelFormat::ALL, &VectorizationFactor::ALL)
    }

    pub fn build_with(
        device: &wgpu::Device,
        targets: &[PixelFormat],
        factors: &[VectorizationFactor],
    ) -> BlurResult<Self> {
        let limits = ExecutionLimits::from_limits(&device.limits());
        let mut pipelines = HashMap::new();
        let mut compiled = Vec::new();

        for &target in targets {
            let mut modules: HashMap<&'static str, wgpu::ShaderModule> = HashMap::new();
            for (key, variant) in compile_plan(&[target], factors) {
                let family = key.kernel.module_name();
                let module = match modules.entry(family) {
                    Entry::Occupied(slot) => slot.into_mut(),
                    Entry::Vacant(slot) => {
                        let label = format!("{family}/{}", target.wgsl_storage_format());
                        slot.insert(create_module(device, &label, key.kernel.template(), target)?)
                    }
                };

                let label = format!(
                    "{}/{}",
                    key.kernel.label(variant),
                    target.wgsl_storage_format()
                );
                let workgroup = key.kernel.workgroup(&limits);
                let object = create_program(
                    device,
                    ProgramDesc {
                        label: &label,
                        module,
                        entry_point: key.kernel.entry_point(variant),
                        target,
                        constants: &key.kernel.constants(workgroup),
                        workgroup,
                        uniform: true,
                    },
                )?;
                debug!(program = %label, %workgroup, "compiled blur program");
                compiled.push(label);

                if let Some(previous) = pipelines.insert(key, object) {
                    debug!(
                        key = %key,
                        shadowed = previous.label(),
                        "pipeline slot overwritten by later variant"
                    );
                }
            }
        }

        info!(
            programs = compiled.len(),
            slots = pipelines.len(),
            execution_width = limits.execution_width,
            max_threads_per_group = limits.max_threads_per_group,
            "pipeline cache ready"
        );
        Ok(Self {
            pipelines,
            compiled,
            limits,
        })
    }

    pub fn get(&self, key: &PipelineKey) -> Option<&PipelineObject> {
        self.pipelines.get(key)
    }

    pub fn require(&self, key: &PipelineKey) -> BlurResult<&PipelineObject> {
        self.get(key).ok_or_else(|| BlurError::MissingPipeline {
            key: key.to_string(),
        })
    }

    /// Labels of every program compiled, in compile order, including
    /// variants whose slot was later overwritten.
    pub fn compiled_labels(&self) -> &[String] {
        &self.compiled
    }

    /// Number of reachable pipeline slots.
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    pub fn execution_limits(&self) -> ExecutionLimits {
        self.limits
    }
}

impl fmt::Debug for PipelineCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineCache")
            .field("slots", &self.pipelines.len())
            .field("compiled", &self.compiled.len())
            .field("limits", &self.limits)
            .finish()
    }
}

/// Compile order: single pass, naive pair, then primary followed by edge for
/// every (factor, axis).
fn compile_plan(
    targets: &[PixelFormat],
    factors: &[VectorizationFactor],
) -> Vec<(PipelineKey, KernelVariant)> {
    let mut plan = Vec::new();
    for &target in targets {
        plan.push((
            PipelineKey::new(Kernel::SinglePass, target),
            KernelVariant::Primary,
        ));
        for axis in Axis::BOTH {
            plan.push((
                PipelineKey::new(Kernel::DoublePass(axis), target),
                KernelVariant::Primary,
            ));
        }
        for &factor in factors {
            for axis in Axis::BOTH {
                let key = PipelineKey::new(Kernel::Separable(axis, factor), target);
                plan.push((key, KernelVariant::Primary));
                plan.push((key, KernelVariant::Edge));
            }
        }
    }
    plan
}

pub(crate) struct ProgramDesc<'a> {
    pub label: &'a str,
    pub module: &'a wgpu::ShaderModule,
    pub entry_point: &'a str,
    pub target: PixelFormat,
    pub constants: &'a HashMap<String, f64>,
    pub workgroup: WorkgroupSize,
    /// Whether binding 2 carries the per-call radius uniform.
    pub uniform: bool,
}

pub(crate) fn create_module(
    device: &wgpu::Device,
    label: &str,
    template: &str,
    target: PixelFormat,
) -> BlurResult<wgpu::ShaderModule> {
    let source = shaders::specialize(template, target);
    validated(device, label, || {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        })
    })
}

pub(crate) fn create_program(
    device: &wgpu::Device,
    desc: ProgramDesc<'_>,
) -> BlurResult<PipelineObject> {
    let entries = blur_layout_entries(desc.target, desc.uniform);
    let (pipeline, bind_group_layout) = validated(device, desc.label, || {
        let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(desc.label),
            entries: &entries,
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(desc.label),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(desc.label),
            layout: Some(&layout),
            module: desc.module,
            entry_point: Some(desc.entry_point),
            cache: None,
            compilation_options: wgpu::PipelineCompilationOptions {
                constants: desc.constants,
                zero_initialize_workgroup_memory: false,
            },
        });
        (pipeline, bgl)
    })?;
    Ok(PipelineObject {
        label: desc.label.to_string(),
        pipeline,
        bind_group_layout,
        workgroup: desc.workgroup,
    })
}

/// Runs `create` inside a validation error scope so shader and pipeline
/// errors surface as `PipelineCompilation` instead of the uncaptured handler.
fn validated<T>(device: &wgpu::Device, label: &str, create: impl FnOnce() -> T) -> BlurResult<T> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(BlurError::PipelineCompilation {
            label: label.to_string(),
            message: err.to_string(),
        }),
        None => Ok(value),
    }
}

/// Binding 0 sampled source, binding 1 write-only storage target, and
/// optionally binding 2 the radius uniform.
pub(crate) fn blur_layout_entries(
    target: PixelFormat,
    uniform: bool,
) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = vec![
        wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format: target.texture_format(),
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            count: None,
        },
    ];
    if uniform {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 2,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{Axis, Kernel, KernelVariant, PipelineCache, PipelineKey, compile_plan};
    use crate::error::BlurError;
    use crate::pixel_format::PixelFormat;
    use crate::test_support;
    use crate::vectorization::VectorizationFactor;

    #[test]
    fn separable_labels_mark_edge_variant() {
        let kernel = Kernel::Separable(Axis::Horizontal, VectorizationFactor::X4);
        assert_eq!(kernel.label(KernelVariant::Primary), "hbox_blur_x4");
        assert_eq!(kernel.label(KernelVariant::Edge), "hbox_blur_x4_edge");
        let vertical = Kernel::Separable(Axis::Vertical, VectorizationFactor::X32);
        assert_eq!(vertical.label(KernelVariant::Edge), "vbox_blur_x32_edge");
        assert_eq!(
            Kernel::DoublePass(Axis::Vertical).label(KernelVariant::Primary),
            "box_blur_double_pass_v"
        );
    }

    #[test]
    fn plan_leaves_edge_variant_in_every_separable_slot() {
        let plan = compile_plan(&PixelFormat::ALL, &VectorizationFactor::ALL);
        // per target: single + naive pair + 8 factors × 2 axes × 2 variants
        assert_eq!(plan.len(), 3 * (1 + 2 + 32));

        let mut slots: HashMap<PipelineKey, KernelVariant> = HashMap::new();
        for (key, variant) in plan {
            slots.insert(key, variant);
        }
        assert_eq!(slots.len(), 3 * (1 + 2 + 16));
        for (key, variant) in slots {
            if let Kernel::Separable(..) = key.kernel {
                assert_eq!(variant, KernelVariant::Edge, "{key}");
            }
        }
    }

    #[test]
    fn plan_compiles_primary_before_edge() {
        let plan = compile_plan(&[PixelFormat::Rgba8], &[VectorizationFactor::X2]);
        let kernels: Vec<String> = plan.iter().map(|(k, v)| k.kernel.label(*v)).collect();
        assert_eq!(
            kernels,
            [
                "box_blur_single_pass",
                "box_blur_double_pass_h",
                "box_blur_double_pass_v",
                "hbox_blur_x2",
                "hbox_blur_x2_edge",
                "vbox_blur_x2",
                "vbox_blur_x2_edge",
            ]
        );
    }

    #[test]
    fn key_display_names_kernel_and_target() {
        let key = PipelineKey::new(
            Kernel::Separable(Axis::Vertical, VectorizationFactor::X12),
            PixelFormat::Rgba16,
        );
        assert_eq!(key.to_string(), "separable x12 (vertical) writing RGBA16");
    }

    #[test]
    fn full_cache_retains_only_edge_variants() {
        let Some(cache) = test_support::shared_cache() else {
            return;
        };
        assert_eq!(cache.len(), 3 * (1 + 2 + 16));
        assert_eq!(cache.compiled_labels().len(), 3 * (1 + 2 + 32));
        assert!(
            cache
                .compiled_labels()
                .iter()
                .any(|label| label == "hbox_blur_x8/rgba16float")
        );

        for target in PixelFormat::ALL {
            for factor in VectorizationFactor::ALL {
                for axis in Axis::BOTH {
                    let key = PipelineKey::new(Kernel::Separable(axis, factor), target);
                    let object = cache.require(&key).expect("separable slot should exist");
                    assert!(object.label().contains("_edge/"), "{}", object.label());
                    assert_eq!(object.workgroup().y, 1);
                }
            }
        }
    }

    #[test]
    fn subset_build_reports_missing_keys() {
        let Some(ctx) = test_support::gpu() else {
            return;
        };
        let cache = PipelineCache::build_with(
            &ctx.device,
            &[PixelFormat::Rgba8],
            &[VectorizationFactor::X1],
        )
        .expect("subset should compile");
        assert_eq!(cache.len(), 1 + 2 + 2);

        let missing = PipelineKey::new(
            Kernel::Separable(Axis::Horizontal, VectorizationFactor::X8),
            PixelFormat::Rgba8,
        );
        assert!(cache.get(&missing).is_none());
        assert!(matches!(
            cache.require(&missing),
            Err(BlurError::MissingPipeline { .. })
        ));
        let other_target = PipelineKey::new(Kernel::SinglePass, PixelFormat::Rgba32);
        assert!(cache.get(&other_target).is_none());
    }

    #[test]
    fn occupancy_group_is_multiple_of_execution_width() {
        let Some(cache) = test_support::shared_cache() else {
            return;
        };
        let limits = cache.execution_limits();
        let single = cache
            .require(&PipelineKey::new(Kernel::SinglePass, PixelFormat::Rgba8))
            .expect("single pass should exist");
        assert_eq!(single.workgroup().x % limits.execution_width, 0);
        assert!(single.workgroup().total() <= limits.max_threads_per_group);
    }
}
