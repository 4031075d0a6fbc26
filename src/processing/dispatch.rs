use std::collections::HashMap;
use std::fmt;

/// Fallback SIMD width when the device does not report subgroup sizes.
pub const DEFAULT_EXECUTION_WIDTH: u32 = 32;

/// Workgroup shape baked into a compute pipeline via WGSL overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupSize {
    pub x: u32,
    pub y: u32,
}

impl WorkgroupSize {
    pub fn total(&self) -> u32 {
        self.x * self.y
    }

    /// Constants for `PipelineCompilationOptions::constants`.
    ///
    /// ```wgsl
    /// override WORKGROUP_X: u32 = 32u;
    /// override WORKGROUP_Y: u32 = 8u;
    ///
    /// @compute @workgroup_size(WORKGROUP_X, WORKGROUP_Y, 1)
    /// ```
    pub fn as_constants(&self) -> HashMap<String, f64> {
        HashMap::from([
            ("WORKGROUP_X".to_string(), self.x as f64),
            ("WORKGROUP_Y".to_string(), self.y as f64),
        ])
    }
}

impl fmt::Display for WorkgroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{} ({} invocations)", self.x, self.y, self.total())
    }
}

/// Device characteristics that decide workgroup shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Native SIMD width; workgroup widths are always a multiple of it.
    pub execution_width: u32,
    pub max_threads_per_group: u32,
}

impl ExecutionLimits {
    pub fn from_limits(limits: &wgpu::Limits) -> Self {
        let max_x = limits.max_compute_workgroup_size_x.max(1);
        let max_invocations = limits.max_compute_invocations_per_workgroup.max(1);
        let reported = limits.max_subgroup_size;
        let execution_width = if reported > 0 {
            reported
        } else {
            DEFAULT_EXECUTION_WIDTH
        }
        .min(max_x)
        .min(max_invocations);

        let max_rows = (max_invocations / execution_width)
            .min(limits.max_compute_workgroup_size_y.max(1))
            .max(1);
        Self {
            execution_width,
            max_threads_per_group: execution_width * max_rows,
        }
    }

    /// Widest group the device allows: one SIMD row wide, as many rows as fit.
    pub fn occupancy_group(&self) -> WorkgroupSize {
        WorkgroupSize {
            x: self.execution_width,
            y: self.max_threads_per_group / self.execution_width,
        }
    }

    /// One SIMD row, for kernels where each thread walks a full row or column.
    pub fn row_group(&self) -> WorkgroupSize {
        WorkgroupSize {
            x: self.execution_width,
            y: 1,
        }
    }
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self::from_limits(&wgpu::Limits::default())
    }
}

/// Threads-per-grid plus group shape for one kernel invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchGeometry {
    pub threads_per_grid: (u32, u32),
    pub group: WorkgroupSize,
}

impl DispatchGeometry {
    /// One thread per pixel.
    pub fn full_image(width: u32, height: u32, group: WorkgroupSize) -> Self {
        Self {
            threads_per_grid: (width, height),
            group,
        }
    }

    /// One thread per row (horizontal sliding window).
    pub fn per_row(_width: u32, height: u32, group: WorkgroupSize) -> Self {
        Self {
            threads_per_grid: (height, 1),
            group,
        }
    }

    /// One thread per column (vertical sliding window).
    pub fn per_column(width: u32, _height: u32, group: WorkgroupSize) -> Self {
        Self {
            threads_per_grid: (width, 1),
            group,
        }
    }

    /// Workgroup counts for `dispatch_workgroups`. Ceiling division, so the
    /// last group may overhang and kernels must guard
    /// `if gid.x >= width || gid.y >= height { return; }`.
    pub fn workgroups(&self) -> (u32, u32, u32) {
        (
            self.threads_per_grid.0.div_ceil(self.group.x),
            self.threads_per_grid.1.div_ceil(self.group.y),
            1,
        )
    }
}
