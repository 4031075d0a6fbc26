use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{BlurError, BlurResult};

pub const ALLOW_SOFTWARE_ADAPTER_ENV: &str = "BOXBLUR_ALLOW_SOFTWARE_ADAPTER";

#[derive(Clone, Debug, Default)]
/// Snapshot of the adapter a [`GpuContext`] was created on.
pub struct RuntimeStatus {
    pub adapter_vendor_id: Option<u32>,
    pub adapter_name: Option<String>,
    pub adapter_backend: Option<String>,
    pub adapter_driver: Option<String>,
    pub device_type: Option<wgpu::DeviceType>,
}

/// Device and queue for callers that do not bring their own.
///
/// The blur engine only needs the device; the queue is for uploads, submits
/// and readback on the caller's side.
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    status: RuntimeStatus,
}

impl GpuContext {
    /// Pick a high-performance adapter and open a device with default limits.
    ///
    /// Software (CPU) adapters are refused unless
    /// `BOXBLUR_ALLOW_SOFTWARE_ADAPTER` is truthy.
    pub fn new() -> BlurResult<Self> {
        Self::with_software_policy(allow_software_adapter())
    }

    pub fn with_software_policy(allow_software: bool) -> BlurResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: None,
        }))
        .ok_or(BlurError::NoAdapter)?;

        let adapter_info = adapter.get_info();
        if adapter_info.device_type == wgpu::DeviceType::Cpu && !allow_software {
            warn!(
                adapter = %adapter_info.name,
                "software adapter rejected; set {}=1 to allow it",
                ALLOW_SOFTWARE_ADAPTER_ENV
            );
            return Err(BlurError::NoAdapter);
        }

        let adapter_driver = if adapter_info.driver.trim().is_empty() {
            "unknown".to_string()
        } else {
            adapter_info.driver.clone()
        };
        let status = RuntimeStatus {
            adapter_vendor_id: Some(adapter_info.vendor),
            adapter_name: Some(adapter_info.name.clone()),
            adapter_backend: Some(adapter_info.backend.to_string()),
            adapter_driver: Some(adapter_driver),
            device_type: Some(adapter_info.device_type),
        };

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("boxblur_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))?;

        info!(
            adapter = %adapter_info.name,
            backend = %adapter_info.backend,
            device_type = ?adapter_info.device_type,
            "gpu context ready"
        );
        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            status,
        })
    }

    pub fn runtime_status(&self) -> &RuntimeStatus {
        &self.status
    }

    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }
}

pub fn allow_software_adapter() -> bool {
    std::env::var(ALLOW_SOFTWARE_ADAPTER_ENV)
        .ok()
        .map(|raw| env_truthy(&raw))
        .unwrap_or(false)
}

fn env_truthy(raw: &str) -> bool {
    let norm = raw.trim().to_ascii_lowercase();
    norm == "1" || norm == "true" || norm == "yes" || norm == "on"
}

#[cfg(test)]
mod tests {
    use super::env_truthy;
    use crate::test_support;

    #[test]
    fn env_truthy_parser_matches_expected_values() {
        assert!(env_truthy("1"));
        assert!(env_truthy(" true "));
        assert!(env_truthy("YES"));
        assert!(env_truthy("on"));
        assert!(!env_truthy("0"));
        assert!(!env_truthy("false"));
        assert!(!env_truthy("no"));
        assert!(!env_truthy(""));
    }

    #[test]
    fn status_describes_adapter() {
        let Some(ctx) = test_support::gpu() else {
            return;
        };
        let status = ctx.runtime_status();
        assert!(status.adapter_name.is_some());
        assert!(status.adapter_backend.is_some());
        assert!(ctx.max_texture_dimension() >= 2048);
    }
}
