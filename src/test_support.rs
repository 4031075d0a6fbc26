use std::sync::{Arc, OnceLock};

use image::{Rgba, RgbaImage};

pub use crate::processing::context::GpuContext;
use crate::processing::pipeline_cache::PipelineCache;

static GPU: OnceLock<Option<GpuContext>> = OnceLock::new();
static CACHE: OnceLock<Option<Arc<PipelineCache>>> = OnceLock::new();

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Shared device for GPU tests; `None` when no usable adapter exists.
pub fn gpu() -> Option<&'static GpuContext> {
    GPU.get_or_init(|| {
        init_tracing();
        GpuContext::new().ok()
    })
    .as_ref()
}

/// Full pipeline cache built once on the shared device.
pub fn shared_cache() -> Option<Arc<PipelineCache>> {
    CACHE
        .get_or_init(|| {
            let ctx = gpu()?;
            let cache = PipelineCache::build(&ctx.device).expect("pipeline cache should build");
            Some(Arc::new(cache))
        })
        .clone()
}

/// Deterministic pattern with detail in every channel.
pub fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            ((x * 7 + y * 3) % 256) as u8,
            ((x * 11 + y * 5) % 256) as u8,
            ((x * 13 + y * 17) % 256) as u8,
            (255 - (x + y) % 64) as u8,
        ])
    })
}

pub fn assert_rgba_close(expected: &RgbaImage, actual: &RgbaImage, tolerance: u8) {
    assert_eq!(expected.dimensions(), actual.dimensions());
    for (x, y, e) in expected.enumerate_pixels() {
        let a = actual.get_pixel(x, y);
        for i in 0..4 {
            let d = e[i].abs_diff(a[i]);
            assert!(
                d <= tolerance,
                "channel {} at ({}, {}) differed by {} (expected={}, actual={}, tol={})",
                i,
                x,
                y,
                d,
                e[i],
                a[i],
                tolerance
            );
        }
    }
}
