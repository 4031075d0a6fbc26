pub mod context;
pub mod cpu;
pub mod dispatch;
pub mod engine;
pub mod intermediate;
pub mod pipeline_cache;
pub mod readback;
pub mod reference;
mod shaders;
