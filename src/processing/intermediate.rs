use tracing::debug;

use crate::error::{BlurError, BlurResult};
use crate::pixel_format::PixelFormat;

/// Outcome of [`IntermediateTexture::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    Created,
    Reused,
}

struct Allocated {
    #[cfg_attr(not(test), allow(dead_code))]
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

/// Scratch texture shared by the separable strategies. Holds either nothing
/// or a texture matching the last requested dimensions.
pub struct IntermediateTexture {
    format: PixelFormat,
    current: Option<Allocated>,
    generation: u64,
}

impl IntermediateTexture {
    pub fn new(format: PixelFormat) -> Self {
        Self {
            format,
            current: None,
            generation: 0,
        }
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.current.as_ref().map(|a| (a.width, a.height))
    }

    /// Number of textures allocated so far. Unchanged by reuse.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[cfg(test)]
    pub(crate) fn view(&self) -> Option<&wgpu::TextureView> {
        self.current.as_ref().map(|a| &a.view)
    }

    #[cfg(test)]
    pub(crate) fn texture(&self) -> Option<&wgpu::Texture> {
        self.current.as_ref().map(|a| &a.texture)
    }

    /// Make sure a `width × height` texture is held, allocating only when
    /// nothing is held or the dimensions differ.
    pub fn ensure(
        &mut self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> BlurResult<Allocation> {
        self.acquire(device, width, height)
            .map(|(allocation, _)| allocation)
    }

    /// [`IntermediateTexture::ensure`], also handing back the view to bind.
    pub(crate) fn acquire(
        &mut self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> BlurResult<(Allocation, &wgpu::TextureView)> {
        if width == 0 || height == 0 {
            return Err(BlurError::EmptyImage { width, height });
        }
        let limit = device.limits().max_texture_dimension_2d;
        if width > limit || height > limit {
            return Err(BlurError::ImageTooLarge {
                width,
                height,
                limit,
            });
        }

        // The old texture is released before allocating so a failure never
        // leaves a mismatched one behind.
        let (allocation, held) = match self.current.take() {
            Some(held) if !needs_allocation(Some((held.width, held.height)), width, height) => {
                (Allocation::Reused, held)
            }
            previous => {
                let previous = previous.map(|a| (a.width, a.height));
                let fresh = self.allocate(device, width, height)?;
                self.generation += 1;
                debug!(
                    width,
                    height,
                    ?previous,
                    format = %self.format,
                    generation = self.generation,
                    "allocated intermediate texture"
                );
                (Allocation::Created, fresh)
            }
        };
        Ok((allocation, &self.current.insert(held).view))
    }

    fn allocate(&self, device: &wgpu::Device, width: u32, height: u32) -> BlurResult<Allocated> {
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("boxblur_intermediate"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format.texture_format(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::STORAGE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());

        if let Some(err) = out_of_memory.or(validation) {
            return Err(BlurError::ResourceExhausted {
                width,
                height,
                message: err.to_string(),
            });
        }
        Ok(Allocated {
            texture,
            view,
            width,
            height,
        })
    }
}

impl std::fmt::Debug for IntermediateTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntermediateTexture")
            .field("format", &self.format)
            .field("dimensions", &self.dimensions())
            .field("generation", &self.generation)
            .finish()
    }
}

pub(crate) fn needs_allocation(current: Option<(u32, u32)>, width: u32, height: u32) -> bool {
    current != Some((width, height))
}
