// Caller-side texture helpers. Unlike the engine, these submit work and
// block on the device.

use std::sync::mpsc;

use image::{Rgba32FImage, RgbaImage};

use crate::error::{BlurError, BlurResult};
use crate::pixel_format::PixelFormat;

/// Upload an RGBA8 image as a sampled source texture.
pub fn upload_rgba8(device: &wgpu::Device, queue: &wgpu::Queue, img: &RgbaImage) -> wgpu::Texture {
    let (width, height) = img.dimensions();
    let extent = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("boxblur_source"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        texture.as_image_copy(),
        img.as_raw(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width.saturating_mul(4)),
            rows_per_image: Some(height),
        },
        extent,
    );
    texture
}

/// Destination texture the blur programs can write and callers can read back.
pub fn create_target(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    format: PixelFormat,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("boxblur_target"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: format.texture_format(),
        usage: wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    })
}

pub fn read_rgba8(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
) -> BlurResult<RgbaImage> {
    expect_format(texture, PixelFormat::Rgba8)?;
    let bytes = read_texture(device, queue, texture, PixelFormat::Rgba8.bytes_per_pixel())?;
    RgbaImage::from_raw(texture.width(), texture.height(), bytes)
        .ok_or_else(|| BlurError::Readback("rgba8 buffer size mismatch".to_string()))
}

pub fn read_rgba32f(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
) -> BlurResult<Rgba32FImage> {
    expect_format(texture, PixelFormat::Rgba32)?;
    let bytes = read_texture(device, queue, texture, PixelFormat::Rgba32.bytes_per_pixel())?;
    let floats: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Rgba32FImage::from_raw(texture.width(), texture.height(), floats)
        .ok_or_else(|| BlurError::Readback("rgba32f buffer size mismatch".to_string()))
}

fn expect_format(texture: &wgpu::Texture, format: PixelFormat) -> BlurResult<()> {
    if texture.format() != format.texture_format() {
        return Err(BlurError::UnsupportedTextureFormat(texture.format()));
    }
    if !texture.usage().contains(wgpu::TextureUsages::COPY_SRC) {
        return Err(BlurError::MissingUsage {
            role: "readback",
            usage: wgpu::TextureUsages::COPY_SRC,
        });
    }
    Ok(())
}

/// Copies `texture` into a mappable buffer and strips the row padding.
fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    bytes_per_pixel: u32,
) -> BlurResult<Vec<u8>> {
    let (width, height) = (texture.width(), texture.height());
    let unpadded_bytes_per_row = width.saturating_mul(bytes_per_pixel);
    let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
        * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let readback = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("boxblur_readback"),
        size: padded_bytes_per_row as u64 * height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("boxblur_readback"),
    });
    encoder.copy_texture_to_buffer(
        texture.as_image_copy(),
        wgpu::TexelCopyBufferInfo {
            buffer: &readback,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit([encoder.finish()]);

    let slice = readback.slice(..);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = device.poll(wgpu::Maintain::wait());
    rx.recv()
        .map_err(|err| BlurError::Readback(err.to_string()))?
        .map_err(|err| BlurError::Readback(err.to_string()))?;

    let mapped = slice.get_mapped_range();
    let unpadded = unpadded_bytes_per_row as usize;
    let padded = padded_bytes_per_row as usize;
    let mut out = vec![0_u8; unpadded * height as usize];
    for row in 0..height as usize {
        out[row * unpadded..(row + 1) * unpadded]
            .copy_from_slice(&mapped[row * padded..row * padded + unpadded]);
    }
    drop(mapped);
    readback.unmap();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{create_target, read_rgba8, read_rgba32f, upload_rgba8};
    use crate::error::BlurError;
    use crate::pixel_format::PixelFormat;
    use crate::test_support::{self, gradient};

    #[test]
    fn rgba8_round_trips_through_unaligned_rows() {
        let Some(ctx) = test_support::gpu() else {
            return;
        };
        // 13 * 4 bytes is far from the 256-byte copy alignment
        let img = gradient(13, 7);
        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: None,
            size: wgpu::Extent3d {
                width: 13,
                height: 7,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        ctx.queue.write_texture(
            texture.as_image_copy(),
            img.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(13 * 4),
                rows_per_image: Some(7),
            },
            texture.size(),
        );
        let back = read_rgba8(&ctx.device, &ctx.queue, &texture).expect("readback");
        assert_eq!(back, img);
    }

    #[test]
    fn uploaded_sources_are_not_readable() {
        let Some(ctx) = test_support::gpu() else {
            return;
        };
        let source = upload_rgba8(&ctx.device, &ctx.queue, &gradient(4, 4));
        assert!(matches!(
            read_rgba8(&ctx.device, &ctx.queue, &source),
            Err(BlurError::MissingUsage { .. })
        ));
    }

    #[test]
    fn format_must_match_reader() {
        let Some(ctx) = test_support::gpu() else {
            return;
        };
        let target = create_target(&ctx.device, 4, 4, PixelFormat::Rgba16);
        assert!(matches!(
            read_rgba8(&ctx.device, &ctx.queue, &target),
            Err(BlurError::UnsupportedTextureFormat(_))
        ));
        assert!(matches!(
            read_rgba32f(&ctx.device, &ctx.queue, &target),
            Err(BlurError::UnsupportedTextureFormat(_))
        ));
    }
}
