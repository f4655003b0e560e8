use crate::blurring::infrastructure::gpu_context::GpuContext;
use crate::shared::constants::WORKING_FORMAT;
use crate::shared::error::{ExecutionError, ResourceError};

const BYTES_PER_PIXEL: u32 = 4;

/// A 2D RGBA8 texture with its default view.
pub struct GpuImage {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl GpuImage {
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&texture_descriptor(label, width, height, usage));
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    pub fn height(&self) -> u32 {
        self.texture.height()
    }
}

pub fn texture_descriptor(
    label: &str,
    width: u32,
    height: u32,
    usage: wgpu::TextureUsages,
) -> wgpu::TextureDescriptor<'_> {
    wgpu::TextureDescriptor {
        label: Some(label),
        size: extent(width, height),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: WORKING_FORMAT,
        usage,
        view_formats: &[],
    }
}

pub fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

/// Row pitch for texture-to-buffer copies, rounded up to wgpu's alignment.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * BYTES_PER_PIXEL;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Size of the staging buffer `read_rgba` needs for a `width` x `height` image.
pub fn readback_size(width: u32, height: u32) -> u64 {
    u64::from(padded_bytes_per_row(width)) * u64::from(height)
}

/// Rejects images whose readback would not fit in one device buffer.
pub fn check_readback_size(width: u32, height: u32, max: u64) -> Result<(), ResourceError> {
    let bytes = readback_size(width, height);
    if bytes > max {
        return Err(ResourceError::ReadbackTooLarge { bytes, max });
    }
    Ok(())
}

/// Write tightly packed RGBA8 pixels into `texture` through the queue.
pub fn upload_rgba(queue: &wgpu::Queue, texture: &wgpu::Texture, rgba: &[u8]) {
    let (width, height) = (texture.width(), texture.height());
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        rgba,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * BYTES_PER_PIXEL),
            rows_per_image: Some(height),
        },
        extent(width, height),
    );
}

/// Copy `texture` back to the CPU as tightly packed RGBA8.
///
/// Blocks until the copy has completed and the staging buffer is mapped.
pub fn read_rgba(ctx: &GpuContext, texture: &wgpu::Texture) -> Result<Vec<u8>, ExecutionError> {
    let (width, height) = (texture.width(), texture.height());
    let padded_row = padded_bytes_per_row(width);
    let staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback-staging"),
        size: readback_size(width, height),
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback"),
        });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_row),
                rows_per_image: Some(height),
            },
        },
        extent(width, height),
    );
    ctx.submit_and_wait(encoder)?;

    let slice = staging.slice(..);
    let (tx, rx) = crossbeam_channel::bounded(1);
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    ctx.flush();
    ctx.ensure_alive()?;

    rx.recv()
        .map_err(|_| ExecutionError::Readback("map callback never ran".into()))?
        .map_err(|e| ExecutionError::Readback(e.to_string()))?;

    let row_bytes = (width * BYTES_PER_PIXEL) as usize;
    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    {
        let mapped = slice.get_mapped_range();
        for row in mapped.chunks(padded_row as usize).take(height as usize) {
            pixels.extend_from_slice(&row[..row_bytes]);
        }
    }
    staging.unmap();
    Ok(pixels)
}
