use std::sync::Arc;

use crate::blurring::infrastructure::blur_pipeline::BlurPipeline;
use crate::blurring::infrastructure::gpu_context::{GpuContext, GpuFault};
use crate::blurring::infrastructure::gpu_image::{
    check_readback_size, extent, upload_rgba, GpuImage,
};
use crate::blurring::infrastructure::shared_buffer::{
    release_shared, SharedBufferAllocator, SharedBufferDesc, SharedOutputHandle,
};
use crate::shared::bitmap::Bitmap;
use crate::shared::error::{ResourceError, VlurError};

/// GPU resources of one configured slot.
///
/// `input` holds the uploaded bitmap and is never written again. The
/// horizontal pass writes `intermediate`, the vertical pass writes
/// `blurred`, which is then copied into the shared `output`. Until the
/// first blur the output holds a copy of the input.
pub struct ResourceSlot {
    pub input: GpuImage,
    pub intermediate: GpuImage,
    pub blurred: GpuImage,
    pub output: SharedOutputHandle,
    pub horizontal: wgpu::BindGroup,
    pub vertical: wgpu::BindGroup,
    allocator: Arc<dyn SharedBufferAllocator>,
}

impl ResourceSlot {
    /// Upload `bitmap` and allocate every image the blur needs.
    ///
    /// Nothing outlives a failed call: partially built resources are
    /// dropped and the shared output, if any, is released.
    pub fn create(
        ctx: &GpuContext,
        pipeline: &BlurPipeline,
        allocator: Arc<dyn SharedBufferAllocator>,
        bitmap: &Bitmap,
    ) -> Result<Self, VlurError> {
        let rgba = bitmap.to_rgba()?;
        let (width, height) = (bitmap.width(), bitmap.height());
        let max = ctx.max_texture_dimension();
        if width > max || height > max {
            return Err(ResourceError::UnsupportedSize { width, height, max }.into());
        }
        check_readback_size(width, height, ctx.max_buffer_size())?;
        ctx.ensure_alive()?;

        let (slot, fault) = ctx.scoped(|device| {
            let output = allocator.allocate(device, &SharedBufferDesc { width, height })?;
            if (output.width(), output.height()) != (width, height) {
                release_shared(allocator.as_ref(), &output);
                return Err(ResourceError::Export(format!(
                    "allocator returned {}x{} for a {width}x{height} request",
                    output.width(),
                    output.height()
                )));
            }
            let slot = Self::build(device, pipeline, Arc::clone(&allocator), output, width, height);
            upload_rgba(&ctx.queue, &slot.input.texture, &rgba);

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("seed-output"),
            });
            encoder.copy_texture_to_texture(
                slot.input.texture.as_image_copy(),
                slot.output.texture().as_image_copy(),
                extent(width, height),
            );
            ctx.queue.submit(std::iter::once(encoder.finish()));
            Ok(slot)
        });

        match (slot, fault) {
            (Ok(slot), None) => {
                log::debug!(
                    "Created resource slot {width}x{height} (output buffer {})",
                    slot.output.id()
                );
                Ok(slot)
            }
            (Err(e), _) => Err(e.into()),
            // Dropping the slot releases its shared output.
            (Ok(_slot), Some(GpuFault::OutOfMemory(detail))) => Err(ResourceError::OutOfMemory {
                what: "resource slot",
                detail,
            }
            .into()),
            (Ok(_slot), Some(GpuFault::Validation(detail))) => {
                Err(ResourceError::UnsupportedFormat(detail).into())
            }
        }
    }

    fn build(
        device: &wgpu::Device,
        pipeline: &BlurPipeline,
        allocator: Arc<dyn SharedBufferAllocator>,
        output: SharedOutputHandle,
        width: u32,
        height: u32,
    ) -> Self {
        let input = GpuImage::new(
            device,
            "slot-input",
            width,
            height,
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
        );
        let intermediate = GpuImage::new(
            device,
            "slot-intermediate",
            width,
            height,
            wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let blurred = GpuImage::new(
            device,
            "slot-blurred",
            width,
            height,
            wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::COPY_SRC,
        );

        let horizontal = bind_pair(device, pipeline, "bg-horizontal", &input, &intermediate);
        let vertical = bind_pair(device, pipeline, "bg-vertical", &intermediate, &blurred);

        Self {
            input,
            intermediate,
            blurred,
            output,
            horizontal,
            vertical,
            allocator,
        }
    }

    pub fn width(&self) -> u32 {
        self.input.width()
    }

    pub fn height(&self) -> u32 {
        self.input.height()
    }
}

impl Drop for ResourceSlot {
    fn drop(&mut self) {
        log::debug!("Releasing output buffer {}", self.output.id());
        release_shared(self.allocator.as_ref(), &self.output);
    }
}

fn bind_pair(
    device: &wgpu::Device,
    pipeline: &BlurPipeline,
    label: &str,
    src: &GpuImage,
    dst: &GpuImage,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout: &pipeline.bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&src.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&dst.view),
            },
        ],
    })
}
