use crate::blurring::domain::blur_radius::BlurRadius;
use crate::blurring::infrastructure::blur_pipeline::{BlurDirection, BlurPipeline, BlurPushConstants};
use crate::blurring::infrastructure::gpu_context::GpuContext;
use crate::blurring::infrastructure::gpu_image::extent;
use crate::blurring::infrastructure::resource_slot::ResourceSlot;
use crate::shared::constants::WORKGROUP_SIZE;
use crate::shared::error::ExecutionError;

/// Records and runs the two blur passes for one slot.
///
/// Both passes and the copy into the shared output go into a single
/// submission; the call returns once the GPU has finished it.
pub fn execute_blur(
    ctx: &GpuContext,
    pipeline: &BlurPipeline,
    slot: &ResourceSlot,
    radius: BlurRadius,
) -> Result<(), ExecutionError> {
    ctx.ensure_alive()?;

    let (width, height) = (slot.width(), slot.height());
    let workgroups_x = width.div_ceil(WORKGROUP_SIZE);
    let workgroups_y = height.div_ceil(WORKGROUP_SIZE);

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("blur"),
        });

    for (direction, bind_group, label) in [
        (BlurDirection::Horizontal, &slot.horizontal, "horizontal"),
        (BlurDirection::Vertical, &slot.vertical, "vertical"),
    ] {
        let params = BlurPushConstants::new(radius.value(), direction);
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        pass.set_pipeline(&pipeline.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.set_push_constants(0, bytemuck::bytes_of(&params));
        pass.dispatch_workgroups(workgroups_x, workgroups_y, 1);
    }

    encoder.copy_texture_to_texture(
        slot.blurred.texture.as_image_copy(),
        slot.output.texture().as_image_copy(),
        extent(width, height),
    );

    ctx.submit_and_wait(encoder)
}
