use crate::blurring::infrastructure::gpu_context::GpuContext;
use crate::blurring::infrastructure::shader_assets::ShaderAssets;
use crate::shared::constants::{BLUR_SHADER_ASSET, PUSH_CONSTANT_SIZE, WORKING_FORMAT};
use crate::shared::error::InitError;

/// Blur pass direction, matching `direction` in the shader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlurDirection {
    Horizontal = 0,
    Vertical = 1,
}

/// Push-constant block matching the WGSL `BlurParams` layout (8 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BlurPushConstants {
    pub radius: f32,
    pub direction: u32,
}

impl BlurPushConstants {
    pub fn new(radius: f32, direction: BlurDirection) -> Self {
        Self {
            radius,
            direction: direction as u32,
        }
    }
}

/// Compiled blur shader and the pipeline built from it.
///
/// Created once per engine; the radius travels as a push constant so the
/// pipeline is reused for every slot and every radius.
pub struct BlurPipeline {
    pub pipeline: wgpu::ComputePipeline,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl BlurPipeline {
    pub fn new(ctx: &GpuContext, assets: &dyn ShaderAssets) -> Result<Self, InitError> {
        let source = assets.load(BLUR_SHADER_ASSET)?;

        let (pipeline, fault) = ctx.scoped(|device| {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("gaussian-blur-shader"),
                source: wgpu::ShaderSource::Wgsl(source),
            });

            let bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("blur-bind-group-layout"),
                    entries: &[
                        // source image (sampled)
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
                        // destination image (storage, write-only)
                        wgpu::BindGroupLayoutEntry {
                            binding: 1,
                            visibility: wgpu::ShaderStages::COMPUTE,
                            ty: wgpu::BindingType::StorageTexture {
                                access: wgpu::StorageTextureAccess::WriteOnly,
                                format: WORKING_FORMAT,
                                view_dimension: wgpu::TextureViewDimension::D2,
                            },
                            count: None,
                        },
                    ],
                });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("blur-pipeline-layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[wgpu::PushConstantRange {
                    stages: wgpu::ShaderStages::COMPUTE,
                    range: 0..PUSH_CONSTANT_SIZE,
                }],
            });

            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("blur-pipeline"),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            });

            Self {
                pipeline,
                bind_group_layout,
            }
        });

        match fault {
            None => Ok(pipeline),
            Some(fault) => Err(InitError::ShaderCompilation(format!("{fault:?}"))),
        }
    }
}
