pub mod blur_pass;
pub mod blur_pipeline;
pub mod cpu_image_processor;
mod gaussian;
pub mod gpu_context;
pub mod gpu_image;
pub mod gpu_image_processor;
pub mod processor_factory;
pub mod processor_registry;
pub mod resource_slot;
pub mod shader_assets;
pub mod shared_buffer;
