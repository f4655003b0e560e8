/// Smallest accepted blur radius, in pixels.
pub const MIN_BLUR_RADIUS: f32 = 1.0;

/// Largest accepted blur radius, in pixels.
pub const MAX_BLUR_RADIUS: f32 = 25.0;

/// Compute workgroup edge length. Must match `@workgroup_size` in the WGSL.
pub const WORKGROUP_SIZE: u32 = 16;

/// Size in bytes of the push-constant block (radius + direction).
pub const PUSH_CONSTANT_SIZE: u32 = 8;

/// Pixel format every GPU image in the engine is stored in.
pub const WORKING_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Asset name of the blur compute shader.
pub const BLUR_SHADER_ASSET: &str = "shaders/gaussian_blur.wgsl";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
