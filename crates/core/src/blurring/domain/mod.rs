pub mod blur_radius;
pub mod image_processor;
