//! GPU Gaussian blur engine.
//!
//! One engine owns a device context and a compiled blur pipeline; callers
//! configure numbered slots with a bitmap and blur them into a shared
//! output image that other consumers of the device can sample directly.

pub mod blurring;
pub mod shared;

pub use blurring::domain::image_processor::{ImageProcessor, SlotId};
pub use blurring::infrastructure::gpu_image_processor::GpuImageProcessor;
pub use blurring::infrastructure::processor_factory::create_image_processor;
pub use blurring::infrastructure::processor_registry::ProcessorRegistry;
pub use shared::bitmap::{Bitmap, PixelFormat};
pub use shared::config::EngineConfig;
pub use shared::error::VlurError;
