use crate::blurring::domain::image_processor::ImageProcessor;
use crate::shared::config::EngineConfig;

use super::cpu_image_processor::CpuImageProcessor;
use super::gpu_image_processor::GpuImageProcessor;

/// Creates the best available image processor, preferring the GPU.
///
/// Falls back to the CPU implementation when `force_cpu` is set or the
/// GPU engine cannot be created. Logs which backend is selected.
pub fn create_image_processor(config: &EngineConfig, force_cpu: bool) -> Box<dyn ImageProcessor> {
    if force_cpu {
        log::info!("Using CPU backend (requested)");
        return Box::new(CpuImageProcessor::new());
    }
    match GpuImageProcessor::create(config) {
        Ok(processor) => {
            log::info!("Using GPU backend");
            Box::new(processor)
        }
        Err(e) => {
            log::info!("GPU backend unavailable ({e}), using CPU backend");
            Box::new(CpuImageProcessor::new())
        }
    }
}
