use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::blurring::domain::image_processor::SlotId;
use crate::shared::bitmap::Bitmap;
use crate::shared::config::EngineConfig;
use crate::shared::error::{ContractError, VlurError};
use crate::shared::handle_arena::{Handle, HandleArena};

use super::gpu_image_processor::GpuImageProcessor;
use super::shared_buffer::SharedOutputHandle;

/// Engines addressed by opaque `u64` handles.
///
/// Zero is never a valid handle. A destroyed handle stays invalid even
/// when its arena slot is reused, so late calls fail with `InvalidHandle`
/// instead of reaching another engine.
#[derive(Default)]
pub struct ProcessorRegistry {
    engines: Mutex<HandleArena<Arc<GpuImageProcessor>>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn arena(&self) -> MutexGuard<'_, HandleArena<Arc<GpuImageProcessor>>> {
        self.engines.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create an engine and return its handle.
    pub fn create(&self, config: &EngineConfig) -> Result<u64, VlurError> {
        let processor = GpuImageProcessor::create(config)?;
        Ok(self.register(processor))
    }

    pub fn register(&self, processor: GpuImageProcessor) -> u64 {
        let handle = self.arena().insert(Arc::new(processor));
        log::debug!("Registered engine {:#x}", handle.into_raw());
        handle.into_raw()
    }

    /// Resolve `raw` to its engine. The arena lock is released before the
    /// caller does any GPU work.
    fn resolve(&self, raw: u64) -> Result<Arc<GpuImageProcessor>, VlurError> {
        Handle::from_raw(raw)
            .and_then(|handle| self.arena().get(handle).cloned())
            .ok_or_else(|| ContractError::InvalidHandle.into())
    }

    pub fn configure(&self, raw: u64, input: &Bitmap, id: SlotId) -> Result<(), VlurError> {
        self.resolve(raw)?.configure_input_and_output(input, id)
    }

    pub fn output_handle(&self, raw: u64, id: SlotId) -> Result<SharedOutputHandle, VlurError> {
        self.resolve(raw)?.output_hardware_buffer(id)
    }

    pub fn blur(&self, raw: u64, radius: f32, id: SlotId) -> Result<(), VlurError> {
        self.resolve(raw)?.blur(radius, id)
    }

    pub fn read_output(&self, raw: u64, id: SlotId) -> Result<Bitmap, VlurError> {
        self.resolve(raw)?.read_output(id)
    }

    /// Destroy the engine behind `raw`. Zero, stale and already destroyed
    /// handles are ignored.
    pub fn destroy(&self, raw: u64) {
        let removed = Handle::from_raw(raw).and_then(|handle| self.arena().remove(handle));
        if let Some(processor) = removed {
            processor.destroy();
            log::debug!("Destroyed engine {raw:#x}");
        }
    }

    pub fn len(&self) -> usize {
        self.arena().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_invalid_handle<T>(result: Result<T, VlurError>) -> bool {
        matches!(
            result,
            Err(VlurError::Contract(ContractError::InvalidHandle))
        )
    }

    #[test]
    fn test_null_handle_is_rejected() {
        let registry = ProcessorRegistry::new();
        assert!(is_invalid_handle(registry.blur(0, 2.0, 0)));
        assert!(is_invalid_handle(registry.output_handle(0, 0)));
        registry.destroy(0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_forged_handle_is_rejected() {
        let registry = ProcessorRegistry::new();
        let bitmap = Bitmap::solid(2, 2, [0; 4]);
        assert!(is_invalid_handle(registry.configure(0x1_0000_0007, &bitmap, 0)));
    }

    #[test]
    fn test_full_lifecycle_through_handles() {
        let registry = ProcessorRegistry::new();
        let engine = match registry.create(&EngineConfig::default()) {
            Ok(h) => h,
            Err(_) => return,
        };
        assert_ne!(engine, 0);

        registry
            .configure(engine, &Bitmap::solid(4, 4, [255, 0, 0, 255]), 0)
            .unwrap();
        let output = registry.output_handle(engine, 0).unwrap();
        registry.blur(engine, 1.0, 0).unwrap();
        registry.blur(engine, 25.0, 0).unwrap();
        assert_eq!(registry.read_output(engine, 0).unwrap().width(), 4);

        registry.destroy(engine);
        registry.destroy(engine);
        assert!(output.is_released());
        assert!(registry.is_empty());
        assert!(is_invalid_handle(registry.blur(engine, 2.0, 0)));
    }

    #[test]
    fn test_stale_handle_does_not_reach_new_engine() {
        let registry = ProcessorRegistry::new();
        let first = match registry.create(&EngineConfig::default()) {
            Ok(h) => h,
            Err(_) => return,
        };
        registry.destroy(first);
        let second = registry.create(&EngineConfig::default()).unwrap();

        assert_ne!(first, second);
        registry
            .configure(second, &Bitmap::solid(2, 2, [1, 2, 3, 255]), 0)
            .unwrap();
        assert!(is_invalid_handle(registry.output_handle(first, 0)));
        assert!(registry.output_handle(second, 0).is_ok());
        assert_eq!(registry.len(), 1);
    }
}
