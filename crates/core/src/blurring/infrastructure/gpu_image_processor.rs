use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::blurring::domain::blur_radius::BlurRadius;
use crate::blurring::domain::image_processor::{ImageProcessor, SlotId};
use crate::shared::bitmap::{Bitmap, PixelFormat};
use crate::shared::config::EngineConfig;
use crate::shared::error::{ContractError, InitError, VlurError};

use super::blur_pass::execute_blur;
use super::blur_pipeline::BlurPipeline;
use super::gpu_context::GpuContext;
use super::gpu_image::read_rgba;
use super::resource_slot::ResourceSlot;
use super::shared_buffer::{DeviceSharedAllocator, SharedBufferAllocator, SharedOutputHandle};

/// Live engine state. Fields drop in declaration order: every slot goes
/// before the pipeline, and both go before the device context.
struct Ready {
    slots: HashMap<SlotId, ResourceSlot>,
    pipeline: BlurPipeline,
    ctx: GpuContext,
}

enum ProcessorState {
    Ready(Box<Ready>),
    Destroyed,
}

/// GPU blur engine.
///
/// Owns one device context and one compiled blur pipeline shared by any
/// number of slots. Every call takes the engine lock for its whole
/// duration, so GPU work from different threads is serialized on the
/// single queue.
pub struct GpuImageProcessor {
    state: Mutex<ProcessorState>,
    allocator: Arc<dyn SharedBufferAllocator>,
}

impl GpuImageProcessor {
    pub fn create(config: &EngineConfig) -> Result<Self, InitError> {
        Self::with_allocator(config, Arc::new(DeviceSharedAllocator))
    }

    /// Engine whose shared outputs come from `allocator`.
    pub fn with_allocator(
        config: &EngineConfig,
        allocator: Arc<dyn SharedBufferAllocator>,
    ) -> Result<Self, InitError> {
        let ctx = GpuContext::new(config)?;
        let assets = config.shader_assets();
        let pipeline = BlurPipeline::new(&ctx, assets.as_ref())?;
        log::info!(
            "GPU image processor ready on {}{}",
            ctx.adapter_info().name,
            if config.debug { " (debug)" } else { "" }
        );

        Ok(Self {
            state: Mutex::new(ProcessorState::Ready(Box::new(Ready {
                slots: HashMap::new(),
                pipeline,
                ctx,
            }))),
            allocator,
        })
    }

    fn lock(&self) -> MutexGuard<'_, ProcessorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` on the live state, failing if destroyed or if the device
    /// is gone. A lost device drops every slot.
    fn with_ready<T>(
        &self,
        f: impl FnOnce(&mut Ready) -> Result<T, VlurError>,
    ) -> Result<T, VlurError> {
        let mut state = self.lock();
        let ready = match &mut *state {
            ProcessorState::Ready(ready) => ready,
            ProcessorState::Destroyed => return Err(ContractError::Destroyed.into()),
        };
        if let Err(e) = ready.ctx.ensure_alive() {
            if !ready.slots.is_empty() {
                log::warn!("Releasing {} slots after device loss", ready.slots.len());
                ready.slots.clear();
            }
            return Err(e.into());
        }
        f(ready)
    }

    /// Upload `input` for slot `id`, replacing any previous slot with that id.
    pub fn configure_input_and_output(&self, input: &Bitmap, id: SlotId) -> Result<(), VlurError> {
        self.with_ready(|ready| {
            let slot = ResourceSlot::create(
                &ready.ctx,
                &ready.pipeline,
                Arc::clone(&self.allocator),
                input,
            )?;
            log::debug!(
                "Configured slot {id} ({}x{}, output buffer {})",
                slot.width(),
                slot.height(),
                slot.output.id()
            );
            if ready.slots.insert(id, slot).is_some() {
                log::debug!("Released previous resources of slot {id}");
            }
            Ok(())
        })
    }

    /// Shared handle of the slot's output image. Identity is stable across
    /// blurs until the slot is reconfigured or the engine destroyed.
    pub fn output_hardware_buffer(&self, id: SlotId) -> Result<SharedOutputHandle, VlurError> {
        self.with_ready(|ready| {
            ready
                .slots
                .get(&id)
                .map(|slot| slot.output.clone())
                .ok_or_else(|| ContractError::NotConfigured(id).into())
        })
    }

    /// Blur slot `id` with `radius` and wait for the GPU to finish.
    pub fn blur(&self, radius: f32, id: SlotId) -> Result<(), VlurError> {
        self.with_ready(|ready| {
            let radius = BlurRadius::new(radius)?;
            let slot = ready
                .slots
                .get(&id)
                .ok_or(ContractError::NotConfigured(id))?;
            execute_blur(&ready.ctx, &ready.pipeline, slot, radius)?;
            Ok(())
        })
    }

    /// Copy the slot's output image back to an RGBA bitmap.
    pub fn read_output(&self, id: SlotId) -> Result<Bitmap, VlurError> {
        self.with_ready(|ready| {
            let slot = ready
                .slots
                .get(&id)
                .ok_or(ContractError::NotConfigured(id))?;
            let pixels = read_rgba(&ready.ctx, slot.output.texture())?;
            Ok(Bitmap::new(
                pixels,
                slot.width(),
                slot.height(),
                PixelFormat::Rgba8888,
            ))
        })
    }

    /// Release every slot, then the pipeline and the device. Idempotent.
    pub fn destroy(&self) {
        let mut state = self.lock();
        if let ProcessorState::Ready(ready) =
            std::mem::replace(&mut *state, ProcessorState::Destroyed)
        {
            ready.ctx.flush();
            log::info!(
                "Destroying GPU image processor ({} slots)",
                ready.slots.len()
            );
            drop(ready);
        }
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(*self.lock(), ProcessorState::Destroyed)
    }

    pub fn slot_count(&self) -> usize {
        match &*self.lock() {
            ProcessorState::Ready(ready) => ready.slots.len(),
            ProcessorState::Destroyed => 0,
        }
    }
}

impl ImageProcessor for GpuImageProcessor {
    fn configure_input_and_output(&self, input: &Bitmap, id: SlotId) -> Result<(), VlurError> {
        GpuImageProcessor::configure_input_and_output(self, input, id)
    }

    fn blur(&self, radius: f32, id: SlotId) -> Result<(), VlurError> {
        GpuImageProcessor::blur(self, radius, id)
    }

    fn read_output(&self, id: SlotId) -> Result<Bitmap, VlurError> {
        GpuImageProcessor::read_output(self, id)
    }

    fn cleanup(&self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blurring::infrastructure::gaussian::neighborhood_variance;
    use crate::blurring::infrastructure::shared_buffer::testing::CountingAllocator;
    use crate::shared::error::{ErrorCategory, ResourceError};
    use rstest::rstest;
    use std::sync::atomic::Ordering;
    use std::thread;

    fn try_processor() -> Option<GpuImageProcessor> {
        GpuImageProcessor::create(&EngineConfig::default()).ok()
    }

    fn gradient(width: u32, height: u32) -> Bitmap {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x * 255 / width) as u8, (y * 255 / height) as u8, 40, 255]);
            }
        }
        Bitmap::new(data, width, height, PixelFormat::Rgba8888)
    }

    #[test]
    fn test_solid_red_at_both_radius_bounds() {
        let processor = match try_processor() {
            Some(p) => p,
            None => return,
        };
        processor
            .configure_input_and_output(&Bitmap::solid(4, 4, [255, 0, 0, 255]), 0)
            .unwrap();

        processor.blur(1.0, 0).unwrap();
        let small = processor.read_output(0).unwrap();
        processor.blur(25.0, 0).unwrap();
        let large = processor.read_output(0).unwrap();

        assert_eq!((large.width(), large.height()), (4, 4));
        let v_small = neighborhood_variance(small.data(), 4, 4, 1, 1);
        let v_large = neighborhood_variance(large.data(), 4, 4, 1, 1);
        assert!(v_large <= v_small);
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(large.pixel(x, y), [255, 0, 0, 255]);
            }
        }
    }

    #[test]
    fn test_blur_unconfigured_slot_fails() {
        let processor = match try_processor() {
            Some(p) => p,
            None => return,
        };
        let error = processor.blur(5.0, 42).unwrap_err();
        assert!(matches!(
            error,
            VlurError::Contract(ContractError::NotConfigured(42))
        ));
        assert_eq!(error.category(), ErrorCategory::Contract);
    }

    #[test]
    fn test_output_handle_requires_configure() {
        let processor = match try_processor() {
            Some(p) => p,
            None => return,
        };
        assert!(matches!(
            processor.output_hardware_buffer(3),
            Err(VlurError::Contract(ContractError::NotConfigured(3)))
        ));
        processor
            .configure_input_and_output(&gradient(9, 7), 3)
            .unwrap();
        let handle = processor.output_hardware_buffer(3).unwrap();
        assert_eq!((handle.width(), handle.height()), (9, 7));
        assert!(!handle.is_released());
    }

    #[rstest]
    #[case(0.5)]
    #[case(25.5)]
    #[case(f32::NAN)]
    fn test_radius_out_of_range_is_rejected(#[case] radius: f32) {
        let processor = match try_processor() {
            Some(p) => p,
            None => return,
        };
        processor
            .configure_input_and_output(&gradient(4, 4), 0)
            .unwrap();
        assert!(matches!(
            processor.blur(radius, 0),
            Err(VlurError::Contract(ContractError::RadiusOutOfRange(_)))
        ));
    }

    #[test]
    fn test_output_before_first_blur_is_input() {
        let processor = match try_processor() {
            Some(p) => p,
            None => return,
        };
        let input = gradient(13, 5);
        processor.configure_input_and_output(&input, 4).unwrap();
        assert_eq!(processor.read_output(4).unwrap(), input);
    }

    #[test]
    fn test_device_loss_invalidates_every_slot() {
        let processor = match try_processor() {
            Some(p) => p,
            None => return,
        };
        processor
            .configure_input_and_output(&gradient(8, 8), 0)
            .unwrap();
        processor
            .configure_input_and_output(&gradient(4, 6), 1)
            .unwrap();
        let outputs = [
            processor.output_hardware_buffer(0).unwrap(),
            processor.output_hardware_buffer(1).unwrap(),
        ];

        if let ProcessorState::Ready(ready) = &*processor.lock() {
            ready.ctx.device.destroy();
            // the lost callback runs from the next maintain
            ready.ctx.flush();
        }

        for id in [0, 1] {
            let error = processor.blur(2.0, id).unwrap_err();
            assert!(error.is_device_lost(), "{error}");
            assert_eq!(error.category(), ErrorCategory::Execution);
        }
        assert_eq!(processor.slot_count(), 0);
        assert!(outputs.iter().all(SharedOutputHandle::is_released));
        assert!(processor
            .configure_input_and_output(&gradient(2, 2), 0)
            .unwrap_err()
            .is_device_lost());

        processor.destroy();
        assert!(processor.is_destroyed());
    }

    #[test]
    fn test_output_identity_is_stable_across_blurs() {
        let processor = match try_processor() {
            Some(p) => p,
            None => return,
        };
        processor
            .configure_input_and_output(&gradient(16, 16), 1)
            .unwrap();
        let before = processor.output_hardware_buffer(1).unwrap();
        processor.blur(3.0, 1).unwrap();
        processor.blur(12.0, 1).unwrap();
        assert_eq!(processor.output_hardware_buffer(1).unwrap(), before);
    }

    #[test]
    fn test_repeated_blur_overwrites_output() {
        let processor = match try_processor() {
            Some(p) => p,
            None => return,
        };
        processor
            .configure_input_and_output(&gradient(20, 12), 0)
            .unwrap();
        processor.blur(2.0, 0).unwrap();
        let first = processor.read_output(0).unwrap();

        processor.blur(25.0, 0).unwrap();
        processor.blur(2.0, 0).unwrap();
        assert_eq!(processor.read_output(0).unwrap(), first);
    }

    #[test]
    fn test_two_slots_are_isolated() {
        let processor = match try_processor() {
            Some(p) => p,
            None => return,
        };
        processor
            .configure_input_and_output(&gradient(12, 12), 0)
            .unwrap();
        processor
            .configure_input_and_output(&Bitmap::solid(6, 3, [0, 0, 255, 255]), 1)
            .unwrap();
        processor.blur(4.0, 0).unwrap();
        let slot0 = processor.read_output(0).unwrap();

        processor.blur(25.0, 1).unwrap();
        assert_eq!(processor.read_output(0).unwrap(), slot0);
        assert_eq!(processor.read_output(1).unwrap().width(), 6);
        assert_eq!(processor.slot_count(), 2);
    }

    #[test]
    fn test_reconfigure_releases_previous_output() {
        let allocator = Arc::new(CountingAllocator::default());
        let processor =
            match GpuImageProcessor::with_allocator(&EngineConfig::default(), allocator.clone()) {
                Ok(p) => p,
                Err(_) => return,
            };

        let mut previous: Option<SharedOutputHandle> = None;
        for size in 1..=10 {
            processor
                .configure_input_and_output(&gradient(size * 3, size * 2), 5)
                .unwrap();
            processor.blur(2.0, 5).unwrap();
            if let Some(old) = previous.take() {
                assert!(old.is_released());
            }
            previous = Some(processor.output_hardware_buffer(5).unwrap());
            assert_eq!(allocator.live(), 1);
        }
        assert_eq!(allocator.allocated.load(Ordering::SeqCst), 10);

        processor.destroy();
        assert_eq!(allocator.live(), 0);
        assert!(previous.unwrap().is_released());
    }

    #[test]
    fn test_failed_configure_keeps_prior_slot() {
        let allocator = Arc::new(CountingAllocator::default());
        let processor =
            match GpuImageProcessor::with_allocator(&EngineConfig::default(), allocator.clone()) {
                Ok(p) => p,
                Err(_) => return,
            };
        processor
            .configure_input_and_output(&gradient(8, 8), 0)
            .unwrap();
        let handle = processor.output_hardware_buffer(0).unwrap();

        allocator.fail.store(true, Ordering::SeqCst);
        let error = processor
            .configure_input_and_output(&gradient(16, 16), 0)
            .unwrap_err();
        assert!(matches!(
            error,
            VlurError::Resource(ResourceError::Export(_))
        ));

        assert_eq!(processor.output_hardware_buffer(0).unwrap(), handle);
        assert!(!handle.is_released());
        processor.blur(3.0, 0).unwrap();
    }

    #[test]
    fn test_invalid_bitmap_leaves_slot_absent() {
        let processor = match try_processor() {
            Some(p) => p,
            None => return,
        };
        let empty = Bitmap::new(Vec::new(), 0, 0, PixelFormat::Rgba8888);
        assert!(matches!(
            processor.configure_input_and_output(&empty, 2),
            Err(VlurError::Contract(ContractError::InvalidBitmap(_)))
        ));
        assert_eq!(processor.slot_count(), 0);
    }

    #[test]
    fn test_destroy_twice_then_calls_fail() {
        let processor = match try_processor() {
            Some(p) => p,
            None => return,
        };
        processor
            .configure_input_and_output(&gradient(4, 4), 0)
            .unwrap();
        let handle = processor.output_hardware_buffer(0).unwrap();

        processor.destroy();
        processor.destroy();

        assert!(processor.is_destroyed());
        assert!(handle.is_released());
        assert_eq!(processor.slot_count(), 0);
        assert!(matches!(
            processor.blur(2.0, 0),
            Err(VlurError::Contract(ContractError::Destroyed))
        ));
        assert!(matches!(
            processor.configure_input_and_output(&gradient(4, 4), 0),
            Err(VlurError::Contract(ContractError::Destroyed))
        ));
        assert!(matches!(
            processor.output_hardware_buffer(0),
            Err(VlurError::Contract(ContractError::Destroyed))
        ));
    }

    #[test]
    fn test_cleanup_through_trait() {
        let processor: Box<dyn ImageProcessor> = match try_processor() {
            Some(p) => Box::new(p),
            None => return,
        };
        processor
            .configure_input_and_output(&gradient(4, 4), 0)
            .unwrap();
        processor.cleanup();
        processor.cleanup();
        assert!(processor.read_output(0).is_err());
    }

    #[test]
    fn test_concurrent_slots_from_threads() {
        let processor = match try_processor() {
            Some(p) => Arc::new(p),
            None => return,
        };
        let workers: Vec<_> = (0..4)
            .map(|id| {
                let processor = Arc::clone(&processor);
                thread::spawn(move || {
                    processor
                        .configure_input_and_output(&gradient(10 + id as u32, 10), id)
                        .unwrap();
                    for r in [1.0, 7.5, 25.0] {
                        processor.blur(r, id).unwrap();
                    }
                    processor.read_output(id).unwrap().width()
                })
            })
            .collect();
        for (id, worker) in workers.into_iter().enumerate() {
            assert_eq!(worker.join().unwrap(), 10 + id as u32);
        }
        assert_eq!(processor.slot_count(), 4);
    }
}
