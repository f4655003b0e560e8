use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::blurring::domain::blur_radius::BlurRadius;
use crate::blurring::domain::image_processor::{ImageProcessor, SlotId};
use crate::shared::bitmap::{Bitmap, PixelFormat};
use crate::shared::error::{ContractError, VlurError};

use super::gaussian::blur_rgba;

struct CpuSlot {
    input: Vec<u8>,
    output: Vec<u8>,
    width: u32,
    height: u32,
}

/// CPU implementation of the blur engine.
///
/// Runs the same kernel as the compute shader. Used when no GPU adapter
/// is available.
pub struct CpuImageProcessor {
    slots: Mutex<Option<HashMap<SlotId, CpuSlot>>>,
}

impl CpuImageProcessor {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Some(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<HashMap<SlotId, CpuSlot>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CpuImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageProcessor for CpuImageProcessor {
    fn configure_input_and_output(&self, input: &Bitmap, id: SlotId) -> Result<(), VlurError> {
        let mut guard = self.lock();
        let slots = guard.as_mut().ok_or(ContractError::Destroyed)?;
        let rgba = input.to_rgba()?;
        slots.insert(
            id,
            CpuSlot {
                output: rgba.clone(),
                input: rgba,
                width: input.width(),
                height: input.height(),
            },
        );
        Ok(())
    }

    fn blur(&self, radius: f32, id: SlotId) -> Result<(), VlurError> {
        let mut guard = self.lock();
        let slots = guard.as_mut().ok_or(ContractError::Destroyed)?;
        let radius = BlurRadius::new(radius)?;
        let slot = slots
            .get_mut(&id)
            .ok_or(ContractError::NotConfigured(id))?;

        slot.output.copy_from_slice(&slot.input);
        blur_rgba(
            &mut slot.output,
            slot.width as usize,
            slot.height as usize,
            radius,
        );
        Ok(())
    }

    fn read_output(&self, id: SlotId) -> Result<Bitmap, VlurError> {
        let guard = self.lock();
        let slots = guard.as_ref().ok_or(ContractError::Destroyed)?;
        let slot = slots.get(&id).ok_or(ContractError::NotConfigured(id))?;
        Ok(Bitmap::new(
            slot.output.clone(),
            slot.width,
            slot.height,
            PixelFormat::Rgba8888,
        ))
    }

    fn cleanup(&self) {
        self.lock().take();
    }
}
