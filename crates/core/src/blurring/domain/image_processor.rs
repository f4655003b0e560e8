use crate::shared::bitmap::Bitmap;
use crate::shared::error::VlurError;

/// Caller-chosen key identifying one independent blur session.
pub type SlotId = i32;

/// Domain interface for a blur engine holding per-slot input/output images.
///
/// Calls block until the work is complete. Implementations serialize calls
/// internally, so a processor can be shared across threads.
pub trait ImageProcessor: Send + Sync {
    /// Set the input image for `id` and allocate its output. Calling again
    /// with the same id replaces the slot; on failure the old slot survives.
    fn configure_input_and_output(&self, input: &Bitmap, id: SlotId) -> Result<(), VlurError>;

    /// Blur the slot's input into its output. `radius` must be in [1.0, 25.0].
    fn blur(&self, radius: f32, id: SlotId) -> Result<(), VlurError>;

    /// Copy the slot's current output back to a CPU bitmap (RGBA8).
    fn read_output(&self, id: SlotId) -> Result<Bitmap, VlurError>;

    /// Release every slot and the backend. Safe to call more than once;
    /// every other call fails afterwards.
    fn cleanup(&self);
}
