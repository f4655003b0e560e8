use crate::shared::constants::{MAX_BLUR_RADIUS, MIN_BLUR_RADIUS};
use crate::shared::error::ContractError;

/// A blur radius validated to lie in [1.0, 25.0].
///
/// Out-of-range and NaN values are rejected rather than clamped.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct BlurRadius(f32);

impl BlurRadius {
    pub fn new(value: f32) -> Result<Self, ContractError> {
        if (MIN_BLUR_RADIUS..=MAX_BLUR_RADIUS).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ContractError::RadiusOutOfRange(value))
        }
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Standard deviation of the kernel. Continuous in the radius.
    pub fn sigma(self) -> f32 {
        0.4 * self.0 + 0.6
    }

    /// Kernel half-width in pixels.
    pub fn taps(self) -> u32 {
        self.0.ceil() as u32
    }
}
