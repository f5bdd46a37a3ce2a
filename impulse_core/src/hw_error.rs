//! Maps `Box<dyn Error>` from trait boundaries to typed `CoverError`.
//!
//! The traits in `impulse_traits` use `Box<dyn Error + Send + Sync>` for
//! maximum flexibility; this module converts those to our typed error enum,
//! with an optional feature-gated path for `impulse_hardware::HwError`
//! downcasting.

use crate::error::CoverError;

/// Map a trait-boundary error to a typed `CoverError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to the display string.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> CoverError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<impulse_hardware::error::HwError>() {
            return match hw {
                impulse_hardware::error::HwError::Disconnected(_) => {
                    CoverError::Hardware(hw.to_string())
                }
                other => CoverError::HardwareFault(other.to_string()),
            };
        }
    }

    CoverError::Hardware(e.to_string())
}
