pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Boxed error used at the hardware boundary.
pub type HwResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// The single digital output wired to the motor controller's push-button input.
///
/// The core only ever writes it; it is never read back.
pub trait BinaryOutput {
    fn write(&mut self, high: bool) -> HwResult<()>;
}

/// A raw binary input such as an end-stop reed switch.
///
/// Inversion is applied by the caller, so implementations report the
/// electrical level as-is.
pub trait BinarySensor {
    fn read(&mut self) -> HwResult<bool>;
}

impl<T: BinaryOutput + ?Sized> BinaryOutput for Box<T> {
    fn write(&mut self, high: bool) -> HwResult<()> {
        (**self).write(high)
    }
}

impl<T: BinarySensor + ?Sized> BinarySensor for Box<T> {
    fn read(&mut self) -> HwResult<bool> {
        (**self).read()
    }
}
