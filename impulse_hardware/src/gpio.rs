//! Raspberry Pi GPIO backend.

use rppal::gpio::{Gpio, InputPin, OutputPin};

use impulse_traits::{BinaryOutput, BinarySensor, HwResult};

use crate::error::{HwError, Result};

fn open_gpio() -> Result<Gpio> {
    Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))
}

/// Push-button line to the motor controller, idle low.
pub struct GpioOutput {
    pin: OutputPin,
}

impl GpioOutput {
    pub fn new(pin: u8) -> Result<Self> {
        let pin = open_gpio()?
            .get(pin)
            .map_err(|e| HwError::Gpio(format!("output pin {pin}: {e}")))?
            .into_output_low();
        tracing::debug!(pin = pin.pin(), "impulse output bound");
        Ok(Self { pin })
    }
}

impl BinaryOutput for GpioOutput {
    fn write(&mut self, high: bool) -> HwResult<()> {
        if high {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        Ok(())
    }
}

/// End-stop input with the internal pull-up enabled.
pub struct GpioSensor {
    pin: InputPin,
}

impl GpioSensor {
    pub fn new(pin: u8) -> Result<Self> {
        let pin = open_gpio()?
            .get(pin)
            .map_err(|e| HwError::Gpio(format!("sensor pin {pin}: {e}")))?
            .into_input_pullup();
        tracing::debug!(pin = pin.pin(), "end-stop input bound");
        Ok(Self { pin })
    }
}

impl BinarySensor for GpioSensor {
    fn read(&mut self) -> HwResult<bool> {
        Ok(self.pin.is_high())
    }
}
