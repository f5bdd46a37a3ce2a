//! Sensor Reconciler: optional end-stop sensors with per-sensor inversion.
//!
//! A sensor that is not wired, or whose read fails, reports "no signal".

use impulse_traits::BinarySensor;

use crate::hw_error::map_hw_error;
use crate::types::Direction;

/// One end-stop, present or absent.
pub enum EndStop {
    Absent,
    Present {
        sensor: Box<dyn BinarySensor>,
        inverted: bool,
        failing: bool,
    },
}

impl core::fmt::Debug for EndStop {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Absent => f.write_str("Absent"),
            Self::Present {
                inverted, failing, ..
            } => f
                .debug_struct("Present")
                .field("inverted", inverted)
                .field("failing", failing)
                .finish(),
        }
    }
}

impl EndStop {
    pub fn present(sensor: Box<dyn BinarySensor>, inverted: bool) -> Self {
        Self::Present {
            sensor,
            inverted,
            failing: false,
        }
    }

    #[inline]
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }

    /// `None` when absent; otherwise the triggered level after inversion.
    fn sample(&mut self, label: &'static str) -> Option<bool> {
        let Self::Present {
            sensor,
            inverted,
            failing,
        } = self
        else {
            return None;
        };
        match sensor.read() {
            Ok(raw) => {
                if *failing {
                    tracing::info!(sensor = label, "end-stop sensor readable again");
                    *failing = false;
                }
                Some(raw != *inverted)
            }
            Err(e) => {
                if !*failing {
                    let err = map_hw_error(e.as_ref());
                    tracing::warn!(sensor = label, error = %err, "end-stop read failed; treating as not triggered");
                    *failing = true;
                }
                Some(false)
            }
        }
    }
}

/// Interpreted end-stop levels from one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndStopReading {
    pub open: Option<bool>,
    pub close: Option<bool>,
}

impl EndStopReading {
    #[inline]
    pub fn open_triggered(&self) -> bool {
        self.open == Some(true)
    }

    #[inline]
    pub fn close_triggered(&self) -> bool {
        self.close == Some(true)
    }

    /// The end-stop that completes a movement in `direction` has fired.
    pub fn completes(&self, direction: Direction) -> bool {
        match direction {
            Direction::Opening => self.open_triggered(),
            Direction::Closing => self.close_triggered(),
        }
    }

    /// Both ends report triggered at once; only possible with a wiring fault.
    #[inline]
    pub fn contradictory(&self) -> bool {
        self.open_triggered() && self.close_triggered()
    }

    /// The end the cover rests at, if exactly one end-stop has fired.
    pub fn resting_end(&self) -> Option<Direction> {
        match (self.open_triggered(), self.close_triggered()) {
            (true, false) => Some(Direction::Opening),
            (false, true) => Some(Direction::Closing),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct SensorReconciler {
    open: EndStop,
    close: EndStop,
}

impl Default for SensorReconciler {
    fn default() -> Self {
        Self::new(EndStop::Absent, EndStop::Absent)
    }
}

impl SensorReconciler {
    pub fn new(open: EndStop, close: EndStop) -> Self {
        Self { open, close }
    }

    /// Read both end-stops once.
    pub fn sample(&mut self) -> EndStopReading {
        EndStopReading {
            open: self.open.sample("open"),
            close: self.close.sample("close"),
        }
    }

    #[inline]
    pub fn has_open(&self) -> bool {
        self.open.is_present()
    }

    #[inline]
    pub fn has_close(&self) -> bool {
        self.close.is_present()
    }

    /// Position is only assumed unless both ends are observable.
    #[inline]
    pub fn assumed_state(&self) -> bool {
        !(self.has_open() && self.has_close())
    }
}
