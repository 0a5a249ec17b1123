use embedded_hal::digital::{ErrorType, OutputPin as HalOutputPin};
use rppal::gpio::{Gpio, InputPin, OutputPin, Trigger};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Instant;

use crate::error::Result;
use crate::ppm::{EdgeHandler, EdgeInput};

/// Which receiver edge starts a pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Edge {
    #[default]
    Falling,
    Rising,
}

impl From<Edge> for Trigger {
    fn from(edge: Edge) -> Trigger {
        match edge {
            Edge::Falling => Trigger::FallingEdge,
            Edge::Rising => Trigger::RisingEdge,
        }
    }
}

/// GPIO line driving one ESC signal wire.
pub struct EscPin(OutputPin);

impl EscPin {
    pub fn new(gpio: &Gpio, pin: u8) -> Result<Self> {
        let mut out = gpio.get(pin)?.into_output();
        out.set_low();
        log::info!("GPIO {} initialized for ESC", pin);
        Ok(EscPin(out))
    }
}

impl ErrorType for EscPin {
    type Error = Infallible;
}

impl HalOutputPin for EscPin {
    fn set_high(&mut self) -> std::result::Result<(), Infallible> {
        self.0.set_high();
        Ok(())
    }

    fn set_low(&mut self) -> std::result::Result<(), Infallible> {
        self.0.set_low();
        Ok(())
    }
}

/// Receiver PPM line. Edges arrive on rppal's interrupt thread.
pub struct PpmPin {
    pin: InputPin,
    edge: Edge,
}

impl PpmPin {
    pub fn new(gpio: &Gpio, pin: u8, edge: Edge) -> Result<Self> {
        let input = gpio.get(pin)?.into_input_pulldown();
        log::info!("GPIO {} initialized for PPM ({:?} edge)", pin, edge);
        Ok(PpmPin { pin: input, edge })
    }
}

impl EdgeInput for PpmPin {
    fn listen(&mut self, mut handler: EdgeHandler) -> Result<()> {
        self.pin
            .set_async_interrupt(self.edge.into(), move |_level| handler.edge(Instant::now()))?;
        Ok(())
    }

    fn silence(&mut self) -> Result<()> {
        self.pin.clear_async_interrupt()?;
        Ok(())
    }
}
