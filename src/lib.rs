//! Propulsion core for an RC battle robot on a Raspberry Pi: PPM receiver
//! decoding on one GPIO input and bit-banged DShot to four ESCs.

pub mod config;
pub mod control;
pub mod dshot;
pub mod error;
pub mod esc;
pub mod hw;
pub mod kinematics;
pub mod logging;
pub mod ppm;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
