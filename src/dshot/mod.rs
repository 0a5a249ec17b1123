//! Unidirectional DShot: frame codec, per-speed bit timings and a
//! bit-banging transmitter.
//!
//! A frame is `vvvv_vvvv_vvvt_cccc`: 11 bits of value, the telemetry request
//! bit and a checksum nibble (XOR of the three nibbles before it), sent MSB
//! first. Ones and zeros are both a high pulse followed by a low; a one's
//! high pulse is twice a zero's.

mod frame;
mod timing;
mod transmitter;

pub use frame::{COMMAND_REPEAT, Command, Frame, MAX_VALUE, MIN_THROTTLE};
pub use timing::{BitTiming, FRAME_GUARD, Speed, Symbol};
pub use transmitter::{SpinDelay, Transmitter};
