use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use std::time::{Duration, Instant};

use super::timing::{BitTiming, FRAME_GUARD, Speed};
use crate::error;

/// Busy-waits on the monotonic clock.
///
/// `thread::sleep` overshoots by tens of microseconds on Linux, which is
/// longer than a whole DShot600 frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpinDelay;

impl DelayNs for SpinDelay {
    fn delay_ns(&mut self, ns: u32) {
        let start = Instant::now();
        let wait = Duration::from_nanos(ns as u64);
        while start.elapsed() < wait {
            std::hint::spin_loop();
        }
    }
}

fn nanos(d: Duration) -> u32 {
    d.as_nanos().min(u32::MAX as u128) as u32
}

/// Bit-bangs encoded DShot words onto a line.
#[derive(Debug, Clone, Copy)]
pub struct Transmitter {
    speed: Speed,
    timing: BitTiming,
}

impl Transmitter {
    pub fn new(speed: Speed) -> Self {
        Transmitter { speed, timing: speed.timing() }
    }

    /// Fails with [`Error::UnsupportedSpeed`](crate::Error::UnsupportedSpeed)
    /// for anything but 150, 300, 600 or 1200.
    pub fn from_kbits(kbits: u32) -> error::Result<Self> {
        Ok(Transmitter::new(Speed::try_from(kbits)?))
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }

    pub fn timing(&self) -> &BitTiming {
        &self.timing
    }

    /// Sends one word MSB first and leaves the line low for the guard time.
    /// Blocks for the whole frame.
    pub fn send<P, D>(&self, word: u16, line: &mut P, delay: &mut D) -> Result<(), P::Error>
    where
        P: OutputPin,
        D: DelayNs,
    {
        for i in (0..16).rev() {
            let symbol = self.timing.symbol((word >> i) & 1 == 1);
            line.set_high()?;
            delay.delay_ns(nanos(symbol.high));
            line.set_low()?;
            delay.delay_ns(nanos(symbol.low));
        }
        delay.delay_ns(nanos(FRAME_GUARD));
        Ok(())
    }

    /// Sends the same word `n` times back to back. Stateful commands must be
    /// repeated at least [`COMMAND_REPEAT`](super::COMMAND_REPEAT) times.
    pub fn repeat_send<P, D>(&self, word: u16, n: usize, line: &mut P, delay: &mut D) -> Result<(), P::Error>
    where
        P: OutputPin,
        D: DelayNs,
    {
        for _ in 0..n {
            self.send(word, line, delay)?;
        }
        Ok(())
    }
}
