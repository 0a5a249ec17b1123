//! Bench doubles: a logic-analyzer style recorder for DShot lines, a
//! simulated ESC and a hand-fired receiver input.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::dshot::{BitTiming, COMMAND_REPEAT, Frame};
use crate::error;
use crate::ppm::{EdgeHandler, EdgeInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trace {
    High,
    Low,
    Wait(u32),
}

/// Records line transitions and waits into one shared log instead of
/// touching hardware or sleeping. Clones share the log, so one clone can be
/// the line and another the delay.
#[derive(Clone)]
pub struct Scope {
    timing: BitTiming,
    log: Arc<Mutex<Vec<Trace>>>,
}

impl Scope {
    pub fn new(timing: BitTiming) -> Self {
        Scope { timing, log: Arc::new(Mutex::new(Vec::new())) }
    }

    fn push(&self, t: Trace) {
        self.log.lock().unwrap().push(t);
    }

    pub fn trace(&self) -> Vec<Trace> {
        self.log.lock().unwrap().clone()
    }

    /// Bits recovered from high pulse widths.
    pub fn bits(&self) -> Vec<bool> {
        let one_high = self.timing.one.high.as_nanos() as u32;
        let trace = self.trace();
        trace
            .windows(2)
            .filter_map(|w| match w {
                [Trace::High, Trace::Wait(ns)] => Some(*ns == one_high),
                _ => None,
            })
            .collect()
    }

    pub fn words(&self) -> Vec<u16> {
        self.bits()
            .chunks_exact(16)
            .map(|bits| bits.iter().fold(0u16, |acc, &b| (acc << 1) | b as u16))
            .collect()
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.words()
            .into_iter()
            .map(|w| Frame::decode(w).unwrap())
            .collect()
    }
}

impl ErrorType for Scope {
    type Error = Infallible;
}

impl OutputPin for Scope {
    fn set_high(&mut self) -> Result<(), Infallible> {
        self.push(Trace::High);
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Infallible> {
        self.push(Trace::Low);
        Ok(())
    }
}

impl DelayNs for Scope {
    fn delay_ns(&mut self, ns: u32) {
        self.push(Trace::Wait(ns));
    }
}

/// ESC firmware model: throttle frames apply at once, command frames only
/// after [`COMMAND_REPEAT`] identical consecutive frames with telemetry set.
#[derive(Debug, Default)]
pub struct SimEsc {
    last: Option<Frame>,
    run: usize,
    pub throttle: Option<u16>,
    pub accepted: Vec<u16>,
    pub mode_3d: bool,
}

impl SimEsc {
    pub fn feed(&mut self, frame: Frame) {
        if self.last == Some(frame) {
            self.run += 1;
        } else {
            self.last = Some(frame);
            self.run = 1;
        }

        if frame.is_throttle() {
            self.throttle = Some(frame.value);
            return;
        }
        if frame.value == 0 {
            self.throttle = None;
            return;
        }
        if frame.telemetry && self.run == COMMAND_REPEAT {
            self.accepted.push(frame.value);
            match frame.value {
                9 => self.mode_3d = false,
                10 => self.mode_3d = true,
                _ => {}
            }
        }
    }

    pub fn feed_all(&mut self, frames: impl IntoIterator<Item = Frame>) {
        for f in frames {
            self.feed(f);
        }
    }
}

/// Receiver input driven by the test instead of a GPIO interrupt.
#[derive(Default)]
pub struct BenchInput {
    pub handler: Option<EdgeHandler>,
    pub silenced: bool,
}

impl BenchInput {
    pub fn fire(&mut self, at: Instant) {
        if let Some(h) = self.handler.as_mut() {
            h.edge(at);
        }
    }

    pub fn slot(&self) -> usize {
        self.handler.as_ref().map(|h| h.slot()).unwrap()
    }
}

impl EdgeInput for BenchInput {
    fn listen(&mut self, handler: EdgeHandler) -> error::Result<()> {
        self.handler = Some(handler);
        Ok(())
    }

    fn silence(&mut self) -> error::Result<()> {
        self.handler = None;
        self.silenced = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dshot::Command;

    #[test]
    fn command_needs_ten_in_a_row() {
        let mut esc = SimEsc::default();
        esc.feed_all(std::iter::repeat(Command::Mode3dOn.frame()).take(9));
        assert!(!esc.mode_3d);
        esc.feed(Command::Mode3dOn.frame());
        assert!(esc.mode_3d);
        assert_eq!(esc.accepted, vec![10]);
    }

    #[test]
    fn interrupted_command_is_ignored() {
        let mut esc = SimEsc::default();
        esc.feed_all(std::iter::repeat(Command::SaveSettings.frame()).take(5));
        esc.feed(Frame::throttle(1048));
        esc.feed_all(std::iter::repeat(Command::SaveSettings.frame()).take(5));
        assert!(esc.accepted.is_empty());
    }

    #[test]
    fn command_without_telemetry_is_ignored() {
        let mut esc = SimEsc::default();
        esc.feed_all(std::iter::repeat(Frame::new(10, false)).take(10));
        assert!(!esc.mode_3d);
    }
}
