//! Main control loop: receiver in, four ESCs out.

use std::thread;
use std::time::{Duration, Instant};

use crate::config::RobotConfig;
use crate::dshot::Command;
use crate::error::{Error, Result};
use crate::esc::EscChannel;
use crate::kinematics::sine_drive;
use crate::ppm::{EdgeInput, PpmDecoder};

/// Everything the loop touches, owned in one place.
pub struct Context<I> {
    receiver: PpmDecoder<I>,
    escs: Vec<EscChannel>,
    config: RobotConfig,
    failsafe: bool,
}

impl<I: EdgeInput> Context<I> {
    pub fn new(receiver: PpmDecoder<I>, escs: Vec<EscChannel>, config: RobotConfig) -> Self {
        Context { receiver, escs, config, failsafe: false }
    }

    /// Switches every ESC to 3D mode and saves it, if configured.
    pub fn prepare_escs(&self) -> Result<()> {
        if !self.config.enable_3d {
            return Ok(());
        }
        for esc in &self.escs {
            esc.command(Command::Mode3dOn)?;
            esc.command(Command::SaveSettings)?;
            log::info!("[{}] 3D mode enabled", esc.name());
        }
        Ok(())
    }

    /// No edge yet, or none within the receiver timeout.
    pub fn receiver_lost(&self) -> bool {
        let timeout = Duration::from_millis(self.config.receiver_timeout_ms);
        match self.receiver.since_last_edge() {
            Some(quiet) => quiet > timeout,
            None => true,
        }
    }

    /// One pass: read sticks, mix, push throttles. Returns the motor speeds.
    pub fn step(&mut self) -> Result<[f64; 4]> {
        let lost = self.receiver_lost();
        if lost != self.failsafe {
            if lost {
                log::warn!("receiver lost, motors to neutral");
            } else {
                log::info!("receiver signal ok");
            }
            self.failsafe = lost;
        }

        let speeds = if lost {
            [0.0; 4]
        } else {
            let map = self.config.channels;
            sine_drive(
                self.receiver.channel(map.x),
                self.receiver.channel(map.y),
                self.receiver.channel(map.rotation),
            )
        };

        for (esc, &speed) in self.escs.iter_mut().zip(&speeds) {
            match esc.set_throttle_3d(speed) {
                // drop policy: the next pass sends a fresh value anyway
                Err(Error::QueueFull) => {}
                other => other?,
            }
        }
        Ok(speeds)
    }

    pub fn run(&mut self) -> Result<()> {
        let period = Duration::from_micros(self.config.loop_period_us);
        log::info!("control loop running every {:?}", period);
        loop {
            let start = Instant::now();
            self.step()?;
            if let Some(rest) = period.checked_sub(start.elapsed()) {
                thread::sleep(rest);
            }
        }
    }

    /// Brings every motor to neutral, stops capture and waits for the ESC
    /// workers to drain.
    pub fn shutdown(mut self) -> Result<()> {
        for esc in self.escs.iter_mut() {
            if let Err(e) = esc.set_throttle_3d(0.0) {
                log::error!("[{}] could not stop motor: {}", esc.name(), e);
            }
        }
        self.receiver.stop()?;
        for esc in self.escs.drain(..) {
            esc.join();
        }
        log::info!("shutdown complete");
        Ok(())
    }
}
