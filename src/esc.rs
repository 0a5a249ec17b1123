//! One worker thread per ESC signal line.
//!
//! The control loop pushes frames into a bounded queue; the worker drains it
//! in order through the DShot transmitter. DShot ESCs cut the motor when no
//! frame arrives for roughly 10 ms, so the worker re-sends the last throttle
//! whenever the queue stays quiet for the refresh interval.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::dshot::{COMMAND_REPEAT, Command, Frame, Transmitter};
use crate::error::{Error, Result};

/// Below this magnitude a 3D speed counts as stopped.
const SPIN_EPSILON: f64 = 0.001;
const REVERSE_MIN: u16 = 48;
const FORWARD_MIN: u16 = 1048;
const THROTTLE_SPAN: f64 = 999.0;

/// What `send_frame` does when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Overflow {
    /// Wait for room. No frame is ever lost, but the caller runs at the
    /// line's pace.
    #[default]
    Block,
    /// Discard the new frame and return [`Error::QueueFull`].
    Drop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscConfig {
    pub queue_depth: usize,
    pub overflow: Overflow,
    /// Re-send the last throttle after this long without traffic. `None`
    /// disables the refresh.
    pub refresh_ms: Option<u64>,
    /// Send a motor stop before the worker exits.
    pub disarm_on_stop: bool,
}

impl Default for EscConfig {
    fn default() -> Self {
        EscConfig {
            queue_depth: 10,
            overflow: Overflow::Block,
            refresh_ms: Some(8),
            disarm_on_stop: false,
        }
    }
}

/// Maps -1..1 onto the two 3D throttle ranges: reverse 48..=1047, forward
/// 1048..=2047. Anything that counts as stopped is the bottom of the forward
/// range.
pub fn throttle_3d(speed: f64) -> u16 {
    if speed.is_nan() || speed.abs() < SPIN_EPSILON {
        return FORWARD_MIN;
    }
    let speed = speed.clamp(-1.0, 1.0);
    let magnitude = (speed.abs() * THROTTLE_SPAN).round() as u16;
    if speed < 0.0 {
        REVERSE_MIN + magnitude
    } else {
        FORWARD_MIN + magnitude
    }
}

struct Worker<P, D> {
    name: String,
    transmitter: Transmitter,
    line: P,
    delay: D,
    refresh: Option<Duration>,
    disarm_on_stop: bool,
}

impl<P, D> Worker<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    fn transmit(&mut self, frame: Frame) {
        if let Err(e) = self.transmitter.send(frame.encode(), &mut self.line, &mut self.delay) {
            log::error!("[{}] failed to send {:?}: {:?}", self.name, frame, e);
        }
    }

    fn run(mut self, queue: Receiver<Frame>) {
        log::debug!("[{}] worker running", self.name);
        let mut last_throttle: Option<Frame> = None;
        let mut last_send = Instant::now();

        loop {
            let next = match self.refresh {
                Some(every) => queue.recv_timeout(every.saturating_sub(last_send.elapsed())),
                None => queue.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match next {
                Ok(frame) => {
                    // commands only work on a stopped motor, never refresh across one
                    last_throttle = frame.is_throttle().then_some(frame);
                    self.transmit(frame);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(frame) = last_throttle {
                        self.transmit(frame);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
            last_send = Instant::now();
        }

        if self.disarm_on_stop {
            self.transmit(Command::MotorStop.frame());
        }
        log::debug!("[{}] worker stopped", self.name);
    }
}

/// Handle to one ESC. Owned by the control loop; the signal line belongs to
/// the worker thread.
pub struct EscChannel {
    name: String,
    queue: Option<SyncSender<Frame>>,
    overflow: Overflow,
    // motor stop acts as a toggle on the ESC, so track which side of it we are on
    spinning: bool,
    worker: Option<JoinHandle<()>>,
}

impl EscChannel {
    pub fn spawn<P, D>(name: &str, transmitter: Transmitter, line: P, delay: D, config: &EscConfig) -> Result<Self>
    where
        P: OutputPin + Send + 'static,
        D: DelayNs + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(config.queue_depth.max(1));
        let worker = Worker {
            name: name.to_string(),
            transmitter,
            line,
            delay,
            refresh: config.refresh_ms.map(Duration::from_millis),
            disarm_on_stop: config.disarm_on_stop,
        };
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker.run(rx))?;

        log::info!(
            "[{}] dshot{} channel started ({:?} per frame, queue {}, {:?} on overflow)",
            name,
            transmitter.speed().kbits(),
            transmitter.timing().frame_duration(0),
            config.queue_depth.max(1),
            config.overflow
        );
        Ok(EscChannel {
            name: name.to_string(),
            queue: Some(tx),
            overflow: config.overflow,
            spinning: false,
            worker: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_spinning(&self) -> bool {
        self.spinning
    }

    pub fn send_frame(&self, frame: Frame) -> Result<()> {
        self.enqueue(frame, self.overflow)
    }

    fn enqueue(&self, frame: Frame, overflow: Overflow) -> Result<()> {
        let queue = self.queue.as_ref().ok_or(Error::ChannelClosed)?;
        match overflow {
            Overflow::Block => queue.send(frame).map_err(|_| Error::ChannelClosed),
            Overflow::Drop => queue.try_send(frame).map_err(|e| match e {
                TrySendError::Full(_) => {
                    log::debug!("[{}] queue full, dropped {:?}", self.name, frame);
                    Error::QueueFull
                }
                TrySendError::Disconnected(_) => Error::ChannelClosed,
            }),
        }
    }

    /// Queues `repeat` copies of a command with the telemetry bit set.
    /// Stateful commands are ignored by the ESC unless `repeat` is at least
    /// [`COMMAND_REPEAT`].
    ///
    /// A run of copies always waits for room, whatever the overflow policy:
    /// a run cut short by a full queue is silently ignored by the ESC.
    pub fn send_cmd(&self, code: u16, repeat: usize) -> Result<()> {
        let frame = Frame::new(code, true);
        let overflow = if repeat > 1 { Overflow::Block } else { self.overflow };
        for _ in 0..repeat {
            self.enqueue(frame, overflow)?;
        }
        Ok(())
    }

    /// Sends a command as many times as the ESC needs to act on it.
    pub fn command(&self, cmd: Command) -> Result<()> {
        let repeat = if cmd.needs_repeat() { COMMAND_REPEAT } else { 1 };
        self.send_cmd(cmd.code(), repeat)
    }

    /// -1 is full reverse, 1 full forward. Crossing through zero in either
    /// direction first sends a motor stop to toggle the ESC's armed state.
    pub fn set_throttle_3d(&mut self, speed: f64) -> Result<()> {
        let moving = speed.abs() >= SPIN_EPSILON;
        if moving != self.spinning {
            self.send_cmd(Command::MotorStop.code(), 1)?;
            self.spinning = moving;
        }
        self.send_frame(Frame::throttle(throttle_3d(speed)))
    }

    /// Tells the worker to exit once the queue is drained. Does not wait.
    /// Queue any shutdown frames before calling this.
    pub fn stop(&mut self) {
        if self.queue.take().is_some() {
            log::info!("[{}] stopping", self.name);
        }
    }

    /// Stops the channel and waits for the worker to finish.
    pub fn join(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("[{}] worker panicked", self.name);
            }
        }
    }
}

impl Drop for EscChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}
