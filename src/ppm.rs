//! PPM receiver decoding.
//!
//! A PPM frame is a sync gap longer than [`FRAME_GAP`] followed by up to
//! sixteen pulses whose spacing carries the channel values (1000-2000 µs,
//! midpoint 1500 µs). The edge handler only stores raw widths; scaling and
//! shaping happen when a channel is read.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

pub const CHANNELS: usize = 16;

/// Any gap longer than this marks the start of a new frame.
pub const FRAME_GAP: Duration = Duration::from_millis(6);

const MIDPOINT_US: u32 = 1500;
const HALF_RANGE_US: u32 = 500;
const DEFAULT_DEAD_ZONE: f64 = 0.12;
const TRINARY_THRESHOLD: f64 = 0.33;

/// Input shaping applied after the dead zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Shaping {
    /// Value passed through as-is.
    #[default]
    Linear,
    /// Squared, keeping the sign. Finer control near center, full range at
    /// the ends.
    Square,
    /// Compresses near zero, expands toward the ends.
    Logarithmic,
    /// Always exactly -1, 0 or 1. For switches and mode selectors.
    Trinary,
}

impl Shaping {
    pub fn apply(self, scaled: f64) -> f64 {
        match self {
            Shaping::Linear => scaled,
            Shaping::Square => scaled.signum() * scaled * scaled,
            Shaping::Logarithmic => scaled.signum() * (20.0 * scaled.abs() + 1.0).ln() / 21f64.ln(),
            Shaping::Trinary => {
                if scaled < -TRINARY_THRESHOLD {
                    -1.0
                } else if scaled > TRINARY_THRESHOLD {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub shaping: Shaping,
    /// Fraction of full range around center that reads as 0.
    pub dead_zone: f64,
    /// Calibration bounds. Stored for reference, not applied to scaling.
    pub min_us: u32,
    pub max_us: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            shaping: Shaping::Linear,
            dead_zone: DEFAULT_DEAD_ZONE,
            min_us: MIDPOINT_US - HALF_RANGE_US,
            max_us: MIDPOINT_US + HALF_RANGE_US,
        }
    }
}

impl ChannelConfig {
    pub fn with_shaping(shaping: Shaping) -> Self {
        ChannelConfig { shaping, ..Default::default() }
    }

    /// Maps a raw width to -1..1 (nominally), then applies dead zone and shaping.
    pub fn value(&self, width: Duration) -> f64 {
        if width.is_zero() {
            return 0.0;
        }
        let us = width.as_nanos() as f64 / 1000.0;
        let scaled = (us * 2.0 - 3000.0) / 1000.0;
        if scaled.abs() < self.dead_zone {
            return 0.0;
        }
        self.shaping.apply(scaled)
    }
}

/// Raw widths shared between the edge handler and readers. Each slot is a
/// single atomic, so a reader sees either the old or the new width.
pub struct ChannelBank {
    widths: [AtomicU64; CHANNELS],
    epoch: Instant,
    // nanoseconds since epoch, plus one; zero means no edge yet
    last_edge: AtomicU64,
}

impl ChannelBank {
    fn new() -> Self {
        ChannelBank {
            widths: std::array::from_fn(|_| AtomicU64::new(0)),
            epoch: Instant::now(),
            last_edge: AtomicU64::new(0),
        }
    }

    pub fn width(&self, ch: usize) -> Duration {
        Duration::from_nanos(self.widths[ch].load(Ordering::Relaxed))
    }

    fn store(&self, ch: usize, width: Duration) {
        self.widths[ch].store(width.as_nanos() as u64, Ordering::Relaxed);
    }

    fn mark_edge(&self, at: Instant) {
        let since = at.saturating_duration_since(self.epoch).as_nanos() as u64;
        self.last_edge.store(since + 1, Ordering::Relaxed);
    }

    fn last_edge(&self) -> Option<Instant> {
        match self.last_edge.load(Ordering::Relaxed) {
            0 => None,
            n => Some(self.epoch + Duration::from_nanos(n - 1)),
        }
    }
}

/// Per-edge state machine. Runs in interrupt context: no allocation, no locks.
pub struct EdgeHandler {
    bank: Arc<ChannelBank>,
    slot: usize,
    last: Option<Instant>,
}

impl EdgeHandler {
    fn new(bank: Arc<ChannelBank>) -> Self {
        EdgeHandler { bank, slot: 0, last: None }
    }

    pub fn edge(&mut self, now: Instant) {
        let gap = self.last.map(|last| now.saturating_duration_since(last));
        self.last = Some(now);
        self.bank.mark_edge(now);

        match gap {
            None => self.slot = 0,
            Some(gap) if gap > FRAME_GAP => self.slot = 0,
            // over-long frame, wait for the next sync gap
            Some(_) if self.slot >= CHANNELS => {}
            Some(gap) => {
                self.bank.store(self.slot, gap);
                self.slot += 1;
            }
        }
    }

    /// Slot the next pulse will be written to.
    pub fn slot(&self) -> usize {
        self.slot
    }
}

/// Source of receiver edges, normally a GPIO interrupt.
pub trait EdgeInput {
    /// Starts delivering edges to `handler`.
    fn listen(&mut self, handler: EdgeHandler) -> Result<()>;
    fn silence(&mut self) -> Result<()>;
}

pub struct PpmDecoder<I> {
    input: I,
    bank: Arc<ChannelBank>,
    configs: [ChannelConfig; CHANNELS],
    running: bool,
}

impl<I: EdgeInput> PpmDecoder<I> {
    pub fn new(input: I) -> Self {
        PpmDecoder {
            input,
            bank: Arc::new(ChannelBank::new()),
            configs: [ChannelConfig::default(); CHANNELS],
            running: false,
        }
    }

    pub fn configure(&mut self, ch: usize, config: ChannelConfig) -> Result<()> {
        let slot = self.configs.get_mut(ch).ok_or(Error::ChannelIndex(ch))?;
        *slot = config;
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        if self.running {
            return Ok(());
        }
        self.input.listen(EdgeHandler::new(Arc::clone(&self.bank)))?;
        self.running = true;
        log::info!("ppm capture started");
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        if !self.running {
            return Ok(());
        }
        self.input.silence()?;
        self.running = false;
        log::info!("ppm capture stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Shaped, dead-zoned value of channel `ch`, nominally -1..1.
    ///
    /// # Panics
    ///
    /// If `ch` is not below [`CHANNELS`].
    pub fn channel(&self, ch: usize) -> f64 {
        self.configs[ch].value(self.bank.width(ch))
    }

    pub fn pulse_duration(&self, ch: usize) -> Duration {
        self.bank.width(ch)
    }

    /// Time since the receiver last produced an edge. `None` until the first one.
    pub fn since_last_edge(&self) -> Option<Duration> {
        self.bank.last_edge().map(|t| Instant::now().saturating_duration_since(t))
    }

    pub fn input_mut(&mut self) -> &mut I {
        &mut self.input
    }
}
