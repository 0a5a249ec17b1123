use std::time::Duration;

use crate::error::{Error, Result};

/// Line low time after the last bit of every frame.
pub const FRAME_GUARD: Duration = Duration::from_micros(20);

/// DShot bitrate in kbit/s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speed {
    DShot150,
    DShot300,
    DShot600,
    DShot1200,
}

/// High then low time of one bit symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    pub high: Duration,
    pub low: Duration,
}

impl Symbol {
    const fn ns(high: u64, low: u64) -> Self {
        Symbol {
            high: Duration::from_nanos(high),
            low: Duration::from_nanos(low),
        }
    }

    pub fn period(&self) -> Duration {
        self.high + self.low
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitTiming {
    pub zero: Symbol,
    pub one: Symbol,
}

impl BitTiming {
    pub fn symbol(&self, bit: bool) -> Symbol {
        if bit { self.one } else { self.zero }
    }

    /// Time on the wire for 16 bits plus the guard.
    pub fn frame_duration(&self, word: u16) -> Duration {
        (0..16)
            .map(|i| self.symbol((word >> i) & 1 == 1).period())
            .sum::<Duration>()
            + FRAME_GUARD
    }
}

impl Speed {
    pub fn kbits(&self) -> u32 {
        match self {
            Speed::DShot150 => 150,
            Speed::DShot300 => 300,
            Speed::DShot600 => 600,
            Speed::DShot1200 => 1200,
        }
    }

    pub fn timing(&self) -> BitTiming {
        match self {
            Speed::DShot150 => BitTiming {
                zero: Symbol::ns(2495, 4172),
                one: Symbol::ns(4990, 1677),
            },
            Speed::DShot300 => BitTiming {
                zero: Symbol::ns(1248, 2086),
                one: Symbol::ns(2495, 838),
            },
            Speed::DShot600 => BitTiming {
                zero: Symbol::ns(624, 1043),
                one: Symbol::ns(1248, 419),
            },
            Speed::DShot1200 => BitTiming {
                zero: Symbol::ns(312, 521),
                one: Symbol::ns(624, 210),
            },
        }
    }
}

impl TryFrom<u32> for Speed {
    type Error = Error;

    fn try_from(kbits: u32) -> Result<Self> {
        match kbits {
            150 => Ok(Speed::DShot150),
            300 => Ok(Speed::DShot300),
            600 => Ok(Speed::DShot600),
            1200 => Ok(Speed::DShot1200),
            other => Err(Error::UnsupportedSpeed(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Speed; 4] = [Speed::DShot150, Speed::DShot300, Speed::DShot600, Speed::DShot1200];

    #[test]
    fn unknown_speed_is_rejected() {
        assert!(matches!(Speed::try_from(450), Err(Error::UnsupportedSpeed(450))));
        assert!(matches!(Speed::try_from(0), Err(Error::UnsupportedSpeed(0))));
        assert_eq!(Speed::try_from(600).unwrap(), Speed::DShot600);
    }

    #[test]
    fn dshot600_matches_wire_table() {
        let t = Speed::DShot600.timing();
        assert_eq!(t.one, Symbol::ns(1248, 419));
        assert_eq!(t.zero, Symbol::ns(624, 1043));
    }

    #[test]
    fn one_is_longer_high_than_zero() {
        for speed in ALL {
            let t = speed.timing();
            assert!(t.one.high > t.zero.high, "{:?}", speed);
            assert!(t.one.low < t.zero.low, "{:?}", speed);
            // zero low time must not mirror its high time
            assert_ne!(t.zero.low, t.zero.high, "{:?}", speed);
        }
    }

    #[test]
    fn timings_shrink_with_speed() {
        for pair in ALL.windows(2) {
            let (slow, fast) = (pair[0].timing(), pair[1].timing());
            let ratio = slow.one.period().as_nanos() as f64 / fast.one.period().as_nanos() as f64;
            assert!((ratio - 2.0).abs() < 0.01, "{:?} -> {:?}: {}", pair[0], pair[1], ratio);
        }
    }

    #[test]
    fn dshot600_frame_fits_in_fifty_micros() {
        let t = Speed::DShot600.timing();
        // 16 bits of 1667 ns each regardless of value, plus the guard
        assert_eq!(t.frame_duration(0x0000), t.frame_duration(0xFFFF));
        assert_eq!(t.frame_duration(0x830B), Duration::from_nanos(16 * 1667) + FRAME_GUARD);
    }
}
