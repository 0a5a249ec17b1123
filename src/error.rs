use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// DShot has no timing table for this speed.
    #[error("unsupported dshot speed {0} (expected 150, 300, 600 or 1200)")]
    UnsupportedSpeed(u32),

    #[error("dshot checksum mismatch in {word:#06x}: expected {expected:#x}, found {found:#x}")]
    Checksum { word: u16, expected: u16, found: u16 },

    /// The ESC queue was full and the channel drops on overflow.
    #[error("esc queue full, frame dropped")]
    QueueFull,

    #[error("esc channel closed")]
    ChannelClosed,

    #[error("receiver channel {0} out of range (0-15)")]
    ChannelIndex(usize),

    #[error("gpio: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("config io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config format: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
