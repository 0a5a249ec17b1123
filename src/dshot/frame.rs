use crate::error::{Error, Result};

/// Highest value that fits the 11-bit field.
pub const MAX_VALUE: u16 = 0x07FF;
/// Values below this are commands, not throttle.
pub const MIN_THROTTLE: u16 = 48;

/// ESC commands sent in place of a throttle value.
///
/// Commands are only honored while the motor is stopped, and the
/// stateful ones (see [`Command::needs_repeat`]) only after the ESC has seen
/// [`COMMAND_REPEAT`] identical frames in a row with the telemetry bit set.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    MotorStop = 0,
    Beacon1 = 1,
    Beacon2 = 2,
    Beacon3 = 3,
    Beacon4 = 4,
    Beacon5 = 5,
    EscInfo = 6,
    SpinDirection1 = 7,
    SpinDirection2 = 8,
    Mode3dOff = 9,
    Mode3dOn = 10,
    SettingsRequest = 11,
    SaveSettings = 12,
    SpinDirectionNormal = 13,
    SpinDirectionReversed = 14,
    Led0On = 15,
    Led1On = 16,
    Led2On = 17,
    Led3On = 18,
    Led0Off = 19,
    Led1Off = 20,
    Led2Off = 21,
    Led3Off = 22,
    AudioStream = 23,
    SilentMode = 24,
}

/// Consecutive identical frames an ESC needs before acting on a stateful command.
pub const COMMAND_REPEAT: usize = 10;

impl Command {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn needs_repeat(self) -> bool {
        matches!(
            self,
            Command::SpinDirection1
                | Command::SpinDirection2
                | Command::Mode3dOff
                | Command::Mode3dOn
                | Command::SaveSettings
                | Command::SpinDirectionNormal
                | Command::SpinDirectionReversed
        )
    }

    /// The frame for this command, telemetry bit set.
    pub fn frame(self) -> Frame {
        Frame::new(self.code(), true)
    }
}

/// A logical DShot frame before it is put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Frame {
    pub value: u16,
    pub telemetry: bool,
}

fn checksum(frame: u16) -> u16 {
    (frame ^ (frame >> 4) ^ (frame >> 8)) & 0x0F
}

impl Frame {
    pub fn new(value: u16, telemetry: bool) -> Self {
        Frame { value, telemetry }
    }

    pub fn throttle(value: u16) -> Self {
        Frame::new(value, false)
    }

    pub fn is_throttle(&self) -> bool {
        self.value >= MIN_THROTTLE
    }

    /// Packs the frame into its 16-bit wire word, checksum in the low nibble.
    ///
    /// Values above [`MAX_VALUE`] are a caller bug; their upper bits are
    /// dropped.
    pub fn encode(&self) -> u16 {
        debug_assert!(self.value <= MAX_VALUE, "dshot value {} out of range", self.value);
        let frame = ((self.value & MAX_VALUE) << 1) | self.telemetry as u16;
        (frame << 4) | checksum(frame)
    }

    pub fn decode(word: u16) -> Result<Self> {
        let frame = word >> 4;
        let expected = checksum(frame);
        let found = word & 0x0F;
        if expected != found {
            return Err(Error::Checksum { word, expected, found });
        }
        Ok(Frame {
            value: frame >> 1,
            telemetry: frame & 1 == 1,
        })
    }
}
