use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::dshot::Speed;
use crate::error::{Error, Result};
use crate::esc::EscConfig;
use crate::hw::Edge;
use crate::ppm::{CHANNELS, ChannelConfig};

/// Which receiver channel feeds which control input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelMap {
    pub x: usize,
    pub y: usize,
    pub rotation: usize,
}

impl Default for ChannelMap {
    fn default() -> Self {
        ChannelMap { x: 0, y: 1, rotation: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// DShot bitrate in kbit/s: 150, 300, 600 or 1200.
    pub dshot_speed: u32,
    /// GPIO numbers, front-left then clockwise.
    pub esc_pins: [u8; 4],
    pub esc: EscConfig,
    pub ppm_pin: u8,
    pub ppm_edge: Edge,
    /// Per receiver channel, by index. Missing entries use defaults.
    pub receiver: Vec<ChannelConfig>,
    pub channels: ChannelMap,
    pub loop_period_us: u64,
    /// Motors go to neutral when the receiver has been silent this long.
    pub receiver_timeout_ms: u64,
    /// Put the ESCs in 3D mode and save it at start-up.
    pub enable_3d: bool,
}

impl Default for RobotConfig {
    fn default() -> Self {
        RobotConfig {
            dshot_speed: 600,
            esc_pins: [13, 12, 11, 10],
            esc: EscConfig::default(),
            ppm_pin: 9,
            ppm_edge: Edge::Falling,
            receiver: vec![ChannelConfig::default(); CHANNELS],
            channels: ChannelMap::default(),
            loop_period_us: 2000,
            receiver_timeout_ms: 500,
            enable_3d: true,
        }
    }
}

impl RobotConfig {
    pub fn speed(&self) -> Result<Speed> {
        Speed::try_from(self.dshot_speed)
    }

    pub fn validate(&self) -> Result<()> {
        self.speed()?;
        if self.receiver.len() > CHANNELS {
            return Err(Error::ChannelIndex(self.receiver.len() - 1));
        }
        let ChannelMap { x, y, rotation } = self.channels;
        for ch in [x, y, rotation] {
            if ch >= CHANNELS {
                return Err(Error::ChannelIndex(ch));
            }
        }
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: RobotConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = fs::File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Loads `path`, falling back to defaults when it is missing or
    /// unreadable, and writes the result back so the file always exists.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let config = match Self::load(path) {
            Ok(config) => {
                log::info!("loaded {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("error loading {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        };
        if let Err(e) = config.save(path) {
            log::warn!("could not write {}: {}", path.display(), e);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::esc::Overflow;
    use crate::ppm::Shaping;
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("omnivore-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn defaults_are_valid() {
        let config = RobotConfig::default();
        config.validate().unwrap();
        assert_eq!(config.speed().unwrap(), Speed::DShot600);
        assert_eq!(config.receiver.len(), CHANNELS);
    }

    #[test]
    fn bad_speed_is_a_config_error() {
        let config = RobotConfig { dshot_speed: 500, ..Default::default() };
        assert!(matches!(config.validate(), Err(Error::UnsupportedSpeed(500))));
    }

    #[test]
    fn bad_channel_map_is_rejected() {
        let config = RobotConfig {
            channels: ChannelMap { rotation: 16, ..Default::default() },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::ChannelIndex(16))));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let json = r#"{
            "dshot_speed": 300,
            "esc": { "overflow": "Drop", "refresh_ms": null },
            "receiver": [ { "shaping": "Square" }, {}, {}, { "shaping": "Trinary", "dead_zone": 0.2 } ]
        }"#;
        let config: RobotConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.speed().unwrap(), Speed::DShot300);
        assert_eq!(config.esc.overflow, Overflow::Drop);
        assert_eq!(config.esc.refresh_ms, None);
        assert_eq!(config.esc.queue_depth, 10);
        assert_eq!(config.receiver[0].shaping, Shaping::Square);
        assert_eq!(config.receiver[0].dead_zone, 0.12);
        assert_eq!(config.receiver[3].dead_zone, 0.2);
        assert_eq!(config.receiver[3].min_us, 1000);
        assert_eq!(config.esc_pins, [13, 12, 11, 10]);
    }

    #[test]
    fn save_then_load() {
        let path = scratch("save");
        let mut config = RobotConfig::default();
        config.dshot_speed = 1200;
        config.receiver[6] = ChannelConfig::with_shaping(Shaping::Logarithmic);
        config.save(&path).unwrap();

        let loaded = RobotConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_writes_defaults() {
        let path = scratch("missing");
        let _ = fs::remove_file(&path);
        let config = RobotConfig::load_or_default(&path);
        assert_eq!(config, RobotConfig::default());
        assert!(path.exists());
        fs::remove_file(&path).unwrap();
    }
}
