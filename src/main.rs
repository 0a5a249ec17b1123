use anyhow::{Context as _, Result};
use rppal::gpio::Gpio;
use std::env;

use omnivore::config::RobotConfig;
use omnivore::control::Context;
use omnivore::dshot::{SpinDelay, Transmitter};
use omnivore::esc::EscChannel;
use omnivore::hw::{EscPin, PpmPin};
use omnivore::logging;
use omnivore::ppm::PpmDecoder;

const CONFIG_PATH: &str = "omnivore.json";

fn main() -> Result<()> {
    logging::init();
    log::info!("omnivore start");

    let path = env::args().nth(1).unwrap_or_else(|| CONFIG_PATH.to_string());
    let config = RobotConfig::load_or_default(&path);
    config.validate().with_context(|| format!("invalid config in {}", path))?;

    let gpio = Gpio::new().context("could not open GPIO")?;

    let ppm_pin = PpmPin::new(&gpio, config.ppm_pin, config.ppm_edge)?;
    let mut receiver = PpmDecoder::new(ppm_pin);
    for (ch, channel_config) in config.receiver.iter().enumerate() {
        receiver.configure(ch, *channel_config)?;
    }
    receiver.start().context("could not start PPM capture")?;

    let transmitter = Transmitter::from_kbits(config.dshot_speed)?;
    let mut escs = Vec::new();
    for (i, &pin) in config.esc_pins.iter().enumerate() {
        let line = EscPin::new(&gpio, pin).with_context(|| format!("ESC #{} on GPIO {}", i, pin))?;
        escs.push(EscChannel::spawn(&format!("esc{}", i), transmitter, line, SpinDelay, &config.esc)?);
    }
    log::info!("dshot{} started on {} ESCs", transmitter.speed().kbits(), escs.len());

    let mut ctx = Context::new(receiver, escs, config);
    ctx.prepare_escs()?;

    let outcome = ctx.run();
    if let Err(e) = &outcome {
        log::error!("control loop failed: {}", e);
    }
    ctx.shutdown()?;
    outcome.map_err(Into::into)
}
