//! RustySoundlow - tone renderer
//!
//! Drives the lowlevel sound layer the way an emulator would: a test tone is
//! registered as a wave source in the emulated format and the output endpoint
//! is asked for periods in the host format until the requested duration has
//! been delivered.

use std::f64::consts::TAU;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use rusty_soundlow::convert::write_sample;
use rusty_soundlow::{PcmParams, SoundConfig, SoundDriver, WaveOut, WaveSource};

/// Command line arguments for RustySoundlow
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Lowlevel driver: file, memory or dummy
    #[clap(long, default_value = "file")]
    driver: String,

    /// Wave output device (output path for the file driver)
    #[clap(short, long, default_value = "tone.pcm")]
    waveout: String,

    /// Emulated sample rate
    #[clap(long, default_value = "22050")]
    rate: u16,

    /// Emulated bits per sample (8 or 16)
    #[clap(long, default_value = "8")]
    bits: u8,

    /// Emulated channel count (1 or 2)
    #[clap(long, default_value = "1")]
    channels: u8,

    /// Host sample rate
    #[clap(long, default_value = "44100")]
    real_rate: u16,

    /// Seconds of audio to render
    #[clap(short, long, default_value = "2")]
    seconds: u32,

    /// Tone frequency in Hz
    #[clap(short, long, default_value = "440")]
    frequency: f64,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,
}

/// Sine wave produced in the emulated format
struct Tone {
    params: PcmParams,
    frequency: f64,
    phase: f64,
}

impl WaveSource for Tone {
    fn fill(&mut self, _rate: u16, buffer: &mut [u8]) -> usize {
        let sample_size = self.params.bytes_per_sample();
        let step = TAU * self.frequency / self.params.sample_rate as f64;
        let mut written = 0;
        for frame in buffer.chunks_exact_mut(self.params.frame_size()) {
            let value = (self.phase.sin() * 0.5 * i16::MAX as f64) as i32;
            for sample in frame.chunks_exact_mut(sample_size) {
                write_sample(value, sample, &self.params);
            }
            self.phase = (self.phase + step) % TAU;
            written += frame.len();
        }
        written
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    if args.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    info!("RustySoundlow starting...");

    let config = SoundConfig {
        driver: args.driver.clone(),
        waveout: args.waveout.clone(),
        emulated: PcmParams::new(args.rate, args.bits, args.channels),
        real: PcmParams::new(args.real_rate, 16, 2),
        ..SoundConfig::default()
    };

    let mut driver = SoundDriver::from_config(&config);
    let waveout = driver.open_waveout(&config.waveout);

    match render(waveout.as_ref(), &config, &args) {
        Ok(bytes) => {
            info!("Rendered {} bytes through the '{}' driver", bytes, driver.name());
            driver.close_all();
            Ok(())
        }
        Err(e) => {
            error!("Rendering error: {}", e);
            driver.close_all();
            Err(e)
        }
    }
}

/// Render the tone, returning the number of host-format bytes delivered
fn render(waveout: &dyn WaveOut, config: &SoundConfig, args: &Args) -> Result<usize> {
    waveout
        .set_params(config.emulated)
        .with_context(|| format!("Unsupported emulated format: {}", config.emulated))?;

    let tone = Tone {
        params: config.emulated,
        frequency: args.frequency,
        phase: 0.0,
    };
    let id = waveout
        .register_source(Box::new(tone))
        .context("Failed to register tone source")?;
    waveout.start().context("Failed to start wave output")?;

    let total = waveout.real_params().bytes_for_tenths(args.seconds * 10);
    let packet = waveout.packet_size().max(1);
    let mut delivered = 0;
    while delivered < total {
        let len = packet.min(total - delivered);
        waveout
            .output_period(len)
            .context("Failed to deliver output period")?;
        delivered += len;
    }

    waveout.unregister_source(id);
    Ok(delivered)
}
