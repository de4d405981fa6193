//! Sound configuration
//!
//! Selects the lowlevel driver and the device identifiers handed to each
//! endpoint when it is opened.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::params::PcmParams;

/// Lowlevel drivers known to this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Stubs for every endpoint
    Dummy,

    /// Raw PCM file output
    File,

    /// In-memory loopback
    Memory,
}

impl FromStr for DriverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dummy" | "none" => Ok(DriverKind::Dummy),
            "file" => Ok(DriverKind::File),
            "memory" | "loopback" => Ok(DriverKind::Memory),
            other => Err(format!("unknown sound driver '{}'", other)),
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DriverKind::Dummy => "dummy",
            DriverKind::File => "file",
            DriverKind::Memory => "memory",
        })
    }
}

/// Driver selection and device identifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    /// Driver name, see `DriverKind`
    pub driver: String,

    /// Wave output device (output path for the file driver)
    pub waveout: String,

    /// Wave input device
    pub wavein: String,

    /// MIDI output device
    pub midiout: String,

    /// Parameters emulated devices produce
    pub emulated: PcmParams,

    /// Parameters the host device is configured for
    pub real: PcmParams,
}

impl Default for SoundConfig {
    fn default() -> Self {
        SoundConfig {
            driver: DriverKind::Dummy.to_string(),
            waveout: String::from("default"),
            wavein: String::from("default"),
            midiout: String::from("default"),
            emulated: PcmParams::default(),
            real: PcmParams::default(),
        }
    }
}

impl SoundConfig {
    /// Parsed driver kind
    pub fn driver_kind(&self) -> Result<DriverKind, String> {
        self.driver.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_dummy_driver() {
        let config = SoundConfig::default();
        assert_eq!(config.driver_kind(), Ok(DriverKind::Dummy));
        assert_eq!(config.emulated, PcmParams::default());
    }

    #[test]
    fn driver_names_parse_case_insensitively() {
        assert_eq!("FILE".parse::<DriverKind>(), Ok(DriverKind::File));
        assert_eq!("loopback".parse::<DriverKind>(), Ok(DriverKind::Memory));
        assert!("alsa".parse::<DriverKind>().is_err());
    }
}
