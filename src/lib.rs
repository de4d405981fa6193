//! RustySoundlow - lowlevel sound plumbing for emulators
//!
//! Emulated sound devices produce PCM audio in whatever format they model.
//! This crate mixes those streams, converts them to the format the host audio
//! device runs at and hands them over in periods, captures host input on a
//! timer, and passes MIDI commands through. When no host device is usable,
//! dummy endpoints take over so the emulator keeps running silently.

pub mod backend;
pub mod buffer;
pub mod config;
pub mod convert;
pub mod driver;
pub mod dummy;
pub mod error;
pub mod midi;
pub mod params;
pub mod snapshot;
pub mod wavein;
pub mod waveout;

pub use buffer::{AudioBufferPool, AudioPacket, MAX_PACKET_SIZE};
pub use config::{DriverKind, SoundConfig};
pub use convert::{ConversionRatio, Converter};
pub use driver::SoundDriver;
pub use error::{status, ErrorKind, Result, SoundError, SOUNDLOW_ERR, SOUNDLOW_OK};
pub use midi::MidiOut;
pub use params::PcmParams;
pub use snapshot::SoundSnapshot;
pub use wavein::{CapturedAudio, RecordHandler, RecordState, WaveIn};
pub use waveout::{SourceId, StreamState, WaveOut, WaveSource, MAX_WAVE_SOURCES};
