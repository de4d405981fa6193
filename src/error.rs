//! Error types for the lowlevel sound layer
//!
//! Internally errors carry a kind (capacity, device, state). Across the public
//! surface every operation is still two-valued: it either succeeds or fails,
//! and `status` maps a result onto the numeric OK/ERR codes.

use thiserror::Error;

use crate::buffer::MAX_PACKET_SIZE;

/// Numeric result code for success
pub const SOUNDLOW_OK: u32 = 0;

/// Numeric result code for any failure
pub const SOUNDLOW_ERR: u32 = 1;

/// Errors reported by host backend collaborators
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Device unavailable: {0}")]
    Unavailable(String),

    #[error("Device rejected parameters: {0}")]
    Rejected(String),

    #[error("Device not open")]
    NotOpen,

    #[error("Device busy")]
    Busy,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur in the wave/MIDI endpoints
#[derive(Error, Debug)]
pub enum SoundError {
    #[error("Packet of {0} bytes exceeds the {limit} byte limit", limit = MAX_PACKET_SIZE)]
    PacketTooLarge(usize),

    #[error("All {0} wave source slots are occupied")]
    NoFreeSlot(usize),

    #[error("Device error: {0}")]
    Device(#[from] BackendError),

    #[error("Unsupported PCM parameters: {0}")]
    UnsupportedParams(String),

    #[error("{op} is not valid while the endpoint is {state}")]
    InvalidState {
        op: &'static str,
        state: &'static str,
    },
}

/// Coarse classification of a `SoundError`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Buffer too large or no free slot
    Capacity,

    /// Host backend failure
    Device,

    /// Operation invalid in the current lifecycle state
    State,
}

impl SoundError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SoundError::PacketTooLarge(_) | SoundError::NoFreeSlot(_) => ErrorKind::Capacity,
            SoundError::Device(_) | SoundError::UnsupportedParams(_) => ErrorKind::Device,
            SoundError::InvalidState { .. } => ErrorKind::State,
        }
    }
}

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, SoundError>;

/// Map a result onto `SOUNDLOW_OK` / `SOUNDLOW_ERR`
pub fn status<T>(result: &Result<T>) -> u32 {
    match result {
        Ok(_) => SOUNDLOW_OK,
        Err(_) => SOUNDLOW_ERR,
    }
}
