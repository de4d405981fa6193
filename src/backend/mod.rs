//! Host audio backend collaborators
//!
//! A host backend hands out device handles for playback, capture and MIDI.
//! Handles report failures as `BackendError` values; nothing panics across
//! this boundary. Backends that cannot provide a device kind return `None`
//! and the driver falls back to the dummy endpoint for it.

mod file;
mod memory;

pub use file::*;
pub use memory::*;

use crate::error::BackendError;
use crate::params::PcmParams;

/// Playback device handle
pub trait PlaybackBackend: Send {
    /// Acquire the device, returning the parameters it is configured for
    fn open(&mut self, device: &str) -> Result<PcmParams, BackendError>;

    /// Accept one period of real-format bytes (push-mode devices only)
    fn output(&mut self, _data: &[u8]) -> Result<(), BackendError> {
        Ok(())
    }

    /// Release the device
    fn close(&mut self);
}

/// Capture device handle
pub trait CaptureBackend: Send {
    /// Acquire the device
    fn open(&mut self, device: &str) -> Result<(), BackendError>;

    /// Start capturing with the given parameters
    fn start(&mut self, params: &PcmParams) -> Result<(), BackendError>;

    /// Copy captured bytes into `buf`, returning how many were available
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Stop capturing
    fn stop(&mut self);

    /// Release the device
    fn close(&mut self);
}

/// MIDI output device handle
pub trait MidiBackend: Send {
    /// Acquire the device
    fn open(&mut self, device: &str) -> Result<(), BackendError>;

    /// Whether the device accepts another command now
    fn is_ready(&self) -> bool;

    /// Pass one timed command through unmodified
    fn send(&mut self, delta: u32, command: u8, data: &[u8]) -> Result<(), BackendError>;

    /// Release the device
    fn close(&mut self);
}

/// Factory for device handles of one host audio system
pub trait HostBackend: Send {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Playback handle, if the backend supports playback
    fn playback(&mut self) -> Option<Box<dyn PlaybackBackend>>;

    /// Capture handle, if the backend supports recording
    fn capture(&mut self) -> Option<Box<dyn CaptureBackend>>;

    /// MIDI handle, if the backend supports MIDI output
    fn midi(&mut self) -> Option<Box<dyn MidiBackend>>;
}
