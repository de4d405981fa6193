//! MIDI output endpoint
//!
//! Timed MIDI commands pass straight through to the host device; nothing is
//! buffered or converted here.

use log::{info, warn};
use parking_lot::Mutex;

use crate::backend::MidiBackend;
use crate::error::{BackendError, Result};

/// MIDI output endpoint operations
pub trait MidiOut: Send + Sync {
    /// Acquire the host MIDI device
    fn open(&self, device: &str) -> Result<()>;

    /// Whether the device accepts another command now
    fn is_ready(&self) -> bool;

    /// Send one command with `delta` ticks since the previous one
    fn send(&self, delta: u32, command: u8, data: &[u8]) -> Result<()>;

    /// Release the device; always succeeds
    fn close(&self);
}

struct MidiPort {
    device: Box<dyn MidiBackend>,
    open: bool,
}

/// MIDI endpoint driving a `MidiBackend`
pub struct BackedMidiOut {
    port: Mutex<MidiPort>,
}

impl BackedMidiOut {
    /// Create a closed endpoint around a MIDI device handle
    pub fn new(device: Box<dyn MidiBackend>) -> Self {
        BackedMidiOut {
            port: Mutex::new(MidiPort {
                device,
                open: false,
            }),
        }
    }
}

impl MidiOut for BackedMidiOut {
    fn open(&self, device: &str) -> Result<()> {
        let mut port = self.port.lock();
        if !port.open {
            port.device.open(device)?;
            port.open = true;
            info!("MIDI output '{}' opened", device);
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        let port = self.port.lock();
        port.open && port.device.is_ready()
    }

    fn send(&self, delta: u32, command: u8, data: &[u8]) -> Result<()> {
        let mut port = self.port.lock();
        if !port.open {
            return Err(BackendError::NotOpen.into());
        }
        if !port.device.is_ready() {
            warn!("MIDI command {:02X} dropped, device busy", command);
            return Err(BackendError::Busy.into());
        }
        port.device.send(delta, command, data)?;
        Ok(())
    }

    fn close(&self) {
        let mut port = self.port.lock();
        if port.open {
            port.device.close();
            port.open = false;
            info!("MIDI output closed");
        }
    }
}

impl Drop for BackedMidiOut {
    fn drop(&mut self) {
        self.close();
    }
}
