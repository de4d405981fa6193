//! In-memory loopback backend
//!
//! Records everything played, serves injected bytes to capture, and logs MIDI
//! traffic. All handles share one state so a test (or the demo binary) can
//! inspect what the endpoints did.

use std::collections::VecDeque;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use super::{CaptureBackend, HostBackend, MidiBackend, PlaybackBackend};
use crate::error::BackendError;
use crate::params::PcmParams;

/// One MIDI command as received by the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiEvent {
    pub delta: u32,
    pub command: u8,
    pub data: Vec<u8>,
}

struct MemoryState {
    playback_params: PcmParams,
    playback_open: bool,
    fail_open: bool,
    played: Vec<u8>,

    capture: VecDeque<u8>,
    capture_open: bool,
    capture_params: Option<PcmParams>,

    midi_open: bool,
    midi_ready: bool,
    midi: Vec<MidiEvent>,
}

/// Loopback backend whose handles share one in-memory state
#[derive(Clone)]
pub struct MemoryBackend {
    shared: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a backend whose playback device runs at the default parameters
    pub fn new() -> Self {
        MemoryBackend {
            shared: Arc::new(Mutex::new(MemoryState {
                playback_params: PcmParams::default(),
                playback_open: false,
                fail_open: false,
                played: Vec::new(),
                capture: VecDeque::new(),
                capture_open: false,
                capture_params: None,
                midi_open: false,
                midi_ready: true,
                midi: Vec::new(),
            })),
        }
    }

    /// Configure the parameters the playback device reports on open
    pub fn with_playback_params(self, params: PcmParams) -> Self {
        self.shared.lock().playback_params = params;
        self
    }

    /// Make every device open fail
    pub fn set_fail_open(&self, fail: bool) {
        self.shared.lock().fail_open = fail;
    }

    /// Bytes delivered to the playback device so far
    pub fn played(&self) -> Vec<u8> {
        self.shared.lock().played.clone()
    }

    /// Whether the playback device is held open
    pub fn is_playback_open(&self) -> bool {
        self.shared.lock().playback_open
    }

    /// Queue bytes for the capture device to hand out
    pub fn push_capture(&self, bytes: &[u8]) {
        self.shared.lock().capture.extend(bytes.iter().copied());
    }

    /// Parameters capture was started with, while capturing
    pub fn capture_params(&self) -> Option<PcmParams> {
        self.shared.lock().capture_params
    }

    /// Whether the capture device is held open
    pub fn is_capture_open(&self) -> bool {
        self.shared.lock().capture_open
    }

    /// Toggle whether the MIDI device accepts commands
    pub fn set_midi_ready(&self, ready: bool) {
        self.shared.lock().midi_ready = ready;
    }

    /// MIDI commands received so far
    pub fn midi_events(&self) -> Vec<MidiEvent> {
        self.shared.lock().midi.clone()
    }
}

impl HostBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn playback(&mut self) -> Option<Box<dyn PlaybackBackend>> {
        Some(Box::new(MemoryPlayback { shared: Arc::clone(&self.shared) }))
    }

    fn capture(&mut self) -> Option<Box<dyn CaptureBackend>> {
        Some(Box::new(MemoryCapture { shared: Arc::clone(&self.shared) }))
    }

    fn midi(&mut self) -> Option<Box<dyn MidiBackend>> {
        Some(Box::new(MemoryMidi { shared: Arc::clone(&self.shared) }))
    }
}

struct MemoryPlayback {
    shared: Arc<Mutex<MemoryState>>,
}

impl PlaybackBackend for MemoryPlayback {
    fn open(&mut self, device: &str) -> Result<PcmParams, BackendError> {
        let mut state = self.shared.lock();
        if state.fail_open {
            return Err(BackendError::Unavailable(device.to_string()));
        }
        state.playback_open = true;
        debug!("Memory playback device '{}' opened at {}", device, state.playback_params);
        Ok(state.playback_params)
    }

    fn output(&mut self, data: &[u8]) -> Result<(), BackendError> {
        let mut state = self.shared.lock();
        if !state.playback_open {
            return Err(BackendError::NotOpen);
        }
        state.played.extend_from_slice(data);
        Ok(())
    }

    fn close(&mut self) {
        self.shared.lock().playback_open = false;
    }
}

struct MemoryCapture {
    shared: Arc<Mutex<MemoryState>>,
}

impl CaptureBackend for MemoryCapture {
    fn open(&mut self, device: &str) -> Result<(), BackendError> {
        let mut state = self.shared.lock();
        if state.fail_open {
            return Err(BackendError::Unavailable(device.to_string()));
        }
        state.capture_open = true;
        Ok(())
    }

    fn start(&mut self, params: &PcmParams) -> Result<(), BackendError> {
        let mut state = self.shared.lock();
        if !state.capture_open {
            return Err(BackendError::NotOpen);
        }
        state.capture_params = Some(*params);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut state = self.shared.lock();
        if state.capture_params.is_none() {
            return 0;
        }
        let count = buf.len().min(state.capture.len());
        for (dst, src) in buf.iter_mut().zip(state.capture.drain(..count)) {
            *dst = src;
        }
        count
    }

    fn stop(&mut self) {
        self.shared.lock().capture_params = None;
    }

    fn close(&mut self) {
        let mut state = self.shared.lock();
        state.capture_params = None;
        state.capture_open = false;
    }
}

struct MemoryMidi {
    shared: Arc<Mutex<MemoryState>>,
}

impl MidiBackend for MemoryMidi {
    fn open(&mut self, device: &str) -> Result<(), BackendError> {
        let mut state = self.shared.lock();
        if state.fail_open {
            return Err(BackendError::Unavailable(device.to_string()));
        }
        state.midi_open = true;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        let state = self.shared.lock();
        state.midi_open && state.midi_ready
    }

    fn send(&mut self, delta: u32, command: u8, data: &[u8]) -> Result<(), BackendError> {
        let mut state = self.shared.lock();
        if !state.midi_open {
            return Err(BackendError::NotOpen);
        }
        if !state.midi_ready {
            return Err(BackendError::Busy);
        }
        state.midi.push(MidiEvent {
            delta,
            command,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn close(&mut self) {
        self.shared.lock().midi_open = false;
    }
}
