//! Lowlevel sound driver facade
//!
//! The driver hands at most one instance of each endpoint to the emulator.
//! Endpoints are built on first access from the host backend; a dummy driver
//! (or a backend lacking a device kind) yields the dummy endpoints instead.

use std::sync::Arc;

use log::{info, warn};

use crate::backend::{HostBackend, MemoryBackend, RawFileBackend};
use crate::config::{DriverKind, SoundConfig};
use crate::dummy::{DummyMidiOut, DummyWaveIn, DummyWaveOut};
use crate::midi::{BackedMidiOut, MidiOut};
use crate::wavein::{BackedWaveIn, ManualTimer, PeriodicTimer, RecordHandler, WaveIn};
use crate::waveout::{BackedWaveOut, WaveOut};

/// Facade exposing the wave output, wave input and MIDI endpoints
pub struct SoundDriver {
    /// Host backend, `None` for the dummy driver
    backend: Option<Box<dyn HostBackend>>,

    /// Trigger handed to the wave input endpoint
    record_timer: Option<Box<dyn PeriodicTimer>>,

    /// Wave output, once created
    waveout: Option<Arc<dyn WaveOut>>,

    /// Wave input, once created
    wavein: Option<Arc<dyn WaveIn>>,

    /// MIDI output, once created
    midiout: Option<Arc<dyn MidiOut>>,
}

impl SoundDriver {
    /// Create a driver over a host backend
    pub fn new(backend: Box<dyn HostBackend>) -> Self {
        info!("Sound driver '{}' selected", backend.name());
        SoundDriver {
            backend: Some(backend),
            record_timer: None,
            waveout: None,
            wavein: None,
            midiout: None,
        }
    }

    /// Create the dummy driver
    pub fn dummy() -> Self {
        SoundDriver {
            backend: None,
            record_timer: None,
            waveout: None,
            wavein: None,
            midiout: None,
        }
    }

    /// Create the driver named by `config`, falling back to dummy for unknown names
    pub fn from_config(config: &SoundConfig) -> Self {
        match config.driver_kind() {
            Ok(DriverKind::Dummy) => Self::dummy(),
            Ok(DriverKind::File) => Self::new(Box::new(RawFileBackend::new(config.real))),
            Ok(DriverKind::Memory) => {
                Self::new(Box::new(MemoryBackend::new().with_playback_params(config.real)))
            }
            Err(err) => {
                warn!("{}, using dummy driver", err);
                Self::dummy()
            }
        }
    }

    /// Use `timer` as the wave input's periodic trigger
    pub fn with_record_timer(mut self, timer: Box<dyn PeriodicTimer>) -> Self {
        self.record_timer = Some(timer);
        self
    }

    /// Backend name, or "dummy"
    pub fn name(&self) -> &str {
        self.backend.as_ref().map_or("dummy", |backend| backend.name())
    }

    /// Whether this is the dummy driver
    pub fn is_dummy(&self) -> bool {
        self.backend.is_none()
    }

    /// The wave output endpoint
    pub fn waveout(&mut self) -> Arc<dyn WaveOut> {
        if let Some(waveout) = &self.waveout {
            return Arc::clone(waveout);
        }
        let waveout: Arc<dyn WaveOut> = match self.backend.as_mut().and_then(|b| b.playback()) {
            Some(device) => Arc::new(BackedWaveOut::new(device)),
            None => Arc::new(DummyWaveOut),
        };
        self.waveout = Some(Arc::clone(&waveout));
        waveout
    }

    /// The wave input endpoint
    pub fn wavein(&mut self) -> Arc<dyn WaveIn> {
        if let Some(wavein) = &self.wavein {
            return Arc::clone(wavein);
        }
        let wavein: Arc<dyn WaveIn> = match self.backend.as_mut().and_then(|b| b.capture()) {
            Some(device) => {
                let timer = self
                    .record_timer
                    .take()
                    .unwrap_or_else(|| Box::new(ManualTimer::default()));
                Arc::new(BackedWaveIn::new(device, timer))
            }
            None => Arc::new(DummyWaveIn),
        };
        self.wavein = Some(Arc::clone(&wavein));
        wavein
    }

    /// The MIDI output endpoint
    pub fn midiout(&mut self) -> Arc<dyn MidiOut> {
        if let Some(midiout) = &self.midiout {
            return Arc::clone(midiout);
        }
        let midiout: Arc<dyn MidiOut> = match self.backend.as_mut().and_then(|b| b.midi()) {
            Some(device) => Arc::new(BackedMidiOut::new(device)),
            None => Arc::new(DummyMidiOut),
        };
        self.midiout = Some(Arc::clone(&midiout));
        midiout
    }

    /// Open the wave output, replacing it with the dummy endpoint on failure
    pub fn open_waveout(&mut self, device: &str) -> Arc<dyn WaveOut> {
        let waveout = self.waveout();
        if let Err(err) = waveout.open(device) {
            warn!("Wave output '{}' unavailable ({}), sound output disabled", device, err);
            let dummy: Arc<dyn WaveOut> = Arc::new(DummyWaveOut);
            self.waveout = Some(Arc::clone(&dummy));
            return dummy;
        }
        waveout
    }

    /// Open the wave input, replacing it with the dummy endpoint on failure
    pub fn open_wavein(&mut self, device: &str, handler: Box<dyn RecordHandler>) -> Arc<dyn WaveIn> {
        let wavein = self.wavein();
        if let Err(err) = wavein.open(device, handler) {
            warn!("Wave input '{}' unavailable ({}), sound input disabled", device, err);
            let dummy: Arc<dyn WaveIn> = Arc::new(DummyWaveIn);
            self.wavein = Some(Arc::clone(&dummy));
            return dummy;
        }
        wavein
    }

    /// Open the MIDI output, replacing it with the dummy endpoint on failure
    pub fn open_midiout(&mut self, device: &str) -> Arc<dyn MidiOut> {
        let midiout = self.midiout();
        if let Err(err) = midiout.open(device) {
            warn!("MIDI output '{}' unavailable ({}), MIDI disabled", device, err);
            let dummy: Arc<dyn MidiOut> = Arc::new(DummyMidiOut);
            self.midiout = Some(Arc::clone(&dummy));
            return dummy;
        }
        midiout
    }

    /// Close every endpoint created so far
    pub fn close_all(&mut self) {
        if let Some(waveout) = &self.waveout {
            waveout.close();
        }
        if let Some(wavein) = &self.wavein {
            wavein.close();
        }
        if let Some(midiout) = &self.midiout {
            midiout.close();
        }
    }
}

impl Drop for SoundDriver {
    fn drop(&mut self) {
        self.close_all();
    }
}
