//! Sound snapshot implementation
//!
//! Captures the negotiated formats and stream states of the wave endpoints so
//! an emulator save state can bring audio back the way it was. Buffered audio
//! is transient and never part of a snapshot.
//!
//! Snapshots are versioned and serialized using bincode with Serde.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use bincode::{decode_from_std_read, encode_into_std_write, Decode, Encode};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::SoundError;
use crate::params::PcmParams;
use crate::wavein::{RecordState, WaveIn};
use crate::waveout::{StreamState, WaveOut};

/// Current snapshot format version
pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

/// Errors that can occur during snapshot operations
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Deserialization error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("Incompatible snapshot version: found {0}, expected {1}")]
    IncompatibleVersion(u32, u32),

    #[error("Restore failed: {0}")]
    Restore(#[from] SoundError),
}

/// Wave output state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct WaveOutSnapshot {
    /// Parameters the emulated devices produce
    pub emulated: PcmParams,

    /// Parameters the host device ran at
    pub real: PcmParams,

    /// Stream state when captured
    pub state: StreamState,
}

/// Wave input state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct WaveInSnapshot {
    /// Capture parameters, if recording was ever started
    pub params: Option<PcmParams>,

    /// Record state when captured
    pub state: RecordState,
}

/// Snapshot of the sound endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct SoundSnapshot {
    /// Snapshot format version
    pub version: u32,

    pub waveout: Option<WaveOutSnapshot>,

    pub wavein: Option<WaveInSnapshot>,
}

fn config() -> bincode::config::Configuration {
    bincode::config::standard()
}

impl SoundSnapshot {
    /// Record the current state of both wave endpoints
    pub fn capture(waveout: &dyn WaveOut, wavein: &dyn WaveIn) -> Self {
        SoundSnapshot {
            version: CURRENT_SNAPSHOT_VERSION,
            waveout: Some(WaveOutSnapshot {
                emulated: waveout.emulated_params(),
                real: waveout.real_params(),
                state: waveout.state(),
            }),
            wavein: Some(WaveInSnapshot {
                params: wavein.params(),
                state: wavein.state(),
            }),
        }
    }

    /// Bring open endpoints back to the captured parameters and states
    ///
    /// Endpoints must already be open; a closed endpoint is left untouched.
    pub fn restore(&self, waveout: &dyn WaveOut, wavein: &dyn WaveIn) -> Result<(), SnapshotError> {
        if let Some(out) = &self.waveout {
            if waveout.state() != StreamState::Closed
                && matches!(out.state, StreamState::ParamsSet | StreamState::Streaming)
            {
                waveout.set_params(out.emulated)?;
                if out.state == StreamState::Streaming {
                    waveout.start()?;
                }
                debug!("Wave output restored to {} ({})", out.state, out.emulated);
            }
        }

        if let Some(input) = &self.wavein {
            match (wavein.state(), input.state, input.params) {
                (RecordState::Closed, _, _) => {}
                (_, RecordState::Recording, Some(params)) => {
                    wavein.start_record(params)?;
                    debug!("Wave input restored to recording ({})", params);
                }
                (RecordState::Recording, _, _) => wavein.stop_record()?,
                _ => {}
            }
        }

        Ok(())
    }

    /// Serialize the snapshot into `writer`
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<(), SnapshotError> {
        encode_into_std_write(self, writer, config())?;
        Ok(())
    }

    /// Deserialize a snapshot from `reader`, rejecting other format versions
    pub fn load<R: Read>(reader: &mut R) -> Result<Self, SnapshotError> {
        let snapshot: SoundSnapshot = decode_from_std_read(reader, config())?;
        if snapshot.version != CURRENT_SNAPSHOT_VERSION {
            return Err(SnapshotError::IncompatibleVersion(
                snapshot.version,
                CURRENT_SNAPSHOT_VERSION,
            ));
        }
        Ok(snapshot)
    }

    /// Save the snapshot to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SnapshotError> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        self.save(&mut writer)?;
        writer.flush()?;
        info!("Sound snapshot written to {}", path.as_ref().display());
        Ok(())
    }

    /// Load a snapshot from a file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, SnapshotError> {
        let mut reader = BufReader::new(File::open(path.as_ref())?);
        let snapshot = Self::load(&mut reader)?;
        info!("Sound snapshot loaded from {}", path.as_ref().display());
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HostBackend, MemoryBackend};
    use crate::wavein::{BackedWaveIn, CapturedAudio, ManualTimer};
    use crate::waveout::BackedWaveOut;
    use pretty_assertions::assert_eq;

    fn endpoints() -> (BackedWaveOut, BackedWaveIn) {
        let mut backend = MemoryBackend::new();
        let waveout = BackedWaveOut::new(backend.playback().unwrap());
        let wavein = BackedWaveIn::new(backend.capture().unwrap(), Box::new(ManualTimer::default()));
        waveout.open("default").unwrap();
        wavein
            .open("default", Box::new(|_n: usize, _c: &mut CapturedAudio<'_>| {}))
            .unwrap();
        (waveout, wavein)
    }

    #[test]
    fn snapshot_restores_formats_and_states() {
        let (waveout, wavein) = endpoints();
        let emulated = PcmParams::new(22050, 8, 1);
        let record = PcmParams::new(11025, 16, 1);
        waveout.set_params(emulated).unwrap();
        waveout.start().unwrap();
        wavein.start_record(record).unwrap();

        let snapshot = SoundSnapshot::capture(&waveout, &wavein);
        let mut data = Vec::new();
        snapshot.save(&mut data).unwrap();

        let (fresh_out, fresh_in) = endpoints();
        let loaded = SoundSnapshot::load(&mut data.as_slice()).unwrap();
        assert_eq!(loaded, snapshot);
        loaded.restore(&fresh_out, &fresh_in).unwrap();

        assert_eq!(fresh_out.emulated_params(), emulated);
        assert_eq!(fresh_out.state(), StreamState::Streaming);
        assert_eq!(fresh_in.params(), Some(record));
        assert_eq!(fresh_in.state(), RecordState::Recording);
    }

    #[test]
    fn restore_stops_recording_not_in_snapshot() {
        let (waveout, wavein) = endpoints();
        let snapshot = SoundSnapshot::capture(&waveout, &wavein);

        wavein.start_record(PcmParams::default()).unwrap();
        snapshot.restore(&waveout, &wavein).unwrap();
        assert_eq!(wavein.state(), RecordState::Open);
        assert_eq!(waveout.state(), StreamState::Open);
    }

    #[test]
    fn other_versions_are_rejected() {
        let snapshot = SoundSnapshot {
            version: CURRENT_SNAPSHOT_VERSION + 1,
            waveout: None,
            wavein: None,
        };
        let mut data = Vec::new();
        snapshot.save(&mut data).unwrap();
        match SoundSnapshot::load(&mut data.as_slice()) {
            Err(SnapshotError::IncompatibleVersion(found, expected)) => {
                assert_eq!((found, expected), (CURRENT_SNAPSHOT_VERSION + 1, CURRENT_SNAPSHOT_VERSION));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn truncated_data_fails_to_load() {
        let (waveout, wavein) = endpoints();
        let mut data = Vec::new();
        SoundSnapshot::capture(&waveout, &wavein).save(&mut data).unwrap();
        data.truncate(data.len() / 2);
        assert!(SoundSnapshot::load(&mut data.as_slice()).is_err());
    }
}
