//! Raw PCM file backend
//!
//! Writes every delivered period to a file as headerless PCM in the
//! configured real format. The device identifier is the output path.

use std::fs::File;
use std::io::{BufWriter, Write};

use log::{info, warn};

use super::{CaptureBackend, HostBackend, MidiBackend, PlaybackBackend};
use crate::error::BackendError;
use crate::params::PcmParams;

/// Backend that renders playback into raw PCM files
pub struct RawFileBackend {
    params: PcmParams,
}

impl RawFileBackend {
    /// Create a backend writing files in `params` format
    pub fn new(params: PcmParams) -> Self {
        RawFileBackend { params }
    }
}

impl HostBackend for RawFileBackend {
    fn name(&self) -> &str {
        "file"
    }

    fn playback(&mut self) -> Option<Box<dyn PlaybackBackend>> {
        Some(Box::new(RawFilePlayback {
            params: self.params,
            writer: None,
            written: 0,
        }))
    }

    fn capture(&mut self) -> Option<Box<dyn CaptureBackend>> {
        None
    }

    fn midi(&mut self) -> Option<Box<dyn MidiBackend>> {
        None
    }
}

struct RawFilePlayback {
    params: PcmParams,
    writer: Option<BufWriter<File>>,
    written: u64,
}

impl PlaybackBackend for RawFilePlayback {
    fn open(&mut self, device: &str) -> Result<PcmParams, BackendError> {
        let file = File::create(device)?;
        self.writer = Some(BufWriter::new(file));
        self.written = 0;
        info!("Writing raw PCM ({}) to {}", self.params, device);
        Ok(self.params)
    }

    fn output(&mut self, data: &[u8]) -> Result<(), BackendError> {
        let writer = self.writer.as_mut().ok_or(BackendError::NotOpen)?;
        writer.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(err) = writer.flush() {
                warn!("Failed to flush raw PCM file: {}", err);
            }
            info!("Raw PCM file closed after {} bytes", self.written);
        }
    }
}
