//! Wave output endpoint
//!
//! Several emulated devices register pull sources with one output endpoint.
//! When the host backend asks for a period of audio, the endpoint pulls every
//! source, mixes the contributions in the emulated format and converts the
//! result to the format the host device runs at.

mod backed;
mod mixer;
mod packets;
mod registry;

pub use backed::*;
pub use mixer::*;
pub use packets::*;
pub use registry::*;

use std::fmt;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::params::{PcmParams, MAX_VOLUME};

/// Lifecycle of an output endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum StreamState {
    /// No host device held
    Closed,

    /// Host device acquired, emulated parameters not set yet
    Open,

    /// Emulated parameters negotiated
    ParamsSet,

    /// Host backend is pulling periods
    Streaming,
}

impl StreamState {
    /// Lower-case name for messages
    pub fn name(&self) -> &'static str {
        match self {
            StreamState::Closed => "closed",
            StreamState::Open => "open",
            StreamState::ParamsSet => "configured",
            StreamState::Streaming => "streaming",
        }
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An emulated device contributing audio to the output stream
pub trait WaveSource: Send {
    /// Fill `buffer` with emulated-format bytes for a host running at `rate`,
    /// returning how many bytes were written. The rest counts as silence.
    fn fill(&mut self, rate: u16, buffer: &mut [u8]) -> usize;

    /// Per-channel mixing volume, same encoding as `PcmParams::volume`
    fn volume(&self) -> u16 {
        MAX_VOLUME
    }
}

impl<F> WaveSource for F
where
    F: FnMut(u16, &mut [u8]) -> usize + Send,
{
    fn fill(&mut self, rate: u16, buffer: &mut [u8]) -> usize {
        self(rate, buffer)
    }
}

/// Wave output endpoint operations
///
/// Sources are called while the endpoint's mixing lock is held, so a source
/// must not call back into the endpoint it is registered with.
pub trait WaveOut: Send + Sync {
    /// Acquire the host playback device
    fn open(&self, device: &str) -> Result<()>;

    /// Set the parameters emulated devices produce
    fn set_params(&self, params: PcmParams) -> Result<()>;

    /// Begin streaming without waiting for the first pull
    fn start(&self) -> Result<()>;

    /// Register a pull source, returning its slot id
    fn register_source(&self, source: Box<dyn WaveSource>) -> Result<SourceId>;

    /// Free a slot; no-op if already empty
    fn unregister_source(&self, id: SourceId);

    /// Queue a pushed packet described by `params` for playback
    fn send_wave_packet(&self, data: &[u8], params: &PcmParams) -> Result<()>;

    /// Fill `out` with one period of mixed, real-format audio
    fn pull_and_deliver(&self, out: &mut [u8]) -> Result<usize>;

    /// Pull `len` bytes and hand them to a push-mode host device
    fn output_period(&self, len: usize) -> Result<()>;

    /// Bytes for 0.1s of audio at the real parameters
    fn packet_size(&self) -> usize;

    /// Current lifecycle state
    fn state(&self) -> StreamState;

    /// Parameters emulated devices produce
    fn emulated_params(&self) -> PcmParams;

    /// Parameters the host device runs at
    fn real_params(&self) -> PcmParams;

    /// Release the host device; always succeeds
    fn close(&self);
}
