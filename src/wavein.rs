//! Wave input endpoint
//!
//! Capture runs on an external periodic trigger. Each time it fires, the
//! endpoint pulls one packet from the host capture device into the record
//! pool and offers it to the single registered record handler. Whatever the
//! handler does not claim is dropped, so capture never waits on the emulated
//! device and never replays old bytes.

use std::fmt;

use bincode::{Decode, Encode};
use log::{debug, info, trace};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::backend::CaptureBackend;
use crate::buffer::{AudioBufferPool, MAX_PACKET_SIZE};
use crate::error::{Result, SoundError};
use crate::params::PcmParams;

/// Lifecycle of an input endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum RecordState {
    Closed,
    Open,
    Recording,
}

impl RecordState {
    /// Lower-case name for messages
    pub fn name(&self) -> &'static str {
        match self {
            RecordState::Closed => "closed",
            RecordState::Open => "open",
            RecordState::Recording => "recording",
        }
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Periodic trigger owned by the emulator's timer subsystem
pub trait PeriodicTimer: Send {
    /// Fire `WaveIn::on_timer_fired` every `period_us` microseconds
    fn activate(&mut self, period_us: u64);

    /// Stop firing
    fn deactivate(&mut self);
}

/// Timer that only records its period; the embedder drives `on_timer_fired`
#[derive(Debug, Default)]
pub struct ManualTimer {
    period_us: Option<u64>,
}

impl ManualTimer {
    /// Period requested by the endpoint, while active
    pub fn period_us(&self) -> Option<u64> {
        self.period_us
    }
}

impl PeriodicTimer for ManualTimer {
    fn activate(&mut self, period_us: u64) {
        debug!("Record timer armed every {}us", period_us);
        self.period_us = Some(period_us);
    }

    fn deactivate(&mut self) {
        self.period_us = None;
    }
}

/// Captured bytes offered to the record handler for one trigger
pub struct CapturedAudio<'a> {
    pool: &'a mut AudioBufferPool,
    params: PcmParams,
    claimed: usize,
}

impl CapturedAudio<'_> {
    /// Unclaimed bytes available now
    pub fn available(&self) -> usize {
        self.pool.pending_bytes()
    }

    /// Format of the captured bytes
    pub fn params(&self) -> &PcmParams {
        &self.params
    }

    /// Claim up to `buf.len()` bytes in capture order
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let count = self.pool.drain_into(buf);
        self.claimed += count;
        count
    }

    /// Bytes claimed so far during this trigger
    pub fn claimed(&self) -> usize {
        self.claimed
    }
}

/// Emulated device consuming captured audio
///
/// Called with the endpoint lock held; must not call back into the endpoint.
pub trait RecordHandler: Send {
    /// `available` bytes were captured; claim what is wanted from `capture`
    fn on_record(&mut self, available: usize, capture: &mut CapturedAudio<'_>);
}

impl<F> RecordHandler for F
where
    F: FnMut(usize, &mut CapturedAudio<'_>) + Send,
{
    fn on_record(&mut self, available: usize, capture: &mut CapturedAudio<'_>) {
        self(available, capture)
    }
}

/// Wave input endpoint operations
pub trait WaveIn: Send + Sync {
    /// Acquire the host capture device and install the record handler
    fn open(&self, device: &str, handler: Box<dyn RecordHandler>) -> Result<()>;

    /// Start capturing and arm the periodic trigger
    fn start_record(&self, params: PcmParams) -> Result<()>;

    /// Periodic trigger entry point; returns the bytes the handler claimed
    fn on_timer_fired(&self) -> Result<usize>;

    /// Stop capturing and disarm the trigger
    fn stop_record(&self) -> Result<()>;

    /// Capture packet size for the current parameters
    fn packet_size(&self) -> usize;

    /// Capture parameters, while recording
    fn params(&self) -> Option<PcmParams>;

    /// Current lifecycle state
    fn state(&self) -> RecordState;

    /// Release the capture device from any state
    fn close(&self);
}

/// Bytes captured per trigger: 0.1s of audio, capped at the packet limit
pub fn record_packet_size(params: &PcmParams) -> usize {
    params.bytes_for_tenths(1).min(MAX_PACKET_SIZE)
}

/// Trigger period in microseconds for a given packet size
pub fn record_period_us(params: &PcmParams, packet_size: usize) -> u64 {
    let bytes_per_second = params.sample_rate as u64 * params.frame_size() as u64;
    if bytes_per_second == 0 {
        return 0;
    }
    packet_size as u64 * 1_000_000 / bytes_per_second
}

struct Recorder {
    state: RecordState,
    device: Box<dyn CaptureBackend>,
    timer: Box<dyn PeriodicTimer>,
    handler: Option<Box<dyn RecordHandler>>,
    params: PcmParams,
    packet_size: usize,
}

impl Recorder {
    fn halt(&mut self, pool: &mut AudioBufferPool) {
        self.timer.deactivate();
        self.device.stop();
        pool.clear();
        self.state = RecordState::Open;
    }
}

/// Input endpoint driving a `CaptureBackend`
pub struct BackedWaveIn {
    recorder: Mutex<Recorder>,
    pool: Mutex<AudioBufferPool>,
}

impl BackedWaveIn {
    /// Create a closed endpoint around a capture device and trigger
    pub fn new(device: Box<dyn CaptureBackend>, timer: Box<dyn PeriodicTimer>) -> Self {
        let params = PcmParams::default();
        BackedWaveIn {
            recorder: Mutex::new(Recorder {
                state: RecordState::Closed,
                device,
                timer,
                handler: None,
                params,
                packet_size: record_packet_size(&params),
            }),
            pool: Mutex::new(AudioBufferPool::new()),
        }
    }
}

impl WaveIn for BackedWaveIn {
    fn open(&self, device: &str, handler: Box<dyn RecordHandler>) -> Result<()> {
        let mut recorder = self.recorder.lock();
        if recorder.state == RecordState::Closed {
            recorder.device.open(device)?;
            recorder.state = RecordState::Open;
            info!("Wave input '{}' opened", device);
        }
        recorder.handler = Some(handler);
        Ok(())
    }

    fn start_record(&self, params: PcmParams) -> Result<()> {
        let mut recorder = self.recorder.lock();
        let state = recorder.state;
        match state {
            RecordState::Closed => {
                return Err(SoundError::InvalidState {
                    op: "start_record",
                    state: state.name(),
                })
            }
            RecordState::Recording => recorder.halt(&mut self.pool.lock()),
            RecordState::Open => {}
        }
        if !params.is_supported() {
            return Err(SoundError::UnsupportedParams(params.to_string()));
        }

        recorder.device.start(&params)?;
        recorder.params = params;
        recorder.packet_size = record_packet_size(&params);
        let period = record_period_us(&params, recorder.packet_size);
        recorder.timer.activate(period);
        recorder.state = RecordState::Recording;
        info!(
            "Wave input recording {} ({} byte packets every {}us)",
            params, recorder.packet_size, period
        );
        Ok(())
    }

    fn on_timer_fired(&self) -> Result<usize> {
        let mut recorder = self.recorder.lock();
        if recorder.state != RecordState::Recording {
            trace!("Record trigger fired while {}", recorder.state);
            return Ok(0);
        }

        let recorder = &mut *recorder;
        let mut pool = self.pool.lock();
        let packet = pool.new_buffer(recorder.packet_size, recorder.params)?;
        let captured = recorder.device.read(packet.spare_mut());
        packet.commit(captured);

        let available = pool.pending_bytes();
        let mut capture = CapturedAudio {
            pool: &mut *pool,
            params: recorder.params,
            claimed: 0,
        };
        if let Some(handler) = recorder.handler.as_mut() {
            handler.on_record(available, &mut capture);
        }
        let claimed = capture.claimed;

        let dropped = pool.pending_bytes();
        if dropped > 0 {
            debug!("Dropping {} unclaimed capture bytes", dropped);
        }
        pool.clear();
        Ok(claimed)
    }

    fn stop_record(&self) -> Result<()> {
        let mut recorder = self.recorder.lock();
        let state = recorder.state;
        match state {
            RecordState::Closed => Err(SoundError::InvalidState {
                op: "stop_record",
                state: state.name(),
            }),
            RecordState::Open => Ok(()),
            RecordState::Recording => {
                recorder.halt(&mut self.pool.lock());
                info!("Wave input recording stopped");
                Ok(())
            }
        }
    }

    fn packet_size(&self) -> usize {
        self.recorder.lock().packet_size
    }

    fn params(&self) -> Option<PcmParams> {
        let recorder = self.recorder.lock();
        (recorder.state == RecordState::Recording).then_some(recorder.params)
    }

    fn state(&self) -> RecordState {
        self.recorder.lock().state
    }

    fn close(&self) {
        let mut recorder = self.recorder.lock();
        if recorder.state == RecordState::Recording {
            recorder.halt(&mut self.pool.lock());
        }
        if recorder.state == RecordState::Open {
            recorder.device.close();
            info!("Wave input closed");
        }
        recorder.handler = None;
        recorder.state = RecordState::Closed;
    }
}

impl Drop for BackedWaveIn {
    fn drop(&mut self) {
        self.close();
    }
}
