//! Wave output endpoint backed by a host playback device
//!
//! Locking: the mixing lock is always taken before the conversion lock, and
//! the playback pool and device locks are innermost. `pull_and_deliver` holds
//! both outer locks for the whole pull/mix/convert sequence, so parameter
//! changes and (un)registrations never interleave with a period.

use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;

use super::mixer::Mixer;
use super::packets::{PacketQueue, PacketSource};
use super::registry::SourceId;
use super::{StreamState, WaveOut, WaveSource};
use crate::backend::PlaybackBackend;
use crate::buffer::MAX_PACKET_SIZE;
use crate::convert::{Converter, StreamConverter};
use crate::error::{Result, SoundError};
use crate::params::PcmParams;

/// Lifecycle and parameter pair, guarded by the conversion lock
struct ConversionState {
    state: StreamState,
    emulated: PcmParams,
    real: PcmParams,
    stream: StreamConverter,
}

impl ConversionState {
    fn ensure_open(&self, op: &'static str) -> Result<()> {
        if self.state == StreamState::Closed {
            return Err(SoundError::InvalidState {
                op,
                state: self.state.name(),
            });
        }
        Ok(())
    }
}

/// Mixer plus the lazily registered packet source, guarded by the mixing lock
struct MixingState {
    mixer: Mixer,
    packet_source: Option<SourceId>,
}

/// Output endpoint driving a `PlaybackBackend`
pub struct BackedWaveOut {
    mixing: Mutex<MixingState>,
    conversion: Mutex<ConversionState>,
    playback: Arc<Mutex<PacketQueue>>,
    device: Mutex<Box<dyn PlaybackBackend>>,
}

impl BackedWaveOut {
    /// Create a closed endpoint around a playback device handle
    pub fn new(device: Box<dyn PlaybackBackend>) -> Self {
        let params = PcmParams::default();
        BackedWaveOut {
            mixing: Mutex::new(MixingState {
                mixer: Mixer::new(),
                packet_source: None,
            }),
            conversion: Mutex::new(ConversionState {
                state: StreamState::Closed,
                emulated: params,
                real: params,
                stream: StreamConverter::new(Converter::new(params, params)),
            }),
            playback: Arc::new(Mutex::new(PacketQueue::new(params))),
            device: Mutex::new(device),
        }
    }

    /// Number of registered sources, including the packet source
    pub fn source_count(&self) -> usize {
        self.mixing.lock().mixer.registry.len()
    }

    /// Unread bytes waiting in the playback pool
    pub fn queued_bytes(&self) -> usize {
        self.playback.lock().pending_bytes()
    }

    fn ensure_packet_source(&self) -> Result<()> {
        let mut mixing = self.mixing.lock();
        if mixing.packet_source.is_none() {
            let source = PacketSource::new(Arc::clone(&self.playback));
            let id = mixing.mixer.registry.register(Box::new(source))?;
            debug!("Packet source registered as {}", id);
            mixing.packet_source = Some(id);
        }
        Ok(())
    }
}

impl WaveOut for BackedWaveOut {
    fn open(&self, device: &str) -> Result<()> {
        let mut conversion = self.conversion.lock();
        if conversion.state != StreamState::Closed {
            debug!("Wave output already open");
            return Ok(());
        }

        let mut handle = self.device.lock();
        let real = handle.open(device)?;
        if !real.is_supported() {
            handle.close();
            return Err(SoundError::UnsupportedParams(real.to_string()));
        }

        conversion.real = real;
        conversion.stream = StreamConverter::new(Converter::new(conversion.emulated, real));
        conversion.state = StreamState::Open;
        info!("Wave output '{}' opened ({})", device, real);
        Ok(())
    }

    fn set_params(&self, params: PcmParams) -> Result<()> {
        let mut conversion = self.conversion.lock();
        conversion.ensure_open("set_params")?;
        if !params.is_supported() {
            return Err(SoundError::UnsupportedParams(params.to_string()));
        }

        conversion.emulated = params;
        conversion.stream = StreamConverter::new(Converter::new(params, conversion.real));
        self.playback.lock().set_mix_params(params);
        if conversion.state == StreamState::Open {
            conversion.state = StreamState::ParamsSet;
        }
        debug!(
            "Wave output params: emulated {} -> real {} (ratio {:?})",
            params,
            conversion.real,
            conversion.stream.converter().ratio().parts()
        );
        Ok(())
    }

    fn start(&self) -> Result<()> {
        let mut conversion = self.conversion.lock();
        let state = conversion.state;
        match state {
            StreamState::ParamsSet => {
                conversion.state = StreamState::Streaming;
                info!("Wave output streaming");
                Ok(())
            }
            StreamState::Streaming => Ok(()),
            state => Err(SoundError::InvalidState {
                op: "start",
                state: state.name(),
            }),
        }
    }

    fn register_source(&self, source: Box<dyn WaveSource>) -> Result<SourceId> {
        let mut mixing = self.mixing.lock();
        self.conversion.lock().ensure_open("register_source")?;
        let id = mixing.mixer.registry.register(source)?;
        debug!("Wave source registered as {}", id);
        Ok(id)
    }

    fn unregister_source(&self, id: SourceId) {
        let mut mixing = self.mixing.lock();
        if mixing.mixer.registry.unregister(id) {
            debug!("Wave source {} unregistered", id);
        }
        if mixing.packet_source == Some(id) {
            mixing.packet_source = None;
        }
    }

    fn send_wave_packet(&self, data: &[u8], params: &PcmParams) -> Result<()> {
        if data.len() > MAX_PACKET_SIZE {
            return Err(SoundError::PacketTooLarge(data.len()));
        }
        if !params.is_supported() {
            return Err(SoundError::UnsupportedParams(params.to_string()));
        }

        self.conversion.lock().ensure_open("send_wave_packet")?;
        self.ensure_packet_source()?;
        self.playback.lock().push(data, *params)
    }

    fn pull_and_deliver(&self, out: &mut [u8]) -> Result<usize> {
        let mut mixing = self.mixing.lock();
        let mut conversion = self.conversion.lock();
        let silence = conversion.real.silence_byte();

        let state = conversion.state;
        match state {
            StreamState::Closed => {
                out.fill(silence);
                return Err(SoundError::InvalidState {
                    op: "pull_and_deliver",
                    state: state.name(),
                });
            }
            StreamState::Open => {
                out.fill(silence);
                return Ok(out.len());
            }
            StreamState::ParamsSet => {
                conversion.state = StreamState::Streaming;
                info!("Wave output streaming");
            }
            StreamState::Streaming => {}
        }

        let rate = conversion.real.sample_rate;
        let emulated = conversion.emulated;
        let needed = conversion.stream.input_len(out.len());
        let mixed = mixing.mixer.pull_and_mix(rate, &emulated, needed);
        let written = conversion.stream.convert_period(mixed, out);
        out[written..].fill(silence);
        Ok(out.len())
    }

    fn output_period(&self, len: usize) -> Result<()> {
        let mut period = vec![0u8; len];
        self.pull_and_deliver(&mut period)?;
        self.device.lock().output(&period)?;
        Ok(())
    }

    fn packet_size(&self) -> usize {
        self.conversion
            .lock()
            .real
            .bytes_for_tenths(1)
            .min(MAX_PACKET_SIZE)
    }

    fn state(&self) -> StreamState {
        self.conversion.lock().state
    }

    fn emulated_params(&self) -> PcmParams {
        self.conversion.lock().emulated
    }

    fn real_params(&self) -> PcmParams {
        self.conversion.lock().real
    }

    fn close(&self) {
        let _mixing = self.mixing.lock();
        let mut conversion = self.conversion.lock();
        if conversion.state == StreamState::Closed {
            return;
        }

        let dropped = {
            let mut pool = self.playback.lock();
            let pending = pool.pending_bytes();
            pool.clear();
            pending
        };
        if dropped > 0 {
            warn!("Wave output closed with {} bytes still queued", dropped);
        }

        self.device.lock().close();
        conversion.state = StreamState::Closed;
        info!("Wave output closed");
    }
}

impl Drop for BackedWaveOut {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HostBackend, MemoryBackend};
    use crate::error::ErrorKind;

    fn open_endpoint(real: PcmParams) -> (BackedWaveOut, MemoryBackend) {
        let mut backend = MemoryBackend::new().with_playback_params(real);
        let waveout = BackedWaveOut::new(backend.playback().unwrap());
        waveout.open("default").unwrap();
        (waveout, backend)
    }

    fn constant(value: i16) -> Box<dyn WaveSource> {
        Box::new(move |_rate: u16, buf: &mut [u8]| -> usize {
            for frame in buf.chunks_exact_mut(2) {
                frame.copy_from_slice(&value.to_le_bytes());
            }
            buf.len()
        })
    }

    #[test]
    fn lifecycle_follows_state_machine() {
        let (waveout, backend) = open_endpoint(PcmParams::default());
        assert_eq!(waveout.state(), StreamState::Open);
        assert!(backend.is_playback_open());

        waveout.set_params(PcmParams::default()).unwrap();
        assert_eq!(waveout.state(), StreamState::ParamsSet);

        let mut out = [0u8; 16];
        waveout.pull_and_deliver(&mut out).unwrap();
        assert_eq!(waveout.state(), StreamState::Streaming);

        waveout.close();
        waveout.close();
        assert_eq!(waveout.state(), StreamState::Closed);
        assert!(!backend.is_playback_open());

        waveout.open("default").unwrap();
        assert_eq!(waveout.state(), StreamState::Open);
    }

    #[test]
    fn operations_before_open_are_state_errors() {
        let mut backend = MemoryBackend::new();
        let waveout = BackedWaveOut::new(backend.playback().unwrap());
        let err = waveout.set_params(PcmParams::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
        assert_eq!(waveout.register_source(constant(0)).unwrap_err().kind(), ErrorKind::State);
        assert_eq!(waveout.start().unwrap_err().kind(), ErrorKind::State);

        let mut out = [0xAAu8; 8];
        assert!(waveout.pull_and_deliver(&mut out).is_err());
        assert_eq!(out, [0u8; 8]);
    }

    #[test]
    fn failed_open_is_device_error() {
        let mut backend = MemoryBackend::new();
        backend.set_fail_open(true);
        let waveout = BackedWaveOut::new(backend.playback().unwrap());
        assert_eq!(waveout.open("default").unwrap_err().kind(), ErrorKind::Device);
        assert_eq!(waveout.state(), StreamState::Closed);
    }

    #[test]
    fn explicit_start_enters_streaming() {
        let (waveout, _backend) = open_endpoint(PcmParams::default());
        assert!(waveout.start().is_err());
        waveout.set_params(PcmParams::new(22050, 8, 1)).unwrap();
        waveout.start().unwrap();
        assert_eq!(waveout.state(), StreamState::Streaming);
        waveout.set_params(PcmParams::default()).unwrap();
        assert_eq!(waveout.state(), StreamState::Streaming);
    }

    #[test]
    fn pull_in_open_state_delivers_silence() {
        let (waveout, _backend) = open_endpoint(PcmParams::default());
        waveout.register_source(constant(1234)).unwrap();
        let mut out = [0xAAu8; 8];
        assert_eq!(waveout.pull_and_deliver(&mut out).unwrap(), 8);
        assert_eq!(out, [0u8; 8]);
        assert_eq!(waveout.state(), StreamState::Open);
    }

    #[test]
    fn sources_are_mixed_and_converted() {
        let (waveout, _backend) = open_endpoint(PcmParams::default());
        waveout.set_params(PcmParams::new(44100, 16, 1)).unwrap();
        waveout.register_source(constant(1000)).unwrap();
        waveout.register_source(constant(-250)).unwrap();

        let mut out = [0u8; 16];
        waveout.pull_and_deliver(&mut out).unwrap();
        for sample in out.chunks_exact(2) {
            assert_eq!(i16::from_le_bytes([sample[0], sample[1]]), 750);
        }
    }

    #[test]
    fn source_receives_real_rate() {
        let (waveout, _backend) = open_endpoint(PcmParams::new(48000, 16, 2));
        waveout.set_params(PcmParams::new(8000, 8, 1)).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        waveout
            .register_source(Box::new(move |rate: u16, buf: &mut [u8]| -> usize {
                log.lock().push((rate, buf.len()));
                0
            }))
            .unwrap();

        let mut out = [0u8; 4800];
        waveout.pull_and_deliver(&mut out).unwrap();
        // 1200 real frames at 48kHz need 200 emulated 8-bit mono frames
        assert_eq!(*seen.lock(), vec![(48000, 200)]);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn pushed_packets_play_in_order() {
        let (waveout, backend) = open_endpoint(PcmParams::new(8000, 8, 1));
        waveout.set_params(PcmParams::new(8000, 8, 1)).unwrap();
        waveout.send_wave_packet(&[0x81, 0x82], &PcmParams::new(8000, 8, 1)).unwrap();
        waveout.send_wave_packet(&[0x83], &PcmParams::new(8000, 8, 1)).unwrap();
        assert_eq!(waveout.source_count(), 1);
        assert_eq!(waveout.queued_bytes(), 3);

        waveout.output_period(5).unwrap();
        assert_eq!(backend.played(), vec![0x81, 0x82, 0x83, 0x80, 0x80]);
        assert_eq!(waveout.queued_bytes(), 0);
    }

    #[test]
    fn pushed_packets_are_converted_to_emulated_format() {
        let (waveout, _backend) = open_endpoint(PcmParams::new(8000, 16, 1));
        waveout.set_params(PcmParams::new(8000, 16, 1)).unwrap();
        waveout.send_wave_packet(&[0xFF, 0x80], &PcmParams::new(8000, 8, 1)).unwrap();
        let mut out = [0u8; 4];
        waveout.pull_and_deliver(&mut out).unwrap();
        assert_eq!(out, [0x00, 0x7F, 0x00, 0x00]);
    }

    #[test]
    fn queued_packets_keep_their_format_across_param_changes() {
        let (waveout, backend) = open_endpoint(PcmParams::new(8000, 16, 1));
        waveout.set_params(PcmParams::new(8000, 8, 1)).unwrap();
        waveout.send_wave_packet(&[0xFF, 0x00], &PcmParams::new(8000, 8, 1)).unwrap();
        waveout.set_params(PcmParams::new(8000, 16, 1)).unwrap();

        waveout.output_period(4).unwrap();
        let played: Vec<i16> = backend
            .played()
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(played, vec![0x7F00, i16::MIN]);
    }

    #[test]
    fn resampled_pulls_track_the_exact_ratio() {
        let (waveout, _backend) = open_endpoint(PcmParams::new(44100, 16, 1));
        waveout.set_params(PcmParams::new(8000, 16, 1)).unwrap();
        let consumed = Arc::new(Mutex::new(0usize));
        let total = Arc::clone(&consumed);
        waveout
            .register_source(Box::new(move |_rate: u16, buf: &mut [u8]| -> usize {
                *total.lock() += buf.len() / 2;
                buf.len()
            }))
            .unwrap();

        let mut out = [0u8; 1024];
        for _ in 0..100 {
            waveout.pull_and_deliver(&mut out).unwrap();
        }
        // 51200 output frames at 44100Hz span 9287.98 frames at 8000Hz
        let consumed = *consumed.lock() as i64;
        assert!((consumed - 9288).abs() <= 1, "consumed {} source frames", consumed);
    }

    #[test]
    fn oversized_packet_is_rejected() {
        let (waveout, _backend) = open_endpoint(PcmParams::default());
        let data = vec![0u8; MAX_PACKET_SIZE + 1];
        let err = waveout.send_wave_packet(&data, &PcmParams::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capacity);
        assert!(waveout.send_wave_packet(&data[..MAX_PACKET_SIZE], &PcmParams::default()).is_ok());
    }

    #[test]
    fn packet_size_covers_a_tenth_of_a_second() {
        let (waveout, _backend) = open_endpoint(PcmParams::new(22050, 16, 2));
        assert_eq!(waveout.packet_size(), 8820);
        let (waveout, _backend) = open_endpoint(PcmParams::new(48000, 16, 2));
        assert_eq!(waveout.packet_size(), MAX_PACKET_SIZE);
    }
}
