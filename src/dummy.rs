//! Dummy endpoints
//!
//! Used when no host audio device is available. Every operation succeeds and
//! does nothing.

use crate::buffer::MAX_PACKET_SIZE;
use crate::error::Result;
use crate::midi::MidiOut;
use crate::params::PcmParams;
use crate::wavein::{record_packet_size, RecordHandler, RecordState, WaveIn};
use crate::waveout::{SourceId, StreamState, WaveOut, WaveSource};

/// Wave output that discards everything
#[derive(Debug, Default)]
pub struct DummyWaveOut;

impl WaveOut for DummyWaveOut {
    fn open(&self, _device: &str) -> Result<()> {
        Ok(())
    }

    fn set_params(&self, _params: PcmParams) -> Result<()> {
        Ok(())
    }

    fn start(&self) -> Result<()> {
        Ok(())
    }

    fn register_source(&self, _source: Box<dyn WaveSource>) -> Result<SourceId> {
        Ok(SourceId::default())
    }

    fn unregister_source(&self, _id: SourceId) {}

    fn send_wave_packet(&self, _data: &[u8], _params: &PcmParams) -> Result<()> {
        Ok(())
    }

    fn pull_and_deliver(&self, out: &mut [u8]) -> Result<usize> {
        out.fill(0);
        Ok(out.len())
    }

    fn output_period(&self, _len: usize) -> Result<()> {
        Ok(())
    }

    fn packet_size(&self) -> usize {
        PcmParams::default().bytes_for_tenths(1).min(MAX_PACKET_SIZE)
    }

    /// Always streaming, since every operation succeeds
    fn state(&self) -> StreamState {
        StreamState::Streaming
    }

    fn emulated_params(&self) -> PcmParams {
        PcmParams::default()
    }

    fn real_params(&self) -> PcmParams {
        PcmParams::default()
    }

    fn close(&self) {}
}

/// Wave input that never captures anything
#[derive(Debug, Default)]
pub struct DummyWaveIn;

impl WaveIn for DummyWaveIn {
    fn open(&self, _device: &str, _handler: Box<dyn RecordHandler>) -> Result<()> {
        Ok(())
    }

    fn start_record(&self, _params: PcmParams) -> Result<()> {
        Ok(())
    }

    fn on_timer_fired(&self) -> Result<usize> {
        Ok(0)
    }

    fn stop_record(&self) -> Result<()> {
        Ok(())
    }

    fn packet_size(&self) -> usize {
        record_packet_size(&PcmParams::default())
    }

    fn params(&self) -> Option<PcmParams> {
        None
    }

    /// Always open; nothing is ever recorded
    fn state(&self) -> RecordState {
        RecordState::Open
    }

    fn close(&self) {}
}

/// MIDI output that swallows every command
#[derive(Debug, Default)]
pub struct DummyMidiOut;

impl MidiOut for DummyMidiOut {
    fn open(&self, _device: &str) -> Result<()> {
        Ok(())
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn send(&self, _delta: u32, _command: u8, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_endpoints_accept_everything() {
        let waveout = DummyWaveOut;
        assert!(waveout.open("none").is_ok());
        assert!(waveout.set_params(PcmParams::new(8000, 8, 1)).is_ok());
        for _ in 0..5 {
            assert!(waveout
                .register_source(Box::new(|_rate: u16, _buf: &mut [u8]| -> usize { 0 }))
                .is_ok());
        }
        assert!(waveout.send_wave_packet(&[0; 64], &PcmParams::default()).is_ok());
        let mut out = [0x55u8; 16];
        assert_eq!(waveout.pull_and_deliver(&mut out).unwrap(), 16);
        assert_eq!(out, [0u8; 16]);

        let wavein = DummyWaveIn;
        assert!(wavein
            .open("none", Box::new(|_n: usize, _c: &mut crate::wavein::CapturedAudio<'_>| {}))
            .is_ok());
        assert!(wavein.start_record(PcmParams::default()).is_ok());
        assert_eq!(wavein.on_timer_fired().unwrap(), 0);
        assert!(wavein.stop_record().is_ok());
        assert_eq!(wavein.state(), RecordState::Open);
        assert_eq!(waveout.state(), StreamState::Streaming);

        let midi = DummyMidiOut;
        assert!(midi.is_ready());
        assert!(midi.send(0, 0x90, &[1, 2]).is_ok());
    }
}
