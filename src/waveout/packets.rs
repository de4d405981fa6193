//! Source draining pushed packets from the playback pool

use std::sync::Arc;

use log::trace;
use parking_lot::Mutex;

use super::WaveSource;
use crate::buffer::{AudioBufferPool, MAX_PACKET_SIZE};
use crate::error::{Result, SoundError};
use crate::params::PcmParams;

/// Pushed packets plus the format the mixer currently expects
///
/// Packets keep the format they were pushed in. A packet whose format differs
/// from the mix format is converted when it reaches the head of the queue.
#[derive(Debug)]
pub struct PacketQueue {
    pool: AudioBufferPool,
    mix_params: PcmParams,
}

impl PacketQueue {
    /// Create an empty queue mixing in `mix_params`
    pub fn new(mix_params: PcmParams) -> Self {
        PacketQueue {
            pool: AudioBufferPool::new(),
            mix_params,
        }
    }

    /// Queue one packet in its own format
    pub fn push(&mut self, data: &[u8], params: PcmParams) -> Result<()> {
        if data.len() > MAX_PACKET_SIZE {
            return Err(SoundError::PacketTooLarge(data.len()));
        }
        self.pool.new_buffer(data.len(), params)?.write(data);
        trace!("Queued {} byte wave packet ({} bytes pending)", data.len(), self.pending_bytes());
        Ok(())
    }

    /// Change the format drained bytes are delivered in
    pub fn set_mix_params(&mut self, params: PcmParams) {
        self.mix_params = params;
    }

    /// Unread bytes across queued packets, each in its own format
    pub fn pending_bytes(&self) -> usize {
        self.pool.pending_bytes()
    }

    /// Drop every queued packet
    pub fn clear(&mut self) {
        self.pool.clear();
    }

    /// Drain up to `out.len()` bytes in the mix format
    pub fn drain_into(&mut self, out: &mut [u8]) -> usize {
        let mix_params = self.mix_params;
        let mut filled = 0;
        while filled < out.len() {
            let Some(packet) = self.pool.current_buffer() else {
                break;
            };
            if *packet.params() != mix_params {
                *packet = packet.converted(mix_params);
            }
            filled += packet.read(&mut out[filled..]);
            if packet.is_drained() {
                self.pool.pop_buffer();
            }
        }
        filled
    }
}

/// Wave source fed by `WaveOut::send_wave_packet`
pub struct PacketSource {
    queue: Arc<Mutex<PacketQueue>>,
}

impl PacketSource {
    /// Create a source reading from `queue`
    pub fn new(queue: Arc<Mutex<PacketQueue>>) -> Self {
        PacketSource { queue }
    }
}

impl WaveSource for PacketSource {
    fn fill(&mut self, _rate: u16, buffer: &mut [u8]) -> usize {
        self.queue.lock().drain_into(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn drains_pool_in_order_and_reports_shortfall() {
        let params = PcmParams::default();
        let queue = Arc::new(Mutex::new(PacketQueue::new(params)));
        queue.lock().push(&[1, 2, 3], params).unwrap();
        queue.lock().push(&[4, 5], params).unwrap();

        let mut source = PacketSource::new(Arc::clone(&queue));
        let mut buf = [0u8; 4];
        assert_eq!(source.fill(44100, &mut buf), 4);
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(source.fill(44100, &mut buf), 1);
        assert_eq!(buf[0], 5);
        assert_eq!(queue.lock().pending_bytes(), 0);
    }

    #[test]
    fn packets_are_read_in_their_own_format() {
        let narrow = PcmParams::new(8000, 8, 1);
        let mut queue = PacketQueue::new(narrow);
        queue.push(&[0xFF, 0x00], narrow).unwrap();
        queue.push(&0x1234i16.to_le_bytes(), PcmParams::new(8000, 16, 1)).unwrap();

        queue.set_mix_params(PcmParams::new(8000, 16, 1));
        let mut out = [0u8; 6];
        assert_eq!(queue.drain_into(&mut out), 6);
        let samples: Vec<i16> = out
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(samples, vec![0x7F00, i16::MIN, 0x1234]);
    }
}
