//! Audio buffer pool
//!
//! A FIFO of bounded PCM packets handed from a producer to a consumer. The
//! pool exclusively owns every queued packet; a consumer reads the oldest
//! packet in place and pops it once drained.

use std::collections::VecDeque;

use log::trace;

use crate::convert::Converter;
use crate::error::{Result, SoundError};
use crate::params::PcmParams;

/// Largest packet the pool accepts, enough for 0.1s of audio at 48kHz/16-bit/stereo
pub const MAX_PACKET_SIZE: usize = 19200;

/// One bounded chunk of PCM bytes
#[derive(Debug)]
pub struct AudioPacket {
    /// Packet storage, `capacity` bytes long
    data: Vec<u8>,

    /// Bytes filled by the producer
    write_pos: usize,

    /// Bytes already taken by the consumer
    read_pos: usize,

    /// Format of the bytes, fixed at creation
    params: PcmParams,
}

impl AudioPacket {
    fn new(size: usize, params: PcmParams) -> Self {
        AudioPacket {
            data: vec![0; size],
            write_pos: 0,
            read_pos: 0,
            params,
        }
    }

    /// Total capacity in bytes
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes filled so far
    pub fn len(&self) -> usize {
        self.write_pos
    }

    /// Whether nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.write_pos == 0
    }

    /// Format of the packet
    pub fn params(&self) -> &PcmParams {
        &self.params
    }

    /// Append bytes, returning how many fit
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let count = bytes.len().min(self.capacity() - self.write_pos);
        self.data[self.write_pos..self.write_pos + count].copy_from_slice(&bytes[..count]);
        self.write_pos += count;
        count
    }

    /// Unfilled tail of the packet, for producers that write in place
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.write_pos..]
    }

    /// Mark `count` bytes of the spare tail as filled
    pub fn commit(&mut self, count: usize) {
        self.write_pos = (self.write_pos + count).min(self.capacity());
    }

    /// Filled bytes the consumer has not taken yet
    pub fn unread(&self) -> &[u8] {
        &self.data[self.read_pos..self.write_pos]
    }

    /// Copy unread bytes into `out`, returning how many were taken
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let count = out.len().min(self.write_pos - self.read_pos);
        out[..count].copy_from_slice(&self.data[self.read_pos..self.read_pos + count]);
        self.read_pos += count;
        count
    }

    /// Whether every filled byte has been taken
    pub fn is_drained(&self) -> bool {
        self.read_pos >= self.write_pos
    }

    /// New packet holding the unread bytes converted to `params`
    pub fn converted(&self, params: PcmParams) -> AudioPacket {
        let data = Converter::new(self.params, params).convert_to_vec(self.unread());
        AudioPacket {
            write_pos: data.len(),
            read_pos: 0,
            data,
            params,
        }
    }
}

/// FIFO of audio packets
#[derive(Debug, Default)]
pub struct AudioBufferPool {
    packets: VecDeque<AudioPacket>,
}

impl AudioBufferPool {
    /// Create an empty pool
    pub fn new() -> Self {
        AudioBufferPool {
            packets: VecDeque::new(),
        }
    }

    /// Allocate a zeroed packet of `size` bytes as the new tail
    pub fn new_buffer(&mut self, size: usize, params: PcmParams) -> Result<&mut AudioPacket> {
        if size > MAX_PACKET_SIZE {
            return Err(SoundError::PacketTooLarge(size));
        }

        self.packets.push_back(AudioPacket::new(size, params));
        trace!("Queued {} byte packet ({} queued)", size, self.packets.len());

        let tail = self.packets.len() - 1;
        Ok(&mut self.packets[tail])
    }

    /// Oldest packet, left in the queue
    pub fn current_buffer(&mut self) -> Option<&mut AudioPacket> {
        self.packets.front_mut()
    }

    /// Release the oldest packet; no-op on an empty pool
    pub fn pop_buffer(&mut self) {
        self.packets.pop_front();
    }

    /// Number of queued packets
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Whether no packets are queued
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Unread bytes across all queued packets
    pub fn pending_bytes(&self) -> usize {
        self.packets.iter().map(|p| p.unread().len()).sum()
    }

    /// Drop every queued packet
    pub fn clear(&mut self) {
        self.packets.clear();
    }

    /// Drain up to `out.len()` bytes in FIFO order, popping drained packets
    pub fn drain_into(&mut self, out: &mut [u8]) -> usize {
        let mut filled = 0;
        while filled < out.len() {
            let Some(packet) = self.current_buffer() else {
                break;
            };
            filled += packet.read(&mut out[filled..]);
            if packet.is_drained() {
                self.pop_buffer();
            }
        }
        filled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn packet_size_limit_is_inclusive() {
        let mut pool = AudioBufferPool::new();
        assert!(pool.new_buffer(MAX_PACKET_SIZE, PcmParams::default()).is_ok());
        let err = pool.new_buffer(MAX_PACKET_SIZE + 1, PcmParams::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capacity);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn packets_come_out_in_enqueue_order() {
        let mut pool = AudioBufferPool::new();
        for i in 0..10u8 {
            let packet = pool.new_buffer(4 + i as usize, PcmParams::default()).unwrap();
            assert!(packet.data.iter().all(|&b| b == 0));
            packet.write(&[i; 4]);
        }

        let mut seen = Vec::new();
        while let Some(packet) = pool.current_buffer() {
            seen.push(packet.unread()[0]);
            pool.pop_buffer();
        }
        assert_eq!(seen, (0..10).collect::<Vec<u8>>());
    }

    #[test]
    fn pop_on_empty_pool_is_noop() {
        let mut pool = AudioBufferPool::new();
        pool.pop_buffer();
        assert!(pool.current_buffer().is_none());
        assert!(pool.is_empty());
    }

    #[test]
    fn write_never_exceeds_capacity() {
        let mut pool = AudioBufferPool::new();
        let packet = pool.new_buffer(3, PcmParams::default()).unwrap();
        assert_eq!(packet.write(&[1, 2, 3, 4, 5]), 3);
        assert_eq!(packet.len(), packet.capacity());
        assert_eq!(packet.write(&[6]), 0);
    }

    #[test]
    fn drain_spans_packets_and_keeps_partial_head() {
        let mut pool = AudioBufferPool::new();
        pool.new_buffer(4, PcmParams::default()).unwrap().write(&[1, 2, 3, 4]);
        pool.new_buffer(4, PcmParams::default()).unwrap().write(&[5, 6, 7, 8]);

        let mut out = [0u8; 6];
        assert_eq!(pool.drain_into(&mut out), 6);
        assert_eq!(out, [1, 2, 3, 4, 5, 6]);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.pending_bytes(), 2);

        let mut rest = [0u8; 8];
        assert_eq!(pool.drain_into(&mut rest), 2);
        assert_eq!(&rest[..2], &[7, 8]);
        assert!(pool.is_empty());
    }
}
