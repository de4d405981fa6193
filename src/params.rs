//! PCM parameter descriptor
//!
//! Every stream handled by the lowlevel layer is described by a `PcmParams`
//! value: sample rate, bit depth, channel count, encoding tag and volume.
//! Two descriptors that compare equal describe byte-compatible streams.

use std::fmt;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Format tag bit: samples are signed
pub const FORMAT_SIGNED: u8 = 0x01;

/// Format tag bit: 16-bit samples are stored big-endian
pub const FORMAT_BIG_ENDIAN: u8 = 0x02;

/// Volume value for unity gain on both channels
pub const MAX_VOLUME: u16 = 0xFFFF;

/// PCM stream parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub struct PcmParams {
    /// Sample rate in Hz
    pub sample_rate: u16,

    /// Bits per sample (8 or 16)
    pub bits: u8,

    /// Channel count (1 or 2)
    pub channels: u8,

    /// Encoding tag, see `FORMAT_SIGNED` and `FORMAT_BIG_ENDIAN`
    pub format: u8,

    /// Volume, low byte = left gain, high byte = right gain (0xFF = unity)
    pub volume: u16,
}

impl Default for PcmParams {
    fn default() -> Self {
        PcmParams {
            sample_rate: 44100,
            bits: 16,
            channels: 2,
            format: FORMAT_SIGNED,
            volume: MAX_VOLUME,
        }
    }
}

impl PcmParams {
    /// Create parameters with signed samples (unsigned for 8-bit) at full volume
    pub fn new(sample_rate: u16, bits: u8, channels: u8) -> Self {
        let format = if bits == 8 { 0 } else { FORMAT_SIGNED };
        PcmParams {
            sample_rate,
            bits,
            channels,
            format,
            volume: MAX_VOLUME,
        }
    }

    /// Return a copy with a different volume
    pub fn with_volume(mut self, volume: u16) -> Self {
        self.volume = volume;
        self
    }

    /// Whether the descriptor names a layout this layer can process
    pub fn is_supported(&self) -> bool {
        matches!(self.bits, 8 | 16) && matches!(self.channels, 1 | 2) && self.sample_rate > 0
    }

    /// Bytes per single-channel sample
    #[inline]
    pub fn bytes_per_sample(&self) -> usize {
        if self.bits == 16 { 2 } else { 1 }
    }

    /// Bytes per frame (one sample for every channel)
    #[inline]
    pub fn frame_size(&self) -> usize {
        self.bytes_per_sample() * self.channels.max(1) as usize
    }

    /// Whether samples carry a sign
    #[inline]
    pub fn is_signed(&self) -> bool {
        (self.format & FORMAT_SIGNED) != 0
    }

    /// Whether 16-bit samples are big-endian
    #[inline]
    pub fn is_big_endian(&self) -> bool {
        (self.format & FORMAT_BIG_ENDIAN) != 0
    }

    /// Byte value representing silence in this format
    pub fn silence_byte(&self) -> u8 {
        if self.bits == 8 && !self.is_signed() { 0x80 } else { 0x00 }
    }

    /// Number of bytes holding `tenths` tenths of a second of audio
    pub fn bytes_for_tenths(&self, tenths: u32) -> usize {
        (self.sample_rate as usize / 10) * tenths as usize * self.frame_size()
    }
}

impl fmt::Display for PcmParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz {}-bit {} {} vol={:04X}",
            self.sample_rate,
            self.bits,
            if self.channels == 1 { "mono" } else { "stereo" },
            if self.is_signed() { "signed" } else { "unsigned" },
            self.volume
        )
    }
}

/// Split a volume word into (left, right) gains
#[inline]
pub fn volume_gains(volume: u16) -> (i32, i32) {
    ((volume & 0xFF) as i32, (volume >> 8) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_cd_quality_full_volume() {
        let params = PcmParams::default();
        assert_eq!(params.sample_rate, 44100);
        assert_eq!(params.bits, 16);
        assert_eq!(params.channels, 2);
        assert!(params.is_signed());
        assert_eq!(params.volume, MAX_VOLUME);
        assert_eq!(params.frame_size(), 4);
    }

    #[test]
    fn eight_bit_is_unsigned_by_default() {
        let params = PcmParams::new(8000, 8, 1);
        assert!(!params.is_signed());
        assert_eq!(params.silence_byte(), 0x80);
        assert_eq!(params.frame_size(), 1);
    }

    #[test]
    fn tenth_of_a_second_fits_packet_limit() {
        assert_eq!(PcmParams::default().bytes_for_tenths(1), 17640);
        assert_eq!(PcmParams::new(48000, 16, 2).bytes_for_tenths(1), 19200);
    }

    #[test]
    fn volume_word_splits_into_channels() {
        assert_eq!(volume_gains(0x80FF), (0xFF, 0x80));
        assert_eq!(volume_gains(MAX_VOLUME), (255, 255));
    }

    #[test]
    fn unsupported_layouts_are_rejected() {
        assert!(!PcmParams::new(44100, 24, 2).is_supported());
        assert!(!PcmParams::new(44100, 16, 6).is_supported());
        assert!(!PcmParams::new(0, 16, 2).is_supported());
        assert!(PcmParams::new(22050, 8, 1).is_supported());
    }
}
