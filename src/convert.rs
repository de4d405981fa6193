//! PCM conversion engine
//!
//! Bridges two `PcmParams` descriptors. A `Converter` caches the integer rate
//! ratio for a (source, destination) pair and then converts byte buffers in a
//! fixed order: sample rate, bit depth, channel count, and finally volume.
//! Identical descriptors take an exact copy path.

use crate::params::{volume_gains, PcmParams};

/// Exact rate ratio `dst_rate / src_rate`, kept as a reduced fraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionRatio {
    /// Destination rate share
    num: u32,

    /// Source rate share
    den: u32,
}

impl ConversionRatio {
    /// Ratio for converting from `src_rate` to `dst_rate`
    pub fn new(src_rate: u16, dst_rate: u16) -> Self {
        let src = (src_rate as u32).max(1);
        let dst = (dst_rate as u32).max(1);
        let divisor = gcd(src, dst);
        ConversionRatio {
            num: dst / divisor,
            den: src / divisor,
        }
    }

    /// Whether source and destination rates match
    pub fn is_unity(&self) -> bool {
        self.num == self.den
    }

    /// Destination frames produced from `frames` source frames
    pub fn output_frames(&self, frames: usize) -> usize {
        (frames as u64 * self.num as u64 / self.den as u64) as usize
    }

    /// Source frames needed to produce `frames` destination frames
    pub fn input_frames(&self, frames: usize) -> usize {
        (frames as u64 * self.den as u64).div_ceil(self.num as u64) as usize
    }

    /// (destination, source) shares of the reduced fraction
    pub fn parts(&self) -> (u32, u32) {
        (self.num, self.den)
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

/// Converter for one (source, destination) parameter pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Converter {
    src: PcmParams,
    dst: PcmParams,
    ratio: ConversionRatio,
}

impl Converter {
    /// Create a converter, precomputing the rate ratio
    pub fn new(src: PcmParams, dst: PcmParams) -> Self {
        Converter {
            src,
            dst,
            ratio: ConversionRatio::new(src.sample_rate, dst.sample_rate),
        }
    }

    /// Source parameters
    pub fn source(&self) -> &PcmParams {
        &self.src
    }

    /// Destination parameters
    pub fn destination(&self) -> &PcmParams {
        &self.dst
    }

    /// Cached rate ratio
    pub fn ratio(&self) -> ConversionRatio {
        self.ratio
    }

    /// Whether conversion is an exact copy
    pub fn is_passthrough(&self) -> bool {
        self.src == self.dst
    }

    /// Destination bytes produced from `src_len` source bytes
    pub fn output_len(&self, src_len: usize) -> usize {
        if self.is_passthrough() {
            return src_len;
        }
        self.ratio.output_frames(src_len / self.src.frame_size()) * self.dst.frame_size()
    }

    /// Source bytes needed to fill `dst_len` destination bytes
    pub fn input_len(&self, dst_len: usize) -> usize {
        if self.is_passthrough() {
            return dst_len;
        }
        self.ratio.input_frames(dst_len / self.dst.frame_size()) * self.src.frame_size()
    }

    /// Convert `src` into `dst`, returning the number of bytes written
    pub fn convert(&self, src: &[u8], dst: &mut [u8]) -> usize {
        if self.is_passthrough() {
            let count = src.len().min(dst.len());
            dst[..count].copy_from_slice(&src[..count]);
            return count;
        }

        let in_channels = self.src.channels as usize;
        let in_frames = src.len() / self.src.frame_size();
        let out_frames = self
            .ratio
            .output_frames(in_frames)
            .min(dst.len() / self.dst.frame_size());
        if out_frames == 0 {
            return 0;
        }

        let decoded = decode(src, &self.src, in_frames);
        let frames = self.resample(&decoded, in_channels, in_frames, out_frames);
        self.encode(frames, dst)
    }

    /// Bit depth, channel layout and volume stages for resampled frames
    fn encode(&self, mut frames: Vec<i32>, dst: &mut [u8]) -> usize {
        // Bit depth: drop precision the destination cannot hold
        if self.dst.bits == 8 {
            for value in frames.iter_mut() {
                *value = quantize_8bit(*value);
            }
        }

        let in_channels = self.src.channels as usize;
        let out_frames = frames.len() / in_channels.max(1);
        let mut frames = remap_channels(frames, in_channels, self.dst.channels as usize);
        apply_volume(&mut frames, &self.dst);

        let size = self.dst.bytes_per_sample();
        for (value, out) in frames.iter().zip(dst.chunks_exact_mut(size)) {
            write_sample(*value, out, &self.dst);
        }
        out_frames * self.dst.frame_size()
    }

    /// Convert into a freshly allocated buffer
    pub fn convert_to_vec(&self, src: &[u8]) -> Vec<u8> {
        let mut out = vec![self.dst.silence_byte(); self.output_len(src.len())];
        let written = self.convert(src, &mut out);
        out.truncate(written);
        out
    }

    /// Linear interpolation between neighbouring source frames
    fn resample(&self, input: &[i32], channels: usize, in_frames: usize, out_frames: usize) -> Vec<i32> {
        if self.ratio.is_unity() {
            let mut output = input.to_vec();
            output.truncate(out_frames * channels);
            return output;
        }

        let (num, den) = self.ratio.parts();
        let (num, den) = (num as u64, den as u64);
        let last = in_frames - 1;
        let mut output = Vec::with_capacity(out_frames * channels);
        for frame in 0..out_frames as u64 {
            let pos = frame * den;
            let index = ((pos / num) as usize).min(last);
            let next = (index + 1).min(last);
            let frac = (pos % num) as i64;
            for ch in 0..channels {
                let a = input[index * channels + ch] as i64;
                let b = input[next * channels + ch] as i64;
                output.push((a + (b - a) * frac / num as i64) as i32);
            }
        }
        output
    }
}

/// Converter for a continuous stream delivered in consecutive periods
///
/// Rate conversion keeps its read position and the last two source frames
/// between periods, so a stream cut into periods of any size plays at the
/// exact ratio and interpolates across period boundaries. Equal rates need no
/// history and convert each period on its own.
#[derive(Debug, Clone)]
pub struct StreamConverter {
    converter: Converter,

    /// Last two source frames, oldest first, in the source channel layout
    history: Vec<i32>,

    /// Next output position past `history[0]`, in `1/num` source frames
    position: u64,
}

impl StreamConverter {
    /// Start a stream; the history begins as silence
    pub fn new(converter: Converter) -> Self {
        let channels = converter.src.channels.max(1) as usize;
        let (num, _) = converter.ratio.parts();
        StreamConverter {
            converter,
            history: vec![0; 2 * channels],
            position: num as u64,
        }
    }

    /// The per-buffer converter this stream is built on
    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    fn is_stateless(&self) -> bool {
        self.converter.is_passthrough() || self.converter.ratio.is_unity()
    }

    /// Source bytes the next `dst_len` destination bytes consume
    pub fn input_len(&self, dst_len: usize) -> usize {
        if self.is_stateless() {
            return self.converter.input_len(dst_len);
        }
        let out_frames = dst_len / self.converter.dst.frame_size();
        self.input_frames(out_frames) * self.converter.src.frame_size()
    }

    fn input_frames(&self, out_frames: usize) -> usize {
        if out_frames == 0 {
            return 0;
        }
        let (num, den) = self.converter.ratio.parts();
        let last = self.position + (out_frames as u64 - 1) * den as u64;
        (last / num as u64) as usize
    }

    /// Convert the next period; `src` should hold `input_len(dst.len())` bytes
    pub fn convert_period(&mut self, src: &[u8], dst: &mut [u8]) -> usize {
        if self.is_stateless() {
            return self.converter.convert(src, dst);
        }

        let channels = self.converter.src.channels.max(1) as usize;
        let out_frames = dst.len() / self.converter.dst.frame_size();
        let wanted = self.input_frames(out_frames);
        let in_frames = (src.len() / self.converter.src.frame_size()).min(wanted);

        let mut input = std::mem::take(&mut self.history);
        input.extend(decode(src, &self.converter.src, in_frames));
        let available = input.len() / channels;

        let (num, den) = self.converter.ratio.parts();
        let (num, den) = (num as u64, den as u64);
        let mut output = Vec::with_capacity(out_frames * channels);
        let mut produced = 0;
        for frame in 0..out_frames as u64 {
            let pos = self.position + frame * den;
            let index = (pos / num) as usize;
            if index + 1 >= available {
                break;
            }
            let frac = (pos % num) as i64;
            for ch in 0..channels {
                let a = input[index * channels + ch] as i64;
                let b = input[(index + 1) * channels + ch] as i64;
                output.push((a + (b - a) * frac / num as i64) as i32);
            }
            produced += 1;
        }

        self.position = (self.position + produced * den).saturating_sub(in_frames as u64 * num);
        self.history = input[(available - 2) * channels..].to_vec();
        self.converter.encode(output, dst)
    }
}

/// Convert `src` (in `src_params`) into the pre-sized `dst` (in `dst_params`)
pub fn convert(src: &[u8], src_params: &PcmParams, dst: &mut [u8], dst_params: &PcmParams) -> usize {
    Converter::new(*src_params, *dst_params).convert(src, dst)
}

/// Read one sample, widened to the signed 16-bit range
#[inline]
pub fn read_sample(bytes: &[u8], params: &PcmParams) -> i32 {
    if params.bits == 8 {
        if params.is_signed() {
            (bytes[0] as i8 as i32) << 8
        } else {
            (bytes[0] as i32 - 0x80) << 8
        }
    } else {
        let raw = if params.is_big_endian() {
            u16::from_be_bytes([bytes[0], bytes[1]])
        } else {
            u16::from_le_bytes([bytes[0], bytes[1]])
        };
        if params.is_signed() {
            raw as i16 as i32
        } else {
            raw as i32 - 0x8000
        }
    }
}

/// Write one sample from the signed 16-bit range, saturating
#[inline]
pub fn write_sample(value: i32, out: &mut [u8], params: &PcmParams) {
    let value = value.clamp(i16::MIN as i32, i16::MAX as i32);
    if params.bits == 8 {
        let narrow = (quantize_8bit(value) >> 8).clamp(-128, 127);
        out[0] = if params.is_signed() {
            narrow as i8 as u8
        } else {
            (narrow + 0x80) as u8
        };
    } else {
        let raw = if params.is_signed() {
            value as i16 as u16
        } else {
            (value + 0x8000) as u16
        };
        let bytes = if params.is_big_endian() {
            raw.to_be_bytes()
        } else {
            raw.to_le_bytes()
        };
        out[..2].copy_from_slice(&bytes);
    }
}

/// Round a 16-bit range value to the nearest 8-bit step
#[inline]
fn quantize_8bit(value: i32) -> i32 {
    (((value + 0x80) >> 8) << 8).clamp(i16::MIN as i32, 0x7F00)
}

fn decode(src: &[u8], params: &PcmParams, frames: usize) -> Vec<i32> {
    let size = params.bytes_per_sample();
    src[..frames * params.frame_size()]
        .chunks_exact(size)
        .map(|sample| read_sample(sample, params))
        .collect()
}

fn remap_channels(frames: Vec<i32>, from: usize, to: usize) -> Vec<i32> {
    match (from, to) {
        (1, 2) => frames.iter().flat_map(|&v| [v, v]).collect(),
        (2, 1) => frames
            .chunks_exact(2)
            .map(|pair| (pair[0] + pair[1]) >> 1)
            .collect(),
        _ => frames,
    }
}

fn apply_volume(frames: &mut [i32], params: &PcmParams) {
    let (left, right) = volume_gains(params.volume);
    if left == 0xFF && right == 0xFF {
        return;
    }
    if params.channels == 1 {
        for value in frames.iter_mut() {
            *value = *value * left / 0xFF;
        }
    } else {
        for pair in frames.chunks_exact_mut(2) {
            pair[0] = pair[0] * left / 0xFF;
            pair[1] = pair[1] * right / 0xFF;
        }
    }
}
