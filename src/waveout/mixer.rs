//! Multi-source mixing
//!
//! Contributions are summed sample by sample, each scaled by its source's
//! per-channel volume, and saturated to the range of the output format.

use log::trace;

use super::registry::SourceRegistry;
use crate::convert::{read_sample, write_sample};
use crate::params::{volume_gains, PcmParams};

/// One source's bytes for this period and its mixing volume
pub struct Contribution<'a> {
    pub data: &'a [u8],
    pub volume: u16,
}

/// Mix `contributions` (all in `params` format) into `out`
///
/// Every sample slot of `out` is written; missing data counts as silence and
/// zero contributions produce pure silence.
pub fn mix(params: &PcmParams, contributions: &[Contribution<'_>], out: &mut [u8]) {
    let size = params.bytes_per_sample();
    let channels = params.channels.max(1) as usize;
    let gains: Vec<(i32, i32)> = contributions.iter().map(|c| volume_gains(c.volume)).collect();

    for (index, sample) in out.chunks_exact_mut(size).enumerate() {
        let offset = index * size;
        let right = channels == 2 && index % 2 == 1;
        let mut acc = 0i32;
        for (contribution, &(left_gain, right_gain)) in contributions.iter().zip(gains.iter()) {
            let Some(bytes) = contribution.data.get(offset..offset + size) else {
                continue;
            };
            let gain = if right { right_gain } else { left_gain };
            let value = read_sample(bytes, params);
            acc += if gain == 0xFF { value } else { value * gain / 0xFF };
        }
        write_sample(acc, sample, params);
    }

    let tail = out.len() - out.len() % size;
    out[tail..].fill(params.silence_byte());
}

/// Mixing stage of the output endpoint: the registry plus its buffers
pub(crate) struct Mixer {
    pub(crate) registry: SourceRegistry,
    output: Vec<u8>,
}

impl Mixer {
    pub(crate) fn new() -> Self {
        Mixer {
            registry: SourceRegistry::new(),
            output: Vec::new(),
        }
    }

    /// Pull `len` bytes from every source and mix them in `params` format
    pub(crate) fn pull_and_mix(&mut self, rate: u16, params: &PcmParams, len: usize) -> &[u8] {
        let silence = params.silence_byte();

        for slot in self.registry.occupied_mut() {
            slot.scratch.clear();
            slot.scratch.resize(len, silence);
            let written = slot.source.fill(rate, &mut slot.scratch).min(len);
            if written < len {
                trace!("Source delivered {} of {} bytes, padding with silence", written, len);
                slot.scratch[written..].fill(silence);
            }
        }

        self.output.clear();
        self.output.resize(len, silence);

        let mut contributions = Vec::with_capacity(self.registry.len());
        for slot in self.registry.occupied_mut() {
            contributions.push(Contribution {
                volume: slot.source.volume(),
                data: &slot.scratch,
            });
        }
        mix(params, &contributions, &mut self.output);
        &self.output
    }
}
