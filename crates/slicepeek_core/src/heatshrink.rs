//! Heatshrink (LZSS) decompression.
//!
//! The compressed stream is a sequence of MSB-first bit fields. A `1` tag bit
//! is followed by an 8-bit literal; a `0` tag bit is followed by a
//! `window_bits` back-reference offset and a `lookahead_bits` run length, both
//! stored minus one. Running out of input while reading any field is the
//! normal end of stream.

use crate::error::{Result, ThumbnailError};

pub const MIN_WINDOW_BITS: u8 = 4;
pub const MAX_WINDOW_BITS: u8 = 15;
pub const MIN_LOOKAHEAD_BITS: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeatshrinkParams {
    pub window_bits: u8,
    pub lookahead_bits: u8,
}

impl HeatshrinkParams {
    /// Window and lookahead sizes used by binary G-code compression type 2.
    pub const W11_L4: Self = Self::new(11, 4);
    /// Window and lookahead sizes used by binary G-code compression type 3.
    pub const W12_L4: Self = Self::new(12, 4);

    pub const fn new(window_bits: u8, lookahead_bits: u8) -> Self {
        Self {
            window_bits,
            lookahead_bits,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_WINDOW_BITS..=MAX_WINDOW_BITS).contains(&self.window_bits)
            || self.lookahead_bits < MIN_LOOKAHEAD_BITS
            || self.lookahead_bits >= self.window_bits
        {
            return Err(ThumbnailError::DecompressionFailed(format!(
                "unsupported heatshrink parameters w={} l={}",
                self.window_bits, self.lookahead_bits
            )));
        }
        Ok(())
    }

    #[inline]
    pub const fn window_size(&self) -> usize {
        1 << self.window_bits
    }
}

struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    current: u8,
    mask: u8,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            current: 0,
            mask: 0,
        }
    }

    fn read_bits(&mut self, count: u8) -> Option<u16> {
        let mut value: u16 = 0;
        for _ in 0..count {
            if self.mask == 0 {
                self.current = *self.data.get(self.pos)?;
                self.pos += 1;
                self.mask = 0x80;
            }
            value <<= 1;
            if self.current & self.mask != 0 {
                value |= 1;
            }
            self.mask >>= 1;
        }
        Some(value)
    }
}

/// Expands a complete heatshrink stream.
///
/// The output length is not checked against any expected size.
pub fn decompress(data: &[u8], window_bits: u8, lookahead_bits: u8) -> Result<Vec<u8>> {
    decompress_with(data, HeatshrinkParams::new(window_bits, lookahead_bits))
}

pub fn decompress_with(data: &[u8], params: HeatshrinkParams) -> Result<Vec<u8>> {
    params.validate()?;

    let window_size = params.window_size();
    let window_mask = window_size - 1;
    let mut window = vec![0u8; window_size];
    let mut cursor = 0usize;
    let mut out = Vec::with_capacity(data.len().saturating_mul(2));
    let mut bits = BitReader::new(data);

    loop {
        let Some(tag) = bits.read_bits(1) else { break };

        if tag == 1 {
            let Some(literal) = bits.read_bits(8) else { break };
            let byte = literal as u8;
            out.push(byte);
            window[cursor] = byte;
            cursor = (cursor + 1) & window_mask;
            continue;
        }

        let Some(offset) = bits.read_bits(params.window_bits) else { break };
        let Some(length) = bits.read_bits(params.lookahead_bits) else { break };
        let back = offset as usize + 1;
        let run = length as usize + 1;

        for _ in 0..run {
            let byte = window[(cursor + window_size - back) & window_mask];
            out.push(byte);
            window[cursor] = byte;
            cursor = (cursor + 1) & window_mask;
        }
    }

    Ok(out)
}
