//! QOI ("Quite OK Image") decoding into dense RGBA.

use image::imageops::FilterType;

use crate::cursor::u32_be_at;
use crate::raster::{QOI_MAGIC, QOI_MAGIC_REVERSED, RasterImage};
use crate::types::Bounds;

pub const QOI_HEADER_SIZE: usize = 14;
pub const QOI_END_MARKER_SIZE: usize = 8;
pub const QOI_MAX_DIMENSION: u32 = 32768;

const QOI_OP_INDEX: u8 = 0x00;
const QOI_OP_DIFF: u8 = 0x40;
const QOI_OP_LUMA: u8 = 0x80;
const QOI_OP_RUN: u8 = 0xC0;
const QOI_OP_RGB: u8 = 0xFE;
const QOI_OP_RGBA: u8 = 0xFF;
const QOI_MASK_2: u8 = 0xC0;

/// Longest run a single op byte can encode.
const MAX_PIXELS_PER_BYTE: usize = 62;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QoiHeader {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub colorspace: u8,
}

impl QoiHeader {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < QOI_HEADER_SIZE {
            return None;
        }

        let magic = &data[..4];
        if magic != QOI_MAGIC && magic != QOI_MAGIC_REVERSED {
            return None;
        }

        Some(Self {
            width: u32_be_at(data, 4)?,
            height: u32_be_at(data, 8)?,
            channels: data[12],
            colorspace: data[13],
        })
    }

    pub fn is_valid(&self) -> bool {
        (1..QOI_MAX_DIMENSION).contains(&self.width)
            && (1..QOI_MAX_DIMENSION).contains(&self.height)
    }

    #[inline]
    pub const fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

#[inline]
fn color_hash([r, g, b, a]: [u8; 4]) -> usize {
    (r as usize * 3 + g as usize * 5 + b as usize * 7 + a as usize * 11) % 64
}

/// Decodes the op stream into RGBA bytes.
///
/// Decoding stops once every pixel is produced or the cursor reaches the
/// trailing 8-byte end marker, which is not itself validated. Pixels a short
/// stream never reaches are left zeroed.
pub fn decode_rgba(data: &[u8]) -> Option<(QoiHeader, Vec<u8>)> {
    let header = QoiHeader::from_bytes(data)?;
    if !header.is_valid() {
        return None;
    }

    let total = header.pixel_count();
    let max_possible = data.len().saturating_mul(MAX_PIXELS_PER_BYTE);
    if total > max_possible {
        return None;
    }

    let mut pixels = Vec::with_capacity(total * 4);
    let mut cache = [[0u8; 4]; 64];
    let mut px: [u8; 4] = [0, 0, 0, 255];
    let mut count = 0usize;
    let mut pos = QOI_HEADER_SIZE;
    let end = data.len().saturating_sub(QOI_END_MARKER_SIZE);

    while count < total && pos < end {
        let op = data[pos];
        pos += 1;

        match op {
            QOI_OP_RGB => {
                let Some(rgb) = data.get(pos..pos + 3) else { break };
                px[..3].copy_from_slice(rgb);
                pos += 3;
            }
            QOI_OP_RGBA => {
                let Some(rgba) = data.get(pos..pos + 4) else { break };
                px.copy_from_slice(rgba);
                pos += 4;
            }
            _ => match op & QOI_MASK_2 {
                QOI_OP_INDEX => {
                    px = cache[(op & 0x3F) as usize];
                }
                QOI_OP_DIFF => {
                    px[0] = px[0].wrapping_add(((op >> 4) & 0x03).wrapping_sub(2));
                    px[1] = px[1].wrapping_add(((op >> 2) & 0x03).wrapping_sub(2));
                    px[2] = px[2].wrapping_add((op & 0x03).wrapping_sub(2));
                }
                QOI_OP_LUMA => {
                    let Some(&second) = data.get(pos) else { break };
                    pos += 1;
                    let dg = (op & 0x3F).wrapping_sub(32);
                    let dr = dg.wrapping_sub(8).wrapping_add((second >> 4) & 0x0F);
                    let db = dg.wrapping_sub(8).wrapping_add(second & 0x0F);
                    px[0] = px[0].wrapping_add(dr);
                    px[1] = px[1].wrapping_add(dg);
                    px[2] = px[2].wrapping_add(db);
                }
                _ => {
                    debug_assert_eq!(op & QOI_MASK_2, QOI_OP_RUN);
                    let run = ((op & 0x3F) as usize + 1).min(total - count);
                    for _ in 0..run {
                        cache[color_hash(px)] = px;
                        pixels.extend_from_slice(&px);
                    }
                    count += run;
                    continue;
                }
            },
        }

        cache[color_hash(px)] = px;
        pixels.extend_from_slice(&px);
        count += 1;
    }

    if count < total {
        tracing::debug!("QOI stream ended after {} of {} pixels", count, total);
        pixels.resize(total * 4, 0);
    }

    Some((header, pixels))
}

pub fn decode_image(data: &[u8]) -> Option<RasterImage> {
    let (header, pixels) = decode_rgba(data)?;
    RasterImage::from_rgba(header.width, header.height, pixels).ok()
}

/// Decodes a QOI image, shrinking it to fit `max_size` when given.
pub fn decode(data: &[u8], max_size: Option<Bounds>) -> Option<RasterImage> {
    let image = decode_image(data)?;
    Some(match max_size {
        Some(bounds) => image.scale_to_fit(bounds, FilterType::Lanczos3),
        None => image,
    })
}
