#![allow(dead_code)]

use std::io::{Cursor, Write};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::write::{DeflateEncoder, ZlibEncoder};
use image::{DynamicImage, Rgba, RgbaImage};

pub fn solid_rgba(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba(color))
}

pub fn gradient_rgba(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 16) as u8, (y * 16) as u8, ((x + y) * 8) as u8, 255])
    })
}

pub fn make_png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    encode(DynamicImage::ImageRgba8(solid_rgba(width, height, color)), image::ImageFormat::Png)
}

pub fn make_jpeg(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let rgba = solid_rgba(width, height, [color[0], color[1], color[2], 255]);
    encode(DynamicImage::ImageRgba8(rgba).to_rgb8().into(), image::ImageFormat::Jpeg)
}

fn encode(image: DynamicImage, format: image::ImageFormat) -> Vec<u8> {
    let mut out = Vec::new();
    image.write_to(&mut Cursor::new(&mut out), format).unwrap();
    out
}

pub fn base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn qoi_hash([r, g, b, a]: [u8; 4]) -> usize {
    (r as usize * 3 + g as usize * 5 + b as usize * 7 + a as usize * 11) % 64
}

/// Reference QOI encoder using every op type.
pub fn encode_qoi(image: &RgbaImage) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"qoif");
    out.extend_from_slice(&image.width().to_be_bytes());
    out.extend_from_slice(&image.height().to_be_bytes());
    out.push(4);
    out.push(0);

    let mut cache = [[0u8; 4]; 64];
    let mut prev = [0u8, 0, 0, 255];
    let mut run = 0u8;
    let pixels: Vec<[u8; 4]> = image.pixels().map(|p| p.0).collect();

    for (i, &px) in pixels.iter().enumerate() {
        let last = i + 1 == pixels.len();
        if px == prev {
            run += 1;
            if run == 62 || last {
                out.push(0xC0 | (run - 1));
                run = 0;
            }
            continue;
        }

        if run > 0 {
            out.push(0xC0 | (run - 1));
            run = 0;
        }

        let index = qoi_hash(px);
        if cache[index] == px {
            out.push(index as u8);
        } else {
            cache[index] = px;
            if px[3] == prev[3] {
                let vr = px[0].wrapping_sub(prev[0]) as i8;
                let vg = px[1].wrapping_sub(prev[1]) as i8;
                let vb = px[2].wrapping_sub(prev[2]) as i8;
                let vg_r = vr.wrapping_sub(vg);
                let vg_b = vb.wrapping_sub(vg);

                if (-2..=1).contains(&vr) && (-2..=1).contains(&vg) && (-2..=1).contains(&vb) {
                    out.push(0x40 | (((vr + 2) as u8) << 4) | (((vg + 2) as u8) << 2) | (vb + 2) as u8);
                } else if (-32..=31).contains(&vg) && (-8..=7).contains(&vg_r) && (-8..=7).contains(&vg_b) {
                    out.push(0x80 | (vg + 32) as u8);
                    out.push((((vg_r + 8) as u8) << 4) | (vg_b + 8) as u8);
                } else {
                    out.extend_from_slice(&[0xFE, px[0], px[1], px[2]]);
                }
            } else {
                out.extend_from_slice(&[0xFF, px[0], px[1], px[2], px[3]]);
            }
        }
        prev = px;
    }

    out.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 1]);
    out
}

struct BitWriter {
    out: Vec<u8>,
    current: u8,
    used: u8,
}

impl BitWriter {
    fn new() -> Self {
        Self { out: Vec::new(), current: 0, used: 0 }
    }

    fn push(&mut self, value: u32, count: u8) {
        for shift in (0..count).rev() {
            self.current = (self.current << 1) | ((value >> shift) & 1) as u8;
            self.used += 1;
            if self.used == 8 {
                self.out.push(self.current);
                self.current = 0;
                self.used = 0;
            }
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.used > 0 {
            self.out.push(self.current << (8 - self.used));
        }
        self.out
    }
}

/// Greedy reference heatshrink encoder producing the standard bit layout.
pub fn heatshrink_compress(data: &[u8], window_bits: u8, lookahead_bits: u8) -> Vec<u8> {
    let window = 1usize << window_bits;
    let max_len = 1usize << lookahead_bits;
    let backref_cost = 1 + window_bits as usize + lookahead_bits as usize;
    let mut bits = BitWriter::new();
    let mut i = 0;

    while i < data.len() {
        let mut best_len = 0;
        let mut best_back = 0;
        for start in i.saturating_sub(window)..i {
            let mut len = 0;
            while len < max_len && i + len < data.len() && data[start + len] == data[i + len] {
                len += 1;
            }
            if len > best_len {
                best_len = len;
                best_back = i - start;
            }
        }

        if best_len * 9 > backref_cost {
            bits.push(0, 1);
            bits.push((best_back - 1) as u32, window_bits);
            bits.push((best_len - 1) as u32, lookahead_bits);
            i += best_len;
        } else {
            bits.push(1, 1);
            bits.push(data[i] as u32, 8);
            i += 1;
        }
    }

    bits.finish()
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ZipMethod {
    Stored,
    Deflate,
}

pub struct ZipEntry<'a> {
    pub name: &'a str,
    pub data: &'a [u8],
    pub method: ZipMethod,
    /// Zero the local header sizes and append a data descriptor.
    pub streamed: bool,
}

impl<'a> ZipEntry<'a> {
    pub fn stored(name: &'a str, data: &'a [u8]) -> Self {
        Self { name, data, method: ZipMethod::Stored, streamed: false }
    }

    pub fn deflated(name: &'a str, data: &'a [u8]) -> Self {
        Self { name, data, method: ZipMethod::Deflate, streamed: false }
    }

    pub fn streamed(mut self) -> Self {
        self.streamed = true;
        self
    }
}

pub fn make_zip(entries: &[ZipEntry<'_>]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut central = Vec::new();

    for entry in entries {
        let offset = out.len() as u32;
        let crc = crc32fast::hash(entry.data);
        let (method, body) = match entry.method {
            ZipMethod::Stored => (0u16, entry.data.to_vec()),
            ZipMethod::Deflate => (8u16, deflate(entry.data)),
        };
        let flags: u16 = if entry.streamed { 0x0008 } else { 0 };
        let (local_crc, local_comp, local_uncomp) = if entry.streamed {
            (0, 0, 0)
        } else {
            (crc, body.len() as u32, entry.data.len() as u32)
        };

        out.extend_from_slice(&0x0403_4B50u32.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&method.to_le_bytes());
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&local_crc.to_le_bytes());
        out.extend_from_slice(&local_comp.to_le_bytes());
        out.extend_from_slice(&local_uncomp.to_le_bytes());
        out.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
        out.extend_from_slice(&4u16.to_le_bytes());
        out.extend_from_slice(entry.name.as_bytes());
        out.extend_from_slice(&[0xCA, 0xFE, 0x00, 0x00]);
        out.extend_from_slice(&body);
        if entry.streamed {
            out.extend_from_slice(&0x0807_4B50u32.to_le_bytes());
            out.extend_from_slice(&crc.to_le_bytes());
            out.extend_from_slice(&(body.len() as u32).to_le_bytes());
            out.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
        }

        central.extend_from_slice(&0x0201_4B50u32.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&flags.to_le_bytes());
        central.extend_from_slice(&method.to_le_bytes());
        central.extend_from_slice(&[0; 4]);
        central.extend_from_slice(&crc.to_le_bytes());
        central.extend_from_slice(&(body.len() as u32).to_le_bytes());
        central.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
        central.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&[0; 8]);
        central.extend_from_slice(&offset.to_le_bytes());
        central.extend_from_slice(entry.name.as_bytes());
    }

    let cd_offset = out.len() as u32;
    out.extend_from_slice(&central);
    out.extend_from_slice(&0x0605_4B50u32.to_le_bytes());
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    out.extend_from_slice(&(central.len() as u32).to_le_bytes());
    out.extend_from_slice(&cd_offset.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out
}

pub fn bgcode_header(checksum: u16) -> Vec<u8> {
    let mut data = b"GCDE".to_vec();
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&checksum.to_le_bytes());
    data
}

pub fn bgcode_block(
    block_type: u16,
    compression: u16,
    uncompressed_len: usize,
    params: &[u8],
    payload: &[u8],
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&block_type.to_le_bytes());
    out.extend_from_slice(&compression.to_le_bytes());
    out.extend_from_slice(&(uncompressed_len as u32).to_le_bytes());
    if compression != 0 {
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    }
    out.extend_from_slice(params);
    out.extend_from_slice(payload);
    let crc = crc32fast::hash(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

pub fn bgcode_thumbnail(format: u16, width: u16, height: u16, compression: u16, raw: &[u8]) -> Vec<u8> {
    let params: Vec<u8> = [format, width, height].iter().flat_map(|v| v.to_le_bytes()).collect();
    let payload = match compression {
        0 => raw.to_vec(),
        1 => zlib(raw),
        2 => heatshrink_compress(raw, 11, 4),
        3 => heatshrink_compress(raw, 12, 4),
        other => panic!("no encoder for compression {}", other),
    };
    bgcode_block(5, compression, raw.len(), &params, &payload)
}

pub fn gcode_thumbnail_block(tag: &str, width: u32, height: u32, payload: &[u8]) -> String {
    let encoded = base64(payload);
    let mut text = format!("; thumbnail{} begin {}x{} {}\n", tag, width, height, encoded.len());
    for chunk in encoded.as_bytes().chunks(78) {
        text.push_str("; ");
        text.push_str(std::str::from_utf8(chunk).unwrap());
        text.push('\n');
    }
    text.push_str(&format!("; thumbnail{} end\n", tag));
    text
}
