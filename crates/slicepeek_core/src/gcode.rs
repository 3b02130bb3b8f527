//! Preview extraction from plain-text G-code.
//!
//! Slicers embed previews as Base64 inside comment blocks:
//!
//! ```text
//! ; thumbnail begin 16x16 460
//! ; iVBORw0KGgoAAAANSUhEUgAAABAAAAAQCAYAAAAf8/9hAAAA...
//! ; thumbnail end
//! ```
//!
//! PrusaSlicer also writes `thumbnail_PNG`, `thumbnail_JPG` and
//! `thumbnail_QOI` variants of the same markers. Several blocks at different
//! sizes are common; the one with the largest declared area wins.

use std::borrow::Cow;

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::config::ExtractConfig;
use crate::error::Result;
use crate::raster::{RasterImage, decode_largest};
use crate::traits::ThumbnailSource;
use crate::types::{Bounds, SlicerFileType, ThumbnailCandidate, ThumbnailInfo};

const MARKER_PREFIX: &str = "; thumbnail";

const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Begin { width: u32, height: u32 },
    End,
}

/// A thumbnail block and the 1-based line its begin marker sits on.
#[derive(Debug, Clone)]
pub struct ThumbnailBlock {
    pub line: usize,
    pub candidate: ThumbnailCandidate,
}

struct PendingBlock {
    line: usize,
    width: u32,
    height: u32,
    payload: String,
}

/// Interprets the buffer as UTF-8, falling back to Latin-1.
pub fn decode_text(data: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(data) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(data.iter().map(|&b| b as char).collect()),
    }
}

fn parse_marker(line: &str) -> Option<Marker> {
    let start = line.find(MARKER_PREFIX)?;
    let mut rest = &line[start + MARKER_PREFIX.len()..];

    if let Some(tagged) = rest.strip_prefix('_') {
        let tag_len = tagged
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(tagged.len());
        rest = &tagged[tag_len..];
    }

    if let Some(args) = rest.strip_prefix(" begin") {
        let (width, height) = parse_dimensions(args).unwrap_or((0, 0));
        Some(Marker::Begin { width, height })
    } else if rest.starts_with(" end") {
        Some(Marker::End)
    } else {
        None
    }
}

/// Parses `<W>x<H>` from the arguments of a begin marker. The trailing byte
/// count is informational only.
fn parse_dimensions(args: &str) -> Option<(u32, u32)> {
    let size = args.split_whitespace().next()?;
    let (width, height) = size.split_once('x')?;
    Some((width.parse().ok()?, height.parse().ok()?))
}

fn strip_comment(line: &str) -> &str {
    line.strip_prefix("; ")
        .or_else(|| line.strip_prefix(';'))
        .unwrap_or(line)
}

fn finish_block(block: PendingBlock) -> Option<ThumbnailBlock> {
    let cleaned: String = block
        .payload
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '+' || *c == '/')
        .collect();

    match LENIENT_BASE64.decode(cleaned.as_bytes()) {
        Ok(bytes) if !bytes.is_empty() => Some(ThumbnailBlock {
            line: block.line,
            candidate: ThumbnailCandidate::new(block.width, block.height, bytes),
        }),
        Ok(_) => {
            tracing::debug!("Empty thumbnail block at line {}", block.line);
            None
        }
        Err(e) => {
            tracing::debug!("Discarding thumbnail block at line {}: {}", block.line, e);
            None
        }
    }
}

/// Collects every well-formed thumbnail block in file order.
///
/// Blocks whose payload is not valid Base64, and blocks left open at end of
/// file, are dropped.
pub fn scan_blocks(data: &[u8]) -> Vec<ThumbnailBlock> {
    let text = decode_text(data);
    let mut blocks = Vec::new();
    let mut pending: Option<PendingBlock> = None;

    for (index, line) in text.lines().enumerate() {
        match (parse_marker(line), pending.take()) {
            (Some(Marker::Begin { width, height }), previous) => {
                if let Some(previous) = previous {
                    tracing::debug!("Unterminated thumbnail block at line {}", previous.line);
                }
                pending = Some(PendingBlock {
                    line: index + 1,
                    width,
                    height,
                    payload: String::new(),
                });
            }
            (Some(Marker::End), Some(block)) => {
                blocks.extend(finish_block(block));
            }
            (Some(Marker::End), None) | (None, None) => {}
            (None, Some(mut block)) => {
                block.payload.push_str(strip_comment(line).trim());
                pending = Some(block);
            }
        }
    }

    if let Some(block) = pending {
        tracing::debug!("Thumbnail block at line {} never ends", block.line);
    }

    blocks
}

pub fn scan_thumbnails(data: &[u8]) -> Vec<ThumbnailCandidate> {
    scan_blocks(data).into_iter().map(|b| b.candidate).collect()
}

/// Adapter for `.gcode` and `.gco` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct GCodeSource;

impl ThumbnailSource for GCodeSource {
    fn file_types(&self) -> &'static [SlicerFileType] {
        &[SlicerFileType::GCode, SlicerFileType::Gco]
    }

    fn list(&self, data: &[u8], _config: &ExtractConfig) -> Result<Vec<ThumbnailInfo>> {
        Ok(scan_blocks(data)
            .into_iter()
            .map(|block| ThumbnailInfo {
                location: format!("line {}", block.line),
                declared_width: block.candidate.declared_width,
                declared_height: block.candidate.declared_height,
                format: block.candidate.format,
                payload_len: block.candidate.payload.len(),
            })
            .collect())
    }

    fn extract(&self, data: &[u8], _config: &ExtractConfig) -> Result<RasterImage> {
        decode_largest(scan_thumbnails(data))
    }
}

/// Extracts the preview with the largest declared area.
pub fn extract_largest_thumbnail(data: &[u8], max_size: Option<Bounds>) -> Result<RasterImage> {
    let config = ExtractConfig::new().with_max_size(max_size);
    GCodeSource
        .extract(data, &config)
        .map(|image| crate::raster::fit(image, &config))
}
