//! Preview extraction from Prusa binary G-code (`.bgcode`).
//!
//! Layout: a 10-byte file header (`GCDE` magic, u32 version, u16 checksum
//! type) followed by blocks of
//!
//! ```text
//! u16 type | u16 compression | u32 uncompressed size | [u32 compressed size]
//! parameters | payload | [u32 CRC32]
//! ```
//!
//! The compressed size is only present when compression is not `none`, and
//! neither size field counts the parameter bytes.

use crate::config::ExtractConfig;
use crate::cursor::{ByteReader, slice_at, u16_le_at, u32_le_at};
use crate::error::{Result, ThumbnailError};
use crate::heatshrink::{self, HeatshrinkParams};
use crate::inflate::inflate_zlib_or_raw;
use crate::raster::{RasterImage, decode_largest};
use crate::traits::ThumbnailSource;
use crate::types::{Bounds, ImageFormat, SlicerFileType, ThumbnailCandidate, ThumbnailInfo};

/// `"GCDE"` read as a little-endian u32.
pub const BGCODE_MAGIC: u32 = 0x4544_4347;
pub const FILE_HEADER_SIZE: usize = 10;
pub const BLOCK_HEADER_SIZE: usize = 8;
pub const CRC_SIZE: usize = 4;
pub const THUMBNAIL_PARAMS_SIZE: usize = 6;
pub const METADATA_PARAMS_SIZE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumType {
    None,
    Crc32,
    Unknown(u16),
}

impl From<u16> for ChecksumType {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Crc32,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub version: u32,
    pub checksum: ChecksumType,
}

impl FileHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < FILE_HEADER_SIZE {
            return Err(ThumbnailError::InvalidContainer(format!(
                "{} bytes is too small for a binary G-code header",
                data.len()
            )));
        }
        if u32_le_at(data, 0) != Some(BGCODE_MAGIC) {
            return Err(ThumbnailError::InvalidContainer(
                "missing GCDE magic".into(),
            ));
        }

        let mut reader = ByteReader::at(data, 4);
        let (Some(version), Some(checksum)) = (reader.read_u32_le(), reader.read_u16_le()) else {
            return Err(ThumbnailError::InvalidContainer(
                "truncated binary G-code header".into(),
            ));
        };

        Ok(Self {
            version,
            checksum: ChecksumType::from(checksum),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    FileMetadata,
    GCode,
    SlicerMetadata,
    PrinterMetadata,
    PrintMetadata,
    Thumbnail,
    Unknown(u16),
}

impl BlockType {
    /// Length of the parameter bytes that sit between the block header and
    /// the payload.
    #[must_use]
    pub const fn param_size(&self) -> usize {
        match self {
            Self::FileMetadata
            | Self::GCode
            | Self::SlicerMetadata
            | Self::PrinterMetadata
            | Self::PrintMetadata => METADATA_PARAMS_SIZE,
            Self::Thumbnail => THUMBNAIL_PARAMS_SIZE,
            Self::Unknown(_) => 0,
        }
    }
}

impl From<u16> for BlockType {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::FileMetadata,
            1 => Self::GCode,
            2 => Self::SlicerMetadata,
            3 => Self::PrinterMetadata,
            4 => Self::PrintMetadata,
            5 => Self::Thumbnail,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockCompression {
    None,
    Deflate,
    Heatshrink11,
    Heatshrink12,
    Unknown(u16),
}

impl From<u16> for BlockCompression {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Deflate,
            2 => Self::Heatshrink11,
            3 => Self::Heatshrink12,
            other => Self::Unknown(other),
        }
    }
}

/// Maps the thumbnail `format` parameter to an image format.
#[must_use]
pub const fn thumbnail_format(value: u16) -> Option<ImageFormat> {
    match value {
        0 => Some(ImageFormat::Png),
        1 => Some(ImageFormat::Jpeg),
        2 => Some(ImageFormat::Qoi),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub offset: usize,
    pub block_type: BlockType,
    pub compression: BlockCompression,
    pub uncompressed_size: u32,
    pub compressed_size: u32,
}

impl BlockHeader {
    pub fn parse(data: &[u8], offset: usize) -> Option<Self> {
        let mut reader = ByteReader::at(data, offset);
        let block_type = BlockType::from(reader.read_u16_le()?);
        let compression_raw = reader.read_u16_le()?;
        let uncompressed_size = reader.read_u32_le()?;
        let compressed_size = if compression_raw == 0 {
            uncompressed_size
        } else {
            reader.read_u32_le()?
        };

        Some(Self {
            offset,
            block_type,
            compression: BlockCompression::from(compression_raw),
            uncompressed_size,
            compressed_size,
        })
    }

    #[inline]
    pub const fn header_len(&self) -> usize {
        match self.compression {
            BlockCompression::None => BLOCK_HEADER_SIZE,
            _ => BLOCK_HEADER_SIZE + 4,
        }
    }

    #[inline]
    pub const fn params_offset(&self) -> usize {
        self.offset + self.header_len()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Block<'a> {
    pub header: BlockHeader,
    pub params: &'a [u8],
    pub payload: &'a [u8],
    /// Header, parameters and payload: the bytes the CRC covers.
    pub covered: &'a [u8],
    pub crc: Option<u32>,
}

impl Block<'_> {
    /// `(format, width, height)` for thumbnail blocks.
    pub fn thumbnail_params(&self) -> Option<(u16, u16, u16)> {
        if self.header.block_type != BlockType::Thumbnail {
            return None;
        }
        Some((
            u16_le_at(self.params, 0)?,
            u16_le_at(self.params, 2)?,
            u16_le_at(self.params, 4)?,
        ))
    }

    pub fn crc_matches(&self) -> bool {
        self.crc == Some(crc32fast::hash(self.covered))
    }

    pub fn decompress(&self) -> Result<Vec<u8>> {
        match self.header.compression {
            BlockCompression::None => Ok(self.payload.to_vec()),
            BlockCompression::Deflate => {
                inflate_zlib_or_raw(self.payload, self.header.uncompressed_size as usize)
            }
            BlockCompression::Heatshrink11 => {
                heatshrink::decompress_with(self.payload, HeatshrinkParams::W11_L4)
            }
            BlockCompression::Heatshrink12 => {
                heatshrink::decompress_with(self.payload, HeatshrinkParams::W12_L4)
            }
            BlockCompression::Unknown(method) => Err(ThumbnailError::DecompressionFailed(
                format!("unknown block compression {}", method),
            )),
        }
    }
}

/// Walks the block stream that follows the file header.
///
/// The walk ends at the first truncated block, or after a non-thumbnail
/// block whose compressed size is zero.
pub struct BlockIter<'a> {
    data: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> BlockIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: FILE_HEADER_SIZE,
            done: false,
        }
    }

    fn read_block(&self) -> Option<Block<'a>> {
        let header = BlockHeader::parse(self.data, self.pos)?;
        let params_offset = header.params_offset();
        let payload_offset = params_offset.checked_add(header.block_type.param_size())?;
        let payload_end = payload_offset.checked_add(header.compressed_size as usize)?;

        Some(Block {
            header,
            params: slice_at(self.data, params_offset, header.block_type.param_size())?,
            payload: self.data.get(payload_offset..payload_end)?,
            covered: self.data.get(header.offset..payload_end)?,
            crc: u32_le_at(self.data, payload_end),
        })
    }
}

impl<'a> Iterator for BlockIter<'a> {
    type Item = Block<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.data.len() {
            return None;
        }

        let Some(block) = self.read_block() else {
            tracing::debug!("Binary G-code block at {} is truncated", self.pos);
            self.done = true;
            return None;
        };

        tracing::trace!(
            "Block at {}: {:?} {:?} {} bytes",
            self.pos,
            block.header.block_type,
            block.header.compression,
            block.header.compressed_size
        );

        if block.header.compressed_size == 0 && block.header.block_type != BlockType::Thumbnail {
            self.done = true;
        }

        self.pos = block.header.params_offset()
            + block.header.block_type.param_size()
            + block.header.compressed_size as usize
            + CRC_SIZE;

        Some(block)
    }
}

/// A decompressed thumbnail block and the offset of its header.
#[derive(Debug, Clone)]
pub struct ThumbnailBlock {
    pub offset: usize,
    pub candidate: ThumbnailCandidate,
}

fn thumbnail_from_block(
    block: &Block<'_>,
    header: &FileHeader,
    config: &ExtractConfig,
) -> Option<ThumbnailBlock> {
    let offset = block.header.offset;
    let (format, width, height) = block.thumbnail_params()?;

    let Some(format) = thumbnail_format(format) else {
        tracing::debug!("Skipping thumbnail at {}: unknown format {}", offset, format);
        return None;
    };

    let verify = config.verify_checksums && header.checksum == ChecksumType::Crc32;
    if verify && !block.crc_matches() {
        tracing::debug!("Skipping thumbnail at {}: CRC mismatch", offset);
        return None;
    }

    match block.decompress() {
        Ok(payload) => Some(ThumbnailBlock {
            offset,
            candidate: ThumbnailCandidate {
                declared_width: width as u32,
                declared_height: height as u32,
                format: Some(format),
                payload,
            },
        }),
        Err(e) => {
            tracing::debug!("Skipping thumbnail at {}: {}", offset, e);
            None
        }
    }
}

/// Collects every thumbnail block that decompresses cleanly.
pub fn scan_blocks(data: &[u8], config: &ExtractConfig) -> Result<Vec<ThumbnailBlock>> {
    let header = FileHeader::parse(data)?;
    Ok(BlockIter::new(data)
        .filter_map(|block| thumbnail_from_block(&block, &header, config))
        .collect())
}

pub fn scan_thumbnails(data: &[u8]) -> Result<Vec<ThumbnailCandidate>> {
    Ok(scan_blocks(data, &ExtractConfig::default())?
        .into_iter()
        .map(|b| b.candidate)
        .collect())
}

/// Adapter for `.bgcode` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct BGCodeSource;

impl ThumbnailSource for BGCodeSource {
    fn file_types(&self) -> &'static [SlicerFileType] {
        &[SlicerFileType::BGCode]
    }

    fn list(&self, data: &[u8], config: &ExtractConfig) -> Result<Vec<ThumbnailInfo>> {
        Ok(scan_blocks(data, config)?
            .into_iter()
            .map(|block| ThumbnailInfo {
                location: format!("block at 0x{:x}", block.offset),
                declared_width: block.candidate.declared_width,
                declared_height: block.candidate.declared_height,
                format: block.candidate.format,
                payload_len: block.candidate.payload.len(),
            })
            .collect())
    }

    fn extract(&self, data: &[u8], config: &ExtractConfig) -> Result<RasterImage> {
        let candidates = scan_blocks(data, config)?
            .into_iter()
            .map(|b| b.candidate)
            .collect();
        decode_largest(candidates)
    }
}

/// Extracts the preview with the largest declared area.
pub fn extract_largest_thumbnail(data: &[u8], max_size: Option<Bounds>) -> Result<RasterImage> {
    let config = ExtractConfig::new().with_max_size(max_size);
    BGCodeSource
        .extract(data, &config)
        .map(|image| crate::raster::fit(image, &config))
}
