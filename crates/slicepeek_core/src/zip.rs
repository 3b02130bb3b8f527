//! Minimal ZIP reader for pulling the preview out of a 3MF package.
//!
//! Only what is needed to extract a single stored or deflated entry is
//! implemented. Sizes and the compression method always come from the central
//! directory: local headers written with a trailing data descriptor (flag bit
//! 3) carry zeroes there.

use memchr::memmem;

use crate::config::ExtractConfig;
use crate::cursor::{slice_at, u16_le_at, u32_le_at};
use crate::error::{Result, ThumbnailError};
use crate::inflate::inflate_raw;
use crate::raster::{RasterImage, decode_sniffed};
use crate::traits::ThumbnailSource;
use crate::types::{Bounds, SlicerFileType, ThumbnailInfo};

pub const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x0403_4B50;
pub const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0201_4B50;
pub const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4B50;

pub const LOCAL_FILE_HEADER_SIZE: usize = 30;
pub const CENTRAL_DIRECTORY_HEADER_SIZE: usize = 46;
pub const END_OF_CENTRAL_DIRECTORY_SIZE: usize = 22;
pub const MAX_COMMENT_LEN: usize = 65535;

/// Preview locations inside a 3MF package, most preferred first.
pub const THUMBNAIL_PATHS: [&str; 6] = [
    "Metadata/thumbnail.png",
    "Metadata/thumbnail.jpeg",
    "Metadata/thumbnail.jpg",
    "Thumbnails/thumbnail.png",
    "Thumbnails/thumbnail.jpeg",
    "Thumbnails/thumbnail.jpg",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Other(u16),
}

impl From<u16> for CompressionMethod {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::Stored,
            8 => Self::Deflate,
            other => Self::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LocalFileHeader {
    pub signature: u32,
    pub flags: u16,
    pub compression: u16,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub name_len: u16,
    pub extra_len: u16,
}

impl LocalFileHeader {
    pub fn from_bytes(data: &[u8], offset: usize) -> Option<Self> {
        slice_at(data, offset, LOCAL_FILE_HEADER_SIZE)?;
        Some(Self {
            signature: u32_le_at(data, offset)?,
            flags: u16_le_at(data, offset + 6)?,
            compression: u16_le_at(data, offset + 8)?,
            compressed_size: u32_le_at(data, offset + 18)?,
            uncompressed_size: u32_le_at(data, offset + 22)?,
            name_len: u16_le_at(data, offset + 26)?,
            extra_len: u16_le_at(data, offset + 28)?,
        })
    }

    #[inline]
    pub const fn has_data_descriptor(&self) -> bool {
        self.flags & 0x0008 != 0
    }

    /// Offset of the entry data for a header that starts at `header_offset`.
    #[inline]
    pub const fn data_offset(&self, header_offset: usize) -> usize {
        header_offset
            + LOCAL_FILE_HEADER_SIZE
            + self.name_len as usize
            + self.extra_len as usize
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CentralDirectoryHeader<'a> {
    pub flags: u16,
    pub compression: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub local_header_offset: u32,
    pub name: &'a [u8],
    pub record_len: usize,
}

impl<'a> CentralDirectoryHeader<'a> {
    /// Parses the record at `offset`, or `None` if the signature does not
    /// match or the record is truncated.
    pub fn from_bytes(data: &'a [u8], offset: usize) -> Option<Self> {
        if u32_le_at(data, offset)? != CENTRAL_DIRECTORY_SIGNATURE {
            return None;
        }
        slice_at(data, offset, CENTRAL_DIRECTORY_HEADER_SIZE)?;

        let name_len = u16_le_at(data, offset + 28)? as usize;
        let extra_len = u16_le_at(data, offset + 30)? as usize;
        let comment_len = u16_le_at(data, offset + 32)? as usize;
        let name = slice_at(data, offset + CENTRAL_DIRECTORY_HEADER_SIZE, name_len)?;

        Some(Self {
            flags: u16_le_at(data, offset + 8)?,
            compression: u16_le_at(data, offset + 10)?,
            crc32: u32_le_at(data, offset + 16)?,
            compressed_size: u32_le_at(data, offset + 20)?,
            uncompressed_size: u32_le_at(data, offset + 24)?,
            local_header_offset: u32_le_at(data, offset + 42)?,
            name,
            record_len: CENTRAL_DIRECTORY_HEADER_SIZE + name_len + extra_len + comment_len,
        })
    }

    #[inline]
    pub fn compression_method(&self) -> CompressionMethod {
        CompressionMethod::from(self.compression)
    }

    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(self.name).into_owned()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EndOfCentralDirectory {
    pub offset: usize,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub central_dir_size: u32,
    pub central_dir_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub fn from_bytes(data: &[u8], offset: usize) -> Option<Self> {
        if u32_le_at(data, offset)? != END_OF_CENTRAL_DIRECTORY_SIGNATURE {
            return None;
        }
        slice_at(data, offset, END_OF_CENTRAL_DIRECTORY_SIZE)?;

        Some(Self {
            offset,
            disk_entries: u16_le_at(data, offset + 8)?,
            total_entries: u16_le_at(data, offset + 10)?,
            central_dir_size: u32_le_at(data, offset + 12)?,
            central_dir_offset: u32_le_at(data, offset + 16)?,
            comment_len: u16_le_at(data, offset + 20)?,
        })
    }

    /// Scans backwards from the last position a record could start at,
    /// covering the largest possible archive comment.
    pub fn locate(data: &[u8]) -> Option<Self> {
        let last_start = data.len().checked_sub(END_OF_CENTRAL_DIRECTORY_SIZE)?;
        let lowest_start =
            last_start.saturating_sub(MAX_COMMENT_LEN + END_OF_CENTRAL_DIRECTORY_SIZE);
        let window = &data[lowest_start..last_start + 4];
        let signature = END_OF_CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes();

        let found = memmem::rfind(window, &signature)?;
        Self::from_bytes(data, lowest_start + found)
    }
}

/// A parsed view of the archive's central directory.
#[derive(Debug)]
pub struct ZipArchive<'a> {
    data: &'a [u8],
    entries: Vec<CentralDirectoryHeader<'a>>,
}

impl<'a> ZipArchive<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < LOCAL_FILE_HEADER_SIZE {
            return Err(ThumbnailError::InvalidContainer(format!(
                "{} bytes is too small for a ZIP archive",
                data.len()
            )));
        }
        if u32_le_at(data, 0) != Some(LOCAL_FILE_HEADER_SIGNATURE) {
            return Err(ThumbnailError::InvalidContainer(
                "missing ZIP local file header signature".into(),
            ));
        }

        let eocd = EndOfCentralDirectory::locate(data).ok_or_else(|| {
            ThumbnailError::CorruptedFile("end of central directory not found".into())
        })?;

        let mut entries = Vec::with_capacity(eocd.total_entries as usize);
        let mut pos = eocd.central_dir_offset as usize;
        for _ in 0..eocd.total_entries {
            let Some(entry) = CentralDirectoryHeader::from_bytes(data, pos) else {
                tracing::debug!(
                    "Central directory walk stopped at offset {} after {} of {} entries",
                    pos,
                    entries.len(),
                    eocd.total_entries
                );
                break;
            };
            pos += entry.record_len;
            entries.push(entry);
        }

        Ok(Self { data, entries })
    }

    #[inline]
    pub fn entries(&self) -> &[CentralDirectoryHeader<'a>] {
        &self.entries
    }

    pub fn find(&self, name: &str) -> Option<&CentralDirectoryHeader<'a>> {
        self.entries.iter().find(|e| e.name == name.as_bytes())
    }

    /// Reads and decompresses one entry.
    pub fn read(&self, entry: &CentralDirectoryHeader<'a>) -> Result<Vec<u8>> {
        let header_offset = entry.local_header_offset as usize;
        let local = LocalFileHeader::from_bytes(self.data, header_offset).ok_or_else(|| {
            ThumbnailError::CorruptedFile(format!(
                "local header at {} is out of bounds",
                header_offset
            ))
        })?;
        if local.signature != LOCAL_FILE_HEADER_SIGNATURE {
            return Err(ThumbnailError::CorruptedFile(format!(
                "bad local header signature at {}",
                header_offset
            )));
        }

        if !local.has_data_descriptor() && local.compressed_size != entry.compressed_size {
            tracing::debug!(
                "Local header of {} declares {} bytes, central directory {}",
                entry.name_lossy(),
                local.compressed_size,
                entry.compressed_size
            );
        }

        let data_offset = local.data_offset(header_offset);
        let compressed = slice_at(self.data, data_offset, entry.compressed_size as usize)
            .ok_or_else(|| {
                ThumbnailError::CorruptedFile(format!(
                    "entry data {}+{} exceeds archive size {}",
                    data_offset,
                    entry.compressed_size,
                    self.data.len()
                ))
            })?;

        match entry.compression_method() {
            CompressionMethod::Stored => Ok(compressed.to_vec()),
            CompressionMethod::Deflate => inflate_raw(compressed, entry.uncompressed_size as usize),
            CompressionMethod::Other(method) => Err(ThumbnailError::DecompressionFailed(format!(
                "unsupported ZIP compression method {}",
                method
            ))),
        }
    }
}

/// Returns the bytes of the first entry in `names` present in the archive.
pub fn extract_entry(data: &[u8], names: &[&str]) -> Result<Vec<u8>> {
    let archive = ZipArchive::parse(data)?;
    names
        .iter()
        .find_map(|name| archive.find(name))
        .ok_or(ThumbnailError::ThumbnailNotFound)
        .and_then(|entry| archive.read(entry))
}

/// Lists the preview entries of a 3MF package in priority order.
pub fn list_entries(data: &[u8]) -> Result<Vec<ThumbnailInfo>> {
    let archive = ZipArchive::parse(data)?;
    let mut found = Vec::new();

    for path in THUMBNAIL_PATHS {
        let Some(entry) = archive.find(path) else { continue };
        let (width, height, format) = match archive.read(entry) {
            Ok(bytes) => {
                let (w, h) = imagesize::blob_size(&bytes)
                    .map(|size| (size.width as u32, size.height as u32))
                    .unwrap_or((0, 0));
                (w, h, crate::raster::sniff_format(&bytes))
            }
            Err(e) => {
                tracing::debug!("Could not read {}: {}", path, e);
                (0, 0, None)
            }
        };

        found.push(ThumbnailInfo {
            location: path.to_string(),
            declared_width: width,
            declared_height: height,
            format,
            payload_len: entry.uncompressed_size as usize,
        });
    }

    Ok(found)
}

/// Adapter for 3MF packages.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreeMfSource;

impl ThumbnailSource for ThreeMfSource {
    fn file_types(&self) -> &'static [SlicerFileType] {
        &[SlicerFileType::ThreeMf]
    }

    fn list(&self, data: &[u8], _config: &ExtractConfig) -> Result<Vec<ThumbnailInfo>> {
        list_entries(data)
    }

    fn extract(&self, data: &[u8], _config: &ExtractConfig) -> Result<RasterImage> {
        let archive = ZipArchive::parse(data)?;

        for path in THUMBNAIL_PATHS {
            let Some(entry) = archive.find(path) else { continue };
            match archive.read(entry).and_then(|bytes| decode_sniffed(&bytes)) {
                Ok(image) => {
                    tracing::debug!("Decoded 3MF preview from {}", path);
                    return Ok(image);
                }
                Err(e) => tracing::debug!("Skipping {}: {}", path, e),
            }
        }

        Err(ThumbnailError::ThumbnailNotFound)
    }
}

/// Extracts and decodes the preview of a 3MF package.
pub fn extract_thumbnail(data: &[u8], max_size: Option<Bounds>) -> Result<RasterImage> {
    let config = ExtractConfig::new().with_max_size(max_size);
    ThreeMfSource
        .extract(data, &config)
        .map(|image| crate::raster::fit(image, &config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut central = Vec::new();

        for (name, data) in entries {
            let offset = out.len() as u32;
            out.extend_from_slice(&LOCAL_FILE_HEADER_SIGNATURE.to_le_bytes());
            out.extend_from_slice(&[20, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&(data.len() as u32).to_le_bytes());
            out.extend_from_slice(&(data.len() as u32).to_le_bytes());
            out.extend_from_slice(&(name.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(data);

            central.extend_from_slice(&CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes());
            central.extend_from_slice(&[20, 0, 20, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
            central.extend_from_slice(&0u32.to_le_bytes());
            central.extend_from_slice(&(data.len() as u32).to_le_bytes());
            central.extend_from_slice(&(data.len() as u32).to_le_bytes());
            central.extend_from_slice(&(name.len() as u16).to_le_bytes());
            central.extend_from_slice(&[0; 12]);
            central.extend_from_slice(&offset.to_le_bytes());
            central.extend_from_slice(name.as_bytes());
        }

        let cd_offset = out.len() as u32;
        out.extend_from_slice(&central);
        out.extend_from_slice(&END_OF_CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&[0, 0, 0, 0]);
        out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        out.extend_from_slice(&(central.len() as u32).to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out
    }

    #[test]
    fn test_rejects_short_and_unsigned_buffers() {
        assert!(matches!(
            ZipArchive::parse(&[0x50, 0x4B, 0x03, 0x04]),
            Err(ThumbnailError::InvalidContainer(_))
        ));
        assert!(matches!(
            ZipArchive::parse(&[0u8; 64]),
            Err(ThumbnailError::InvalidContainer(_))
        ));
    }

    #[test]
    fn test_missing_eocd_is_corrupted() {
        let mut data = stored_zip(&[("a.txt", b"hello")]);
        let len = data.len();
        data[len - 22..len - 18].copy_from_slice(&[0; 4]);
        assert!(matches!(
            ZipArchive::parse(&data),
            Err(ThumbnailError::CorruptedFile(_))
        ));
    }

    #[test]
    fn test_walks_all_entries() {
        let data = stored_zip(&[("a.txt", b"one"), ("dir/b.bin", b"two"), ("c", b"")]);
        let archive = ZipArchive::parse(&data).unwrap();
        let names: Vec<_> = archive.entries().iter().map(|e| e.name_lossy()).collect();
        assert_eq!(names, vec!["a.txt", "dir/b.bin", "c"]);
        assert_eq!(archive.read(archive.find("dir/b.bin").unwrap()).unwrap(), b"two");
    }

    #[test]
    fn test_extract_entry_priority_order() {
        let data = stored_zip(&[("second", b"2"), ("first", b"1")]);
        assert_eq!(extract_entry(&data, &["first", "second"]).unwrap(), b"1");
        assert_eq!(extract_entry(&data, &["missing", "second"]).unwrap(), b"2");
        assert!(matches!(
            extract_entry(&data, &["missing"]),
            Err(ThumbnailError::ThumbnailNotFound)
        ));
    }

    #[test]
    fn test_name_match_is_exact() {
        let data = stored_zip(&[("Metadata/Thumbnail.png", b"x")]);
        assert!(matches!(
            extract_entry(&data, &["Metadata/thumbnail.png"]),
            Err(ThumbnailError::ThumbnailNotFound)
        ));
    }

    #[test]
    fn test_eocd_found_behind_comment() {
        let mut data = stored_zip(&[("a", b"payload")]);
        let len = data.len();
        let comment = b"archive comment";
        data[len - 2..].copy_from_slice(&(comment.len() as u16).to_le_bytes());
        data.extend_from_slice(comment);
        let eocd = EndOfCentralDirectory::locate(&data).unwrap();
        assert_eq!(eocd.offset, len - END_OF_CENTRAL_DIRECTORY_SIZE);
        assert_eq!(extract_entry(&data, &["a"]).unwrap(), b"payload");
    }

    #[test]
    fn test_unknown_compression_fails() {
        let mut data = stored_zip(&[("a", b"abc")]);
        let cd = EndOfCentralDirectory::locate(&data).unwrap().central_dir_offset as usize;
        data[cd + 10..cd + 12].copy_from_slice(&12u16.to_le_bytes());
        assert!(matches!(
            extract_entry(&data, &["a"]),
            Err(ThumbnailError::DecompressionFailed(_))
        ));
    }

    #[test]
    fn test_bad_local_header_is_corrupted() {
        let mut data = stored_zip(&[("a", b"abc"), ("b", b"def")]);
        let archive_b_offset = {
            let archive = ZipArchive::parse(&data).unwrap();
            archive.find("b").unwrap().local_header_offset as usize
        };
        data[archive_b_offset] = 0;
        assert!(matches!(
            extract_entry(&data, &["b"]),
            Err(ThumbnailError::CorruptedFile(_))
        ));
    }

    #[test]
    fn test_local_sizes_ignored_without_descriptor_flag() {
        let mut data = stored_zip(&[("a", b"abc")]);
        data[18..26].copy_from_slice(&[0xFF; 8]);
        let local = LocalFileHeader::from_bytes(&data, 0).unwrap();
        assert!(!local.has_data_descriptor());
        assert_eq!(extract_entry(&data, &["a"]).unwrap(), b"abc");

        data[6] |= 0x08;
        assert!(LocalFileHeader::from_bytes(&data, 0).unwrap().has_data_descriptor());
        assert_eq!(extract_entry(&data, &["a"]).unwrap(), b"abc");
    }

    #[test]
    fn test_truncated_central_directory_stops_walk() {
        let mut data = stored_zip(&[("a", b"1"), ("b", b"2")]);
        let cd = EndOfCentralDirectory::locate(&data).unwrap().central_dir_offset as usize;
        let second = cd + CENTRAL_DIRECTORY_HEADER_SIZE + 1;
        data[second] = 0;
        let archive = ZipArchive::parse(&data).unwrap();
        assert_eq!(archive.entries().len(), 1);
    }
}
