use image::imageops::FilterType;

use crate::types::Bounds;

/// Options shared by every extraction path.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Shrink the decoded preview to fit inside this bound.
    pub max_size: Option<Bounds>,
    /// Verify the CRC32 trailer of binary G-code blocks when the file
    /// header declares one. Mismatching blocks are skipped.
    pub verify_checksums: bool,
    /// Interpolation used when shrinking.
    pub filter: FilterType,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            max_size: None,
            verify_checksums: false,
            filter: FilterType::Lanczos3,
        }
    }
}

impl ExtractConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_size(mut self, max_size: Option<Bounds>) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_checksum_verification(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }
}
