//! The port every container parser implements.
//!
//! Each slicer format gets one adapter; the extraction façade picks the
//! adapter for the declared file type and never inspects the bytes itself.

use crate::config::ExtractConfig;
use crate::error::Result;
use crate::raster::RasterImage;
use crate::types::{SlicerFileType, ThumbnailInfo};

/// A parser that can locate and decode the preview embedded in one family of
/// slicer files.
///
/// Implementations are stateless: every call is a pure function of its input
/// buffer, so one instance may serve concurrent callers.
pub trait ThumbnailSource: Send + Sync {
    /// File types this source handles.
    fn file_types(&self) -> &'static [SlicerFileType];

    /// Describes every preview candidate found, without decoding any of them.
    ///
    /// # Errors
    ///
    /// Fails only on framing faults of the container itself.
    fn list(&self, data: &[u8], config: &ExtractConfig) -> Result<Vec<ThumbnailInfo>>;

    /// Locates the preview and decodes it at its native size.
    ///
    /// Scaling to `config.max_size` is left to the caller.
    ///
    /// # Errors
    ///
    /// `InvalidContainer` or `CorruptedFile` on framing faults,
    /// `ThumbnailNotFound` when no candidate decodes.
    fn extract(&self, data: &[u8], config: &ExtractConfig) -> Result<RasterImage>;
}
