//! Locate and decode the preview image embedded in 3D-printing slicer output.
//!
//! Three containers are supported: 3MF packages (ZIP), plain-text G-code with
//! Base64 comment blocks, and Prusa binary G-code. Everything operates on a
//! fully materialised byte buffer; reading files is left to the caller.

pub mod bgcode;
mod config;
pub mod cursor;
mod error;
pub mod extract;
pub mod gcode;
pub mod heatshrink;
pub mod inflate;
pub mod qoi;
pub mod raster;
mod traits;
mod types;
pub mod zip;

pub use config::ExtractConfig;
pub use error::{Result, ThumbnailError};
pub use extract::{Extractor, extract, extract_with_extension, list_thumbnails, source_for};
pub use image::imageops::FilterType;
pub use raster::RasterImage;
pub use traits::ThumbnailSource;
pub use types::{Bounds, ImageFormat, SlicerFileType, ThumbnailCandidate, ThumbnailInfo};
