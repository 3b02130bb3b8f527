//! Adapter over `flate2` for the deflate streams found in ZIP entries and
//! binary G-code blocks.

use std::io::Read;

use flate2::read::{DeflateDecoder, ZlibDecoder};

use crate::error::{Result, ThumbnailError};

/// Largest output buffer reserved up front; a declared size beyond this still
/// decodes, it just grows the buffer as it goes.
const MAX_PREALLOCATION: usize = 16 * 1024 * 1024;

/// Inflates a raw deflate stream that must produce exactly `expected_len` bytes.
pub fn inflate_raw(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    read_exact_len(DeflateDecoder::new(data), expected_len)
}

/// Inflates a zlib-wrapped stream, retrying as raw deflate when the zlib
/// header is absent or invalid.
pub fn inflate_zlib_or_raw(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    match read_exact_len(ZlibDecoder::new(data), expected_len) {
        Ok(out) => Ok(out),
        Err(zlib_err) => {
            tracing::trace!("zlib inflate failed ({}), retrying as raw deflate", zlib_err);
            inflate_raw(data, expected_len)
        }
    }
}

fn read_exact_len<R: Read>(decoder: R, expected_len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len.min(MAX_PREALLOCATION));
    let limit = (expected_len as u64).saturating_add(1);

    decoder
        .take(limit)
        .read_to_end(&mut out)
        .map_err(|e| ThumbnailError::DecompressionFailed(e.to_string()))?;

    if out.len() != expected_len {
        return Err(ThumbnailError::DecompressionFailed(format!(
            "expected {} inflated bytes, got {}{}",
            expected_len,
            out.len().min(expected_len),
            if out.len() > expected_len { "+" } else { "" }
        )));
    }

    Ok(out)
}
