//! Bounds-checked fixed-width reads over a byte slice.
//!
//! Every read returns `None` instead of panicking when it would run past the
//! end of the buffer, so parsers can turn truncation into their own error.

#[inline]
pub fn u16_le_at(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

#[inline]
pub fn u32_le_at(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
pub fn u32_be_at(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
pub fn slice_at(data: &[u8], offset: usize, len: usize) -> Option<&[u8]> {
    data.get(offset..offset.checked_add(len)?)
}

/// Sequential little-endian reader with an explicit position.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    #[inline]
    pub const fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn read_u16_le(&mut self) -> Option<u16> {
        let value = u16_le_at(self.data, self.pos)?;
        self.pos += 2;
        Some(value)
    }

    pub fn read_u32_le(&mut self) -> Option<u32> {
        let value = u32_le_at(self.data, self.pos)?;
        self.pos += 4;
        Some(value)
    }
}
