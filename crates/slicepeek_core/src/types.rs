/// Slicer output formats that carry an embedded preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlicerFileType {
    ThreeMf,
    GCode,
    Gco,
    BGCode,
}

impl SlicerFileType {
    pub const ALL: [SlicerFileType; 4] = [Self::ThreeMf, Self::GCode, Self::Gco, Self::BGCode];

    /// Resolves a file extension (without the leading dot) to a slicer format.
    ///
    /// Matching is exact and case-insensitive. Unknown extensions yield `None`
    /// so the caller decides whether that is fatal.
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.extension().eq_ignore_ascii_case(extension))
    }

    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::ThreeMf => "3mf",
            Self::GCode => "gcode",
            Self::Gco => "gco",
            Self::BGCode => "bgcode",
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ThreeMf => "3MF",
            Self::GCode | Self::Gco => "G-code",
            Self::BGCode => "Binary G-code",
        }
    }
}

impl std::fmt::Display for SlicerFileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Encoding of an embedded preview payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Qoi,
}

impl ImageFormat {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::Qoi => "QOI",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Upper bound for scale-to-fit, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub const fn square(side: u32) -> Self {
        Self {
            width: side,
            height: side,
        }
    }
}

/// A located preview, after container decompression and before image decode.
#[derive(Debug, Clone)]
pub struct ThumbnailCandidate {
    pub declared_width: u32,
    pub declared_height: u32,
    pub format: Option<ImageFormat>,
    pub payload: Vec<u8>,
}

impl ThumbnailCandidate {
    pub fn new(declared_width: u32, declared_height: u32, payload: Vec<u8>) -> Self {
        Self {
            declared_width,
            declared_height,
            format: crate::raster::sniff_format(&payload),
            payload,
        }
    }

    #[inline]
    #[must_use]
    pub const fn declared_area(&self) -> u64 {
        self.declared_width as u64 * self.declared_height as u64
    }
}

/// Summary of a candidate for listing, without the payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailInfo {
    pub location: String,
    pub declared_width: u32,
    pub declared_height: u32,
    pub format: Option<ImageFormat>,
    pub payload_len: usize,
}
