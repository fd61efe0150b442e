/// Image format of an embedded picture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Unknown,
}

impl ImageKind {
    /// Maps a declared MIME type (or ID3v2.2 image format) to an image kind.
    ///
    /// Anything that is not PNG is assumed to be JPEG.
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.trim().to_ascii_lowercase();
        match mime.as_str() {
            "image/png" | "png" => ImageKind::Png,
            _ => ImageKind::Jpeg,
        }
    }

    /// Detects the image kind from magic bytes.
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(b"\xFF\xD8") {
            ImageKind::Jpeg
        } else if bytes.starts_with(b"\x89PNG") {
            ImageKind::Png
        } else {
            ImageKind::Unknown
        }
    }

    /// File extension used for cached images, including the dot
    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Png => ".png",
            ImageKind::Jpeg | ImageKind::Unknown => ".jpg",
        }
    }
}

/// Picture bytes pulled out of a container, before they are cached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArtwork {
    pub data: Vec<u8>,
    pub kind: ImageKind,
}

impl RawArtwork {
    pub fn new(data: Vec<u8>, kind: ImageKind) -> Self {
        Self { data, kind }
    }
}
