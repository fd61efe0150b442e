//! Container sniffing and embedded artwork parsing

use std::io::{self, Read, Seek, SeekFrom};

use thiserror::Error;

use crate::domain::artwork::RawArtwork;

pub mod binary;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod id3;
pub mod mp4;

/// Largest picture the parsers will allocate for
pub const MAX_ARTWORK_LEN: u64 = 64 * 1024 * 1024;

/// Bytes needed to classify a stream
const SNIFF_LEN: usize = 12;

/// Box types that can open an ISO-BMFF file
const MP4_LEADING_BOXES: &[&[u8; 4]] = &[b"ftyp", b"moov", b"free", b"mdat", b"skip", b"wide"];

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("corrupt structure: {0}")]
    Corrupt(String),

    #[error("read error: {0}")]
    Io(#[from] io::Error),
}

pub type ParseResult<T> = Result<T, ParseError>;

pub(crate) fn corrupt(reason: impl Into<String>) -> ParseError {
    ParseError::Corrupt(reason.into())
}

/// Tag container found at the start of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Id3,
    Mp4,
    Unsupported,
}

impl ContainerKind {
    /// Classifies a stream from its leading bytes. Never fails.
    pub fn classify(head: &[u8]) -> Self {
        if head.starts_with(b"ID3") {
            return ContainerKind::Id3;
        }

        if head.len() >= 8 {
            let size = binary::be_u32(&head[..4]);
            let kind = &head[4..8];
            let plausible_size = size == 0 || size == 1 || size >= 8;
            if plausible_size && MP4_LEADING_BOXES.iter().any(|b| &b[..] == kind) {
                return ContainerKind::Mp4;
            }
        }

        ContainerKind::Unsupported
    }

    /// Reads the leading bytes of `reader` and classifies them.
    ///
    /// The reader is rewound to the start afterwards.
    pub fn probe<R: Read + Seek>(reader: &mut R) -> io::Result<Self> {
        let mut head = [0u8; SNIFF_LEN];
        reader.seek(SeekFrom::Start(0))?;
        let n = binary::read_up_to(reader, &mut head)?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self::classify(&head[..n]))
    }
}

/// Runs the parser matching `kind`.
///
/// `Ok(None)` means the container was read cleanly but carries no picture.
pub fn extract_artwork<R: Read + Seek>(
    kind: ContainerKind,
    reader: &mut R,
) -> ParseResult<Option<RawArtwork>> {
    match kind {
        ContainerKind::Id3 => id3::extract(reader),
        ContainerKind::Mp4 => mp4::extract(reader),
        ContainerKind::Unsupported => Ok(None),
    }
}
