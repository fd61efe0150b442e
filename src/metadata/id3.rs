//! ID3v2 reader that looks for the first attached picture.
//!
//! Handles v2.2, v2.3 and v2.4 frame layouts. Any inconsistency between
//! declared sizes and the bytes actually present is reported as corruption.

use std::io::{Read, Seek, SeekFrom};

use log::debug;

use super::{
    MAX_ARTWORK_LEN, ParseResult,
    binary::{be_u24, be_u32, read_up_to, remove_unsync, stream_len, synchsafe_u32},
    corrupt,
};
use crate::domain::artwork::{ImageKind, RawArtwork};

const HEADER_LEN: usize = 10;

const TAG_UNSYNC: u8 = 0x80;
/// Extended header in v2.3/v2.4, whole-tag compression in v2.2
const TAG_EXTENDED: u8 = 0x40;

#[derive(Debug)]
struct TagHeader {
    major: u8,
    flags: u8,
    size: u32,
}

impl TagHeader {
    fn parse(bytes: &[u8]) -> ParseResult<Self> {
        if bytes.len() < HEADER_LEN || &bytes[..3] != b"ID3" {
            return Err(corrupt("missing ID3v2 header"));
        }

        let major = bytes[3];
        if !(2..=4).contains(&major) {
            return Err(corrupt(format!("unsupported ID3v2 version 2.{major}")));
        }

        let size = synchsafe_u32(&bytes[6..10])
            .ok_or_else(|| corrupt("tag size is not a synch-safe integer"))?;

        Ok(Self {
            major,
            flags: bytes[5],
            size,
        })
    }
}

/// Frame header layout for one major version
struct FrameLayout {
    major: u8,
    id_len: usize,
    header_len: usize,
    picture_id: &'static [u8],
    /// v2.4 header unsync flag: every frame is unsynchronised
    tag_unsync: bool,
}

impl FrameLayout {
    fn for_tag(header: &TagHeader) -> Self {
        let major = header.major;
        let tag_unsync = major == 4 && header.flags & TAG_UNSYNC != 0;
        match major {
            2 => Self {
                major,
                id_len: 3,
                header_len: 6,
                picture_id: b"PIC",
                tag_unsync,
            },
            _ => Self {
                major,
                id_len: 4,
                header_len: 10,
                picture_id: b"APIC",
                tag_unsync,
            },
        }
    }

    fn frame_size(&self, header: &[u8]) -> ParseResult<usize> {
        let size = &header[self.id_len..];
        let size = match self.major {
            2 => be_u24(size),
            3 => be_u32(size),
            _ => synchsafe_u32(size)
                .ok_or_else(|| corrupt("frame size is not a synch-safe integer"))?,
        };
        Ok(size as usize)
    }

    /// Second flags byte (format flags); v2.2 frames have none
    fn format_flags(&self, header: &[u8]) -> u8 {
        if self.major == 2 { 0 } else { header[9] }
    }
}

/// Reads the ID3v2 tag at the start of `reader` and returns its first picture.
pub fn extract<R: Read + Seek>(reader: &mut R) -> ParseResult<Option<RawArtwork>> {
    let len = stream_len(reader)?;
    reader.seek(SeekFrom::Start(0))?;

    let mut header = [0u8; HEADER_LEN];
    let n = read_up_to(reader, &mut header)?;
    let header = TagHeader::parse(&header[..n])?;

    if HEADER_LEN as u64 + header.size as u64 > len {
        return Err(corrupt(format!(
            "tag size {} exceeds stream length {len}",
            header.size
        )));
    }

    if header.major == 2 && header.flags & TAG_EXTENDED != 0 {
        debug!("compressed ID3v2.2 tag, no picture read");
        return Ok(None);
    }

    let mut body = vec![0u8; header.size as usize];
    reader.read_exact(&mut body)?;

    // v2.4 resynchronises frame by frame, see `frame_content`
    if header.major < 4 && header.flags & TAG_UNSYNC != 0 {
        body = remove_unsync(&body);
    }

    let frames_start = if header.major >= 3 && header.flags & TAG_EXTENDED != 0 {
        extended_header_len(&body, header.major)?
    } else {
        0
    };

    find_picture(&body[frames_start..], &FrameLayout::for_tag(&header))
}

fn extended_header_len(body: &[u8], major: u8) -> ParseResult<usize> {
    if body.len() < 4 {
        return Err(corrupt("truncated extended header"));
    }

    // v2.3 counts the size field out of the size, v2.4 counts it in
    let len = match major {
        3 => be_u32(body) as usize + 4,
        _ => synchsafe_u32(body)
            .ok_or_else(|| corrupt("extended header size is not synch-safe"))?
            as usize,
    };

    if len > body.len() {
        return Err(corrupt("extended header runs past the tag"));
    }
    Ok(len)
}

fn find_picture(frames: &[u8], layout: &FrameLayout) -> ParseResult<Option<RawArtwork>> {
    let mut pos = 0;

    while pos + layout.header_len <= frames.len() {
        let header = &frames[pos..pos + layout.header_len];
        let id = &header[..layout.id_len];

        // padding
        if id[0] == 0 {
            break;
        }
        if !id.iter().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
            return Err(corrupt(format!("invalid frame id at tag offset {pos}")));
        }

        let body_start = pos + layout.header_len;
        let body_end = body_start
            .checked_add(layout.frame_size(header)?)
            .filter(|end| *end <= frames.len())
            .ok_or_else(|| {
                corrupt(format!(
                    "frame {} runs past the tag boundary",
                    String::from_utf8_lossy(id)
                ))
            })?;

        if id == layout.picture_id {
            let flags = layout.format_flags(header);
            let picture = frame_content(&frames[body_start..body_end], flags, layout)?
                .map(|content| parse_picture(&content, layout.major))
                .transpose()?
                .flatten();

            if picture.is_some() {
                return Ok(picture);
            }
        }

        pos = body_end;
    }

    Ok(None)
}

/// Undoes per-frame encodings. `None` for frames that cannot be read
/// without decompression or decryption.
fn frame_content(body: &[u8], flags: u8, layout: &FrameLayout) -> ParseResult<Option<Vec<u8>>> {
    let (skipped, grouped, prefixed, unsync) = match layout.major {
        3 => (flags & 0xC0 != 0, flags & 0x20 != 0, false, false),
        4 => (
            flags & 0x0C != 0,
            flags & 0x40 != 0,
            flags & 0x01 != 0,
            flags & 0x02 != 0 || layout.tag_unsync,
        ),
        _ => (false, false, false, false),
    };

    if skipped {
        debug!("skipping compressed or encrypted picture frame");
        return Ok(None);
    }

    let extra = grouped as usize + if prefixed { 4 } else { 0 };
    if extra > body.len() {
        return Err(corrupt("picture frame shorter than its flag fields"));
    }

    let body = &body[extra..];
    Ok(Some(if unsync {
        remove_unsync(body)
    } else {
        body.to_vec()
    }))
}

/// `[encoding][MIME or 3-char format][picture type][description][image]`
fn parse_picture(body: &[u8], major: u8) -> ParseResult<Option<RawArtwork>> {
    let (&encoding, rest) = body
        .split_first()
        .ok_or_else(|| corrupt("empty picture frame"))?;

    let (mime, rest) = if major == 2 {
        if rest.len() < 3 {
            return Err(corrupt("truncated picture format"));
        }
        (String::from_utf8_lossy(&rest[..3]), &rest[3..])
    } else {
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| corrupt("unterminated picture MIME type"))?;
        (String::from_utf8_lossy(&rest[..end]), &rest[end + 1..])
    };

    let (_picture_type, rest) = rest
        .split_first()
        .ok_or_else(|| corrupt("missing picture type"))?;

    let image = skip_text(rest, encoding)?;
    if image.is_empty() {
        return Ok(None);
    }
    if image.len() as u64 > MAX_ARTWORK_LEN {
        return Err(corrupt(format!("picture of {} bytes is too large", image.len())));
    }

    Ok(Some(RawArtwork::new(
        image.to_vec(),
        ImageKind::from_mime(&mime),
    )))
}

/// Skips a terminated string in the given ID3 text encoding.
fn skip_text(bytes: &[u8], encoding: u8) -> ParseResult<&[u8]> {
    let end = match encoding {
        // Latin-1, UTF-8
        0 | 3 => bytes.iter().position(|&b| b == 0).map(|i| i + 1),
        // UTF-16 with BOM, UTF-16BE
        1 | 2 => bytes
            .chunks_exact(2)
            .position(|pair| pair[0] == 0 && pair[1] == 0)
            .map(|i| i * 2 + 2),
        other => return Err(corrupt(format!("unknown text encoding {other}"))),
    };

    end.map(|end| &bytes[end..])
        .ok_or_else(|| corrupt("unterminated picture description"))
}
