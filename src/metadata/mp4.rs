//! ISO-BMFF box walker that finds the iTunes `covr` atom.

use std::io::{Read, Seek, SeekFrom};

use super::{
    MAX_ARTWORK_LEN, ParseResult,
    binary::{be_u32, be_u64, stream_len},
    corrupt,
};
use crate::domain::artwork::{ImageKind, RawArtwork};

const HEADER_LEN: u64 = 8;
const LARGE_HEADER_LEN: u64 = 16;

/// Type indicator and locale in front of a `data` atom's value
const DATA_PREFIX_LEN: u64 = 8;

/// Where iTunes-style cover art lives, most common layout first
const COVER_PATHS: &[&[&[u8; 4]]] = &[
    &[b"moov", b"udta", b"meta", b"ilst", b"covr"],
    &[b"moov", b"meta", b"ilst", b"covr"],
];

#[derive(Debug, Clone, Copy)]
struct BoxHeader {
    kind: [u8; 4],
    payload_start: u64,
    end: u64,
}

impl BoxHeader {
    fn name(&self) -> String {
        String::from_utf8_lossy(&self.kind).into_owned()
    }

    fn payload_len(&self) -> u64 {
        self.end - self.payload_start
    }
}

/// Walks the box tree of `reader` and returns the first cover image.
pub fn extract<R: Read + Seek>(reader: &mut R) -> ParseResult<Option<RawArtwork>> {
    let len = stream_len(reader)?;

    for path in COVER_PATHS {
        if let Some(covr) = descend(reader, 0, len, path)? {
            return read_cover(reader, &covr);
        }
    }

    Ok(None)
}

fn read_header<R: Read + Seek>(
    reader: &mut R,
    start: u64,
    parent_end: u64,
) -> ParseResult<BoxHeader> {
    reader.seek(SeekFrom::Start(start))?;
    let mut buf = [0u8; HEADER_LEN as usize];
    reader.read_exact(&mut buf)?;

    let kind = [buf[4], buf[5], buf[6], buf[7]];
    let (header_len, size) = match be_u32(&buf) {
        // extends to the end of the enclosing box (or file)
        0 => (HEADER_LEN, parent_end - start),
        1 => {
            if start + LARGE_HEADER_LEN > parent_end {
                return Err(corrupt("truncated 64-bit box size"));
            }
            let mut large = [0u8; 8];
            reader.read_exact(&mut large)?;
            (LARGE_HEADER_LEN, be_u64(&large))
        }
        n => (HEADER_LEN, n as u64),
    };

    let header = BoxHeader {
        kind,
        payload_start: start + header_len,
        end: start.saturating_add(size),
    };

    if size < header_len {
        return Err(corrupt(format!(
            "box '{}' declares {size} bytes, less than its header",
            header.name()
        )));
    }
    if header.end > parent_end {
        return Err(corrupt(format!(
            "box '{}' at offset {start} runs past its parent",
            header.name()
        )));
    }

    Ok(header)
}

/// Finds the first child of type `kind` within `[start, end)`.
fn find_child<R: Read + Seek>(
    reader: &mut R,
    start: u64,
    end: u64,
    kind: &[u8; 4],
) -> ParseResult<Option<BoxHeader>> {
    let mut pos = start;

    // fewer than 8 trailing bytes cannot hold a box; writers pad with zeros
    while pos + HEADER_LEN <= end {
        let header = read_header(reader, pos, end)?;
        if &header.kind == kind {
            return Ok(Some(header));
        }
        pos = header.end;
    }

    Ok(None)
}

/// Follows `path` one box at a time. Recursion never goes deeper than
/// `path.len()`, whatever the file nests.
fn descend<R: Read + Seek>(
    reader: &mut R,
    start: u64,
    end: u64,
    path: &[&[u8; 4]],
) -> ParseResult<Option<BoxHeader>> {
    let Some((kind, rest)) = path.split_first() else {
        return Ok(None);
    };

    let Some(found) = find_child(reader, start, end, kind)? else {
        return Ok(None);
    };
    if rest.is_empty() {
        return Ok(Some(found));
    }

    let children_start = if &found.kind == b"meta" {
        meta_children_start(reader, &found)?
    } else {
        found.payload_start
    };

    descend(reader, children_start, found.end, rest)
}

/// `meta` is a full box: 4 bytes of version/flags precede its children.
/// QuickTime-style files omit them, which shows as `hdlr` right after the header.
fn meta_children_start<R: Read + Seek>(reader: &mut R, meta: &BoxHeader) -> ParseResult<u64> {
    if meta.payload_len() < 4 {
        return Err(corrupt("meta box too short for version and flags"));
    }

    if meta.payload_len() >= HEADER_LEN {
        reader.seek(SeekFrom::Start(meta.payload_start))?;
        let mut peek = [0u8; HEADER_LEN as usize];
        reader.read_exact(&mut peek)?;
        if &peek[4..] == b"hdlr" {
            return Ok(meta.payload_start);
        }
    }

    Ok(meta.payload_start + 4)
}

fn read_cover<R: Read + Seek>(reader: &mut R, covr: &BoxHeader) -> ParseResult<Option<RawArtwork>> {
    let Some(data) = find_child(reader, covr.payload_start, covr.end, b"data")? else {
        return Ok(None);
    };

    let image_len = data
        .payload_len()
        .checked_sub(DATA_PREFIX_LEN)
        .ok_or_else(|| corrupt("data atom shorter than its type and locale fields"))?;
    if image_len == 0 {
        return Ok(None);
    }
    if image_len > MAX_ARTWORK_LEN {
        return Err(corrupt(format!("cover of {image_len} bytes is too large")));
    }

    reader.seek(SeekFrom::Start(data.payload_start + DATA_PREFIX_LEN))?;
    let mut image = vec![0u8; image_len as usize];
    reader.read_exact(&mut image)?;

    let kind = ImageKind::sniff(&image);
    Ok(Some(RawArtwork::new(image, kind)))
}
