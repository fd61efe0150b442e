//! Byte-level helpers shared by the container parsers.
//!
//! Slice arguments must be at least as long as the integer they decode;
//! callers check bounds before decoding.

use std::io::{self, Read, Seek, SeekFrom};

pub fn be_u24(b: &[u8]) -> u32 {
    u32::from_be_bytes([0, b[0], b[1], b[2]])
}

pub fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

pub fn be_u64(b: &[u8]) -> u64 {
    u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}

/// Decodes a 4-byte synch-safe integer (7 significant bits per byte).
///
/// Returns `None` when any byte has its high bit set.
pub fn synchsafe_u32(b: &[u8]) -> Option<u32> {
    b[..4]
        .iter()
        .try_fold(0u32, |acc, &byte| (byte & 0x80 == 0).then_some((acc << 7) | byte as u32))
}

/// Reverses ID3 unsynchronisation: every `FF 00` pair becomes `FF`.
pub fn remove_unsync(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut prev = 0u8;
    for &byte in data {
        if !(prev == 0xFF && byte == 0x00) {
            out.push(byte);
        }
        prev = byte;
    }
    out
}

/// Reads until `buf` is full or the stream ends. Returns the number of bytes read.
pub fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Total length of the stream. The read position is left unchanged.
pub fn stream_len<R: Seek>(reader: &mut R) -> io::Result<u64> {
    let current = reader.stream_position()?;
    let len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(current))?;
    Ok(len)
}
