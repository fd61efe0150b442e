//! Synthetic ID3 and MP4 byte streams for tests.

pub const JPEG_IMAGE: &[u8] = b"\xFF\xD8\xFF\xE0\x00\x10JFIF\x00fake-jpeg-body\xFF\xD9";
pub const PNG_IMAGE: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDRfake-png-body";

pub fn synchsafe(n: u32) -> [u8; 4] {
    [
        ((n >> 21) & 0x7F) as u8,
        ((n >> 14) & 0x7F) as u8,
        ((n >> 7) & 0x7F) as u8,
        (n & 0x7F) as u8,
    ]
}

/// ID3v2 tag: 10-byte header followed by `body` (frames and padding).
pub fn id3_tag(major: u8, flags: u8, body: &[u8]) -> Vec<u8> {
    let mut out = b"ID3".to_vec();
    out.extend_from_slice(&[major, 0, flags]);
    out.extend_from_slice(&synchsafe(body.len() as u32));
    out.extend_from_slice(body);
    out
}

pub fn frame_v22(id: &[u8; 3], body: &[u8]) -> Vec<u8> {
    let size = (body.len() as u32).to_be_bytes();
    let mut out = id.to_vec();
    out.extend_from_slice(&size[1..]);
    out.extend_from_slice(body);
    out
}

pub fn frame_v23(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = id.to_vec();
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(body);
    out
}

pub fn frame_v24(id: &[u8; 4], format_flags: u8, body: &[u8]) -> Vec<u8> {
    let mut out = id.to_vec();
    out.extend_from_slice(&synchsafe(body.len() as u32));
    out.extend_from_slice(&[0, format_flags]);
    out.extend_from_slice(body);
    out
}

/// APIC body with a Latin-1 description.
pub fn apic_body(mime: &str, description: &str, image: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8];
    out.extend_from_slice(mime.as_bytes());
    out.push(0);
    out.push(3); // front cover
    out.extend_from_slice(description.as_bytes());
    out.push(0);
    out.extend_from_slice(image);
    out
}

/// Text frame body, used as a non-picture filler frame.
pub fn text_body(text: &str) -> Vec<u8> {
    let mut out = vec![0u8];
    out.extend_from_slice(text.as_bytes());
    out
}

/// Complete ID3v2.3 stream holding one APIC frame, followed by fake audio.
pub fn id3v23_with_apic(mime: &str, image: &[u8]) -> Vec<u8> {
    let frames = frame_v23(b"APIC", &apic_body(mime, "cover", image));
    let mut out = id3_tag(3, 0, &frames);
    out.extend_from_slice(b"\xFF\xFB\x90\x64audio");
    out
}

pub fn mp4_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);
    out
}

pub fn mp4_data_atom(image: &[u8]) -> Vec<u8> {
    let mut payload = vec![0, 0, 0, 13, 0, 0, 0, 0];
    payload.extend_from_slice(image);
    mp4_box(b"data", &payload)
}

/// `meta` full box (version/flags prefix) holding `hdlr` and `ilst`.
pub fn mp4_meta(ilst_payload: &[u8]) -> Vec<u8> {
    let mut payload = vec![0, 0, 0, 0];
    payload.extend_from_slice(&mp4_box(b"hdlr", &[0u8; 25]));
    payload.extend_from_slice(&mp4_box(b"ilst", ilst_payload));
    mp4_box(b"meta", &payload)
}

/// `ftyp` + `moov/udta/meta/ilst/covr/data` + `mdat`.
pub fn mp4_with_cover(image: &[u8]) -> Vec<u8> {
    let covr = mp4_box(b"covr", &mp4_data_atom(image));
    let moov = mp4_box(
        b"moov",
        &[
            mp4_box(b"mvhd", &[0u8; 100]),
            mp4_box(b"udta", &mp4_meta(&covr)),
        ]
        .concat(),
    );
    [
        mp4_box(b"ftyp", b"M4A \x00\x00\x00\x00M4A isom"),
        moov,
        mp4_box(b"mdat", b"audio-samples"),
    ]
    .concat()
}
