//! Embedded tag extraction.
//!
//! Two formats are read natively: FLAC Vorbis comments and MP3 ID3v1
//! trailers. Anything else yields no tags (the file can still be catalogued
//! when folder metadata suffices). Readers are total: parse failures and
//! I/O errors of any kind come back as `None`, never as an error.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Tag fields relevant to the catalog. Every field is optional; a record
/// with no album tag will be rejected later by the scanner's admission
/// filters, not here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagInfo {
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub artist: Option<String>,
    pub year: Option<String>,
    pub title: Option<String>,
}

/// Read embedded tags for a file of the given (lowercased) extension.
pub fn read_tags(path: &Path, ext: &str) -> Option<TagInfo> {
    match ext {
        "flac" => read_flac(path),
        "mp3" => read_id3v1(path),
        _ => None,
    }
}

const FLAC_MAGIC: &[u8; 4] = b"fLaC";
const BLOCK_VORBIS_COMMENT: u8 = 4;

/// Walk FLAC metadata blocks until the Vorbis comment block. Header layout:
/// 1 byte (last-block flag in bit 7, type in bits 0..7), 24-bit big-endian
/// length, then the payload.
fn read_flac(path: &Path) -> Option<TagInfo> {
    let mut file = File::open(path).ok()?;

    let mut magic = [0u8; 4];
    file.read_exact(&mut magic).ok()?;
    if &magic != FLAC_MAGIC {
        return None;
    }

    loop {
        let mut header = [0u8; 4];
        file.read_exact(&mut header).ok()?;
        let is_last = header[0] & 0x80 != 0;
        let block_type = header[0] & 0x7f;
        let length = u32::from_be_bytes([0, header[1], header[2], header[3]]);

        if block_type == BLOCK_VORBIS_COMMENT {
            let mut payload = vec![0u8; length as usize];
            file.read_exact(&mut payload).ok()?;
            return parse_vorbis_comments(&payload);
        }

        if is_last {
            return None;
        }
        file.seek(SeekFrom::Current(i64::from(length))).ok()?;
    }
}

/// Vorbis comment payload: LE u32 vendor length + vendor string, LE u32
/// comment count, then per comment a LE u32 length and `KEY=VALUE` UTF-8
/// bytes. Keys match case-insensitively and the first value wins.
fn parse_vorbis_comments(data: &[u8]) -> Option<TagInfo> {
    let mut cursor = 0usize;

    let vendor_len = read_le_u32(data, &mut cursor)? as usize;
    cursor = cursor.checked_add(vendor_len)?;
    if cursor > data.len() {
        return None;
    }

    let count = read_le_u32(data, &mut cursor)?;

    let mut info = TagInfo::default();
    let mut date: Option<String> = None;
    let mut year_fallback: Option<String> = None;

    for _ in 0..count {
        let len = read_le_u32(data, &mut cursor)? as usize;
        let end = cursor.checked_add(len)?;
        let raw = data.get(cursor..end)?;
        cursor = end;

        let text = std::str::from_utf8(raw).ok()?;
        let (key, value) = text.split_once('=')?;
        let value = value.to_string();

        match key.to_ascii_uppercase().as_str() {
            "ALBUM" => info.album.get_or_insert(value),
            "ALBUMARTIST" => info.album_artist.get_or_insert(value),
            "ARTIST" => info.artist.get_or_insert(value),
            "TITLE" => info.title.get_or_insert(value),
            "DATE" => date.get_or_insert(value),
            "YEAR" => year_fallback.get_or_insert(value),
            _ => continue,
        };
    }

    info.year = date.or(year_fallback);
    Some(info)
}

fn read_le_u32(data: &[u8], cursor: &mut usize) -> Option<u32> {
    let end = cursor.checked_add(4)?;
    let bytes = data.get(*cursor..end)?;
    *cursor = end;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

const ID3V1_LEN: u64 = 128;

/// ID3v1 trailer: the last 128 bytes, `TAG` marker then fixed-width Latin-1
/// fields. A record without an album is useless to the catalog and reads as
/// no tags at all.
fn read_id3v1(path: &Path) -> Option<TagInfo> {
    let mut file = File::open(path).ok()?;
    let size = file.metadata().ok()?.len();
    if size < ID3V1_LEN {
        return None;
    }

    file.seek(SeekFrom::End(-(ID3V1_LEN as i64))).ok()?;
    let mut trailer = [0u8; ID3V1_LEN as usize];
    file.read_exact(&mut trailer).ok()?;

    if &trailer[0..3] != b"TAG" {
        return None;
    }

    let title = latin1_field(&trailer[3..33]);
    let artist = latin1_field(&trailer[33..63]);
    let album = latin1_field(&trailer[63..93]);
    let year = latin1_field(&trailer[93..97]);

    if album.is_empty() {
        return None;
    }

    Some(TagInfo {
        album: Some(album),
        album_artist: None,
        artist: non_empty(artist),
        year: non_empty(year),
        title: non_empty(title),
    })
}

/// Decode a fixed-width Latin-1 field, dropping the NUL padding tail and
/// surrounding whitespace.
fn latin1_field(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let decoded: String = bytes[..end].iter().map(|&b| b as char).collect();
    decoded.trim().to_string()
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
