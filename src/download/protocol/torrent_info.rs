//! Info-hash extraction from torrent files and magnet links.

use sha1::{Digest, Sha1};

use crate::download::error::ReleaseDownloadError;

fn invalid(msg: &str) -> ReleaseDownloadError {
    ReleaseDownloadError::InvalidTorrent(msg.to_string())
}

/// Returns the index just past the bencoded value starting at `pos`.
fn skip_value(data: &[u8], pos: usize, depth: usize) -> Result<usize, ReleaseDownloadError> {
    if depth > 64 {
        return Err(invalid("nesting too deep"));
    }
    match data.get(pos) {
        Some(b'i') => {
            let end = data[pos..]
                .iter()
                .position(|&b| b == b'e')
                .ok_or_else(|| invalid("unterminated integer"))?;
            Ok(pos + end + 1)
        }
        Some(b'l') | Some(b'd') => {
            let mut cursor = pos + 1;
            loop {
                match data.get(cursor) {
                    Some(b'e') => return Ok(cursor + 1),
                    Some(_) => cursor = skip_value(data, cursor, depth + 1)?,
                    None => return Err(invalid("unterminated list or dictionary")),
                }
            }
        }
        Some(b'0'..=b'9') => {
            let (start, len) = read_string_header(data, pos)?;
            let end = start
                .checked_add(len)
                .filter(|&end| end <= data.len())
                .ok_or_else(|| invalid("string runs past end of data"))?;
            Ok(end)
        }
        _ => Err(invalid("unexpected token")),
    }
}

/// Parses `<len>:` and returns (content start, length).
fn read_string_header(data: &[u8], pos: usize) -> Result<(usize, usize), ReleaseDownloadError> {
    let colon = data[pos..]
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| invalid("string without length separator"))?;
    let len = std::str::from_utf8(&data[pos..pos + colon])
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| invalid("bad string length"))?;
    Ok((pos + colon + 1, len))
}

/// SHA-1 of the raw bencoded `info` dictionary, upper-case hex.
pub fn info_hash_from_torrent(data: &[u8]) -> Result<String, ReleaseDownloadError> {
    if data.first() != Some(&b'd') {
        return Err(invalid("torrent is not a dictionary"));
    }

    let mut cursor = 1;
    while let Some(&b) = data.get(cursor) {
        if b == b'e' {
            break;
        }
        let (key_start, key_len) = read_string_header(data, cursor)?;
        let value_start = key_start + key_len;
        if value_start > data.len() {
            return Err(invalid("key runs past end of data"));
        }
        let value_end = skip_value(data, value_start, 0)?;

        if &data[key_start..value_start] == b"info" {
            let digest = Sha1::digest(&data[value_start..value_end]);
            return Ok(hex::encode_upper(digest));
        }
        cursor = value_end;
    }

    Err(invalid("torrent has no info dictionary"))
}

fn decode_base32(input: &str) -> Option<Vec<u8>> {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
    let mut buffer: u64 = 0;
    let mut bits = 0;
    let mut out = Vec::with_capacity(input.len() * 5 / 8);

    for c in input.trim_end_matches('=').bytes() {
        let value = ALPHABET
            .iter()
            .position(|&a| a == c.to_ascii_uppercase())? as u64;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
            buffer &= (1 << bits) - 1;
        }
    }
    Some(out)
}

/// Upper-case hex info-hash from a magnet link's `xt=urn:btih:` parameter.
pub fn info_hash_from_magnet(magnet: &str) -> Option<String> {
    let query = magnet.strip_prefix("magnet:?")?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .filter(|(key, _)| *key == "xt")
        .filter_map(|(_, value)| {
            let decoded = urlencoding::decode(value).ok()?;
            let hash = decoded.strip_prefix("urn:btih:")?.to_string();
            match hash.len() {
                40 if hash.chars().all(|c| c.is_ascii_hexdigit()) => Some(hash.to_uppercase()),
                32 => decode_base32(&hash).map(hex::encode_upper),
                _ => None,
            }
        })
        .next()
}
