//! Byte-to-placeholder mapping used before BPE.
//!
//! Every raw byte (0-255) is assigned one visible Unicode character so that any
//! byte sequence can be looked up in a vocabulary made of printable strings.
//!
//! - Bytes 33-126 (`!` to `~`): map to themselves
//! - Bytes 161-172 (`¡` to `¬`): map to themselves
//! - Bytes 174-255 (`®` to `ÿ`): map to themselves
//! - Other bytes (0-32, 127-160, 173): map to U+0100 onwards, in byte order
//!
//! This is the GPT-2 `bytes_to_unicode` table that CLIP vocabularies are
//! written in. Space (0x20) becomes `Ġ` (U+0120).

use rustc_hash::FxHashMap;
use std::sync::LazyLock;

/// Byte values that map to the code point with the same value.
fn is_printable_byte(b: u8) -> bool {
    matches!(b, 33..=126 | 161..=172 | 174..=255)
}

static BYTE_TO_CHAR: LazyLock<[char; 256]> = LazyLock::new(|| {
    let mut mapping = ['\0'; 256];
    let mut next = 0x100u32;

    for b in 0u8..=255 {
        mapping[b as usize] = if is_printable_byte(b) {
            char::from(b)
        } else {
            // 68 non-printable bytes land in U+0100..=U+0143, all valid scalars.
            let ch = char::from_u32(next).unwrap_or(char::REPLACEMENT_CHARACTER);
            next += 1;
            ch
        };
    }

    mapping
});

static CHAR_TO_BYTE: LazyLock<FxHashMap<char, u8>> = LazyLock::new(|| {
    BYTE_TO_CHAR
        .iter()
        .enumerate()
        .map(|(byte, &ch)| (ch, byte as u8))
        .collect()
});

/// Placeholder character for `byte`.
#[inline]
pub fn byte_to_char(byte: u8) -> char {
    BYTE_TO_CHAR[byte as usize]
}

/// Raw byte behind a placeholder character, if `ch` is one.
#[inline]
pub fn char_to_byte(ch: char) -> Option<u8> {
    CHAR_TO_BYTE.get(&ch).copied()
}

/// Map each byte to its placeholder character.
#[inline]
pub fn byte_level_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| byte_to_char(b)).collect()
}

/// Map placeholder characters back to raw bytes.
///
/// Returns `None` if `text` contains a character outside the placeholder set.
pub fn byte_level_decode(text: &str) -> Option<Vec<u8>> {
    text.chars().map(char_to_byte).collect()
}

/// Like [`byte_level_decode`], but characters outside the placeholder set are
/// appended as their own UTF-8 encoding instead of failing.
pub fn byte_level_decode_into(text: &str, out: &mut Vec<u8>) {
    let mut buf = [0u8; 4];
    for ch in text.chars() {
        match char_to_byte(ch) {
            Some(b) => out.push(b),
            None => out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_level_mapping_is_bijective() {
        let mut seen = std::collections::HashSet::new();
        for b in 0u8..=255 {
            assert!(seen.insert(byte_to_char(b)), "Duplicate mapping for byte {}", b);
        }
        assert_eq!(seen.len(), 256);
    }

    #[test]
    fn test_byte_level_roundtrip() {
        for b in 0u8..=255 {
            let encoded = byte_level_encode(&[b]);
            assert_eq!(byte_level_decode(&encoded), Some(vec![b]), "byte {}", b);
        }
    }

    #[test]
    fn test_non_printable_block() {
        assert_eq!(byte_to_char(0), '\u{0100}');
        assert_eq!(byte_to_char(b' '), '\u{0120}');
        assert_eq!(byte_to_char(127), '\u{0121}');
        assert_eq!(byte_to_char(160), '\u{0142}');
        assert_eq!(byte_to_char(173), '\u{0143}');
    }

    #[test]
    fn test_printable_bytes_preserved() {
        for b in (33u8..=126).chain(161..=172).chain(174..=255) {
            assert_eq!(byte_to_char(b) as u32, b as u32);
        }
    }

    #[test]
    fn test_encode_with_space() {
        assert_eq!(byte_level_encode(b" hello"), "\u{0120}hello");
    }

    #[test]
    fn test_encode_multibyte() {
        // "é" is C3 A9 in UTF-8; both bytes are printable Latin-1.
        assert_eq!(byte_level_encode("é".as_bytes()), "\u{00C3}\u{00A9}");
    }

    #[test]
    fn test_decode_rejects_foreign_chars() {
        assert_eq!(byte_level_decode("a\u{4E16}"), None);
    }

    #[test]
    fn test_decode_into_passes_foreign_chars_through() {
        let mut out = Vec::new();
        byte_level_decode_into("\u{0120}\u{4E16}", &mut out);
        assert_eq!(String::from_utf8(out).unwrap(), " \u{4E16}");
    }
}
