//! Text conversion for names stored inside containers.
//!
//! ZIP entry names are UTF-8 when the entry says so and a legacy 8-bit
//! encoding otherwise, decoded here as Windows-1252. GZIP names and
//! comments are ISO 8859-1, where every byte is the code point of the
//! same value.

use encoding_rs::WINDOWS_1252;

use crate::{Error, Result};

/// Decode bytes stored in the legacy 8-bit encoding.
///
/// Every byte maps to a character, so this never fails.
pub fn decode_legacy(bytes: &[u8]) -> String {
    let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
    text.into_owned()
}

/// Encode text into the legacy 8-bit encoding.
///
/// Fails with [`Error::Unencodable`] when a character has no 8-bit form.
pub fn encode_legacy(text: &str) -> Result<Vec<u8>> {
    let (bytes, _, had_errors) = WINDOWS_1252.encode(text);
    if had_errors {
        return Err(Error::Unencodable(text.to_string()));
    }
    Ok(bytes.into_owned())
}

/// Decode ISO 8859-1 text.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&byte| char::from(byte)).collect()
}

/// Encode text as ISO 8859-1.
///
/// Fails with [`Error::Unencodable`] for characters above U+00FF.
pub fn encode_latin1(text: &str) -> Result<Vec<u8>> {
    text.chars()
        .map(|c| u8::try_from(c).map_err(|_| Error::Unencodable(text.to_string())))
        .collect()
}

/// Decode a stored name, picking UTF-8 or the legacy encoding.
pub fn decode_name(bytes: &[u8], is_utf8: bool) -> Result<String> {
    if is_utf8 {
        Ok(std::str::from_utf8(bytes)?.to_string())
    } else {
        Ok(decode_legacy(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_roundtrip() {
        let encoded = encode_legacy("caf\u{e9}.txt").unwrap();
        assert_eq!(encoded, b"caf\xe9.txt");
        assert_eq!(decode_legacy(&encoded), "caf\u{e9}.txt");
    }

    #[test]
    fn test_unencodable() {
        assert!(matches!(
            encode_legacy("\u{65e5}\u{672c}"),
            Err(Error::Unencodable(_))
        ));
    }

    #[test]
    fn test_decode_name_switches_on_flag() {
        let utf8 = "\u{65e5}.txt".as_bytes();
        assert_eq!(decode_name(utf8, true).unwrap(), "\u{65e5}.txt");
        assert!(decode_name(b"\xff", true).is_err());
        assert_eq!(decode_name(b"\xe9", false).unwrap(), "\u{e9}");
    }

    #[test]
    fn test_latin1_keeps_c1_controls() {
        let bytes: Vec<u8> = (0x80..=0x9F).chain([0xE9, b'a']).collect();
        let decoded = decode_latin1(&bytes);
        assert_eq!(decoded.chars().next(), Some('\u{80}'));
        assert_eq!(encode_latin1(&decoded).unwrap(), bytes);

        // Windows-1252 would read 0x80 as the euro sign
        assert_eq!(decode_legacy(b"\x80"), "\u{20ac}");
        assert!(encode_latin1("\u{20ac}").is_err());
    }
}
