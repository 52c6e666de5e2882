//! Display-safe rendering of character attribute payloads
//!
//! The rules follow `ncdump`'s treatment of text attributes so that the JSON
//! output matches what users already see from the reference dumping tool.

use crate::types::FormatMode;

/// Turn a raw character payload into a display-safe string.
///
/// Trailing NUL bytes are dropped, then control characters are replaced by
/// their escaped forms. In classic-family files an embedded newline becomes
/// `\n","` so that consumers can split a multi-line attribute into a list of
/// strings; netCDF-4 files get a plain `\n`.
pub fn escape(bytes: &[u8], mode: FormatMode) -> String {
    let end = bytes
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |last| last + 1);

    let mut out: Vec<u8> = Vec::with_capacity(end + end / 4);
    for &b in &bytes[..end] {
        match b {
            0x08 => out.extend_from_slice(b"\\b"),
            0x0c => out.extend_from_slice(b"\\f"),
            b'\n' => match mode {
                FormatMode::Classic => out.extend_from_slice(b"\\n\",\""),
                FormatMode::Modern => out.extend_from_slice(b"\\n"),
            },
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x0b => out.extend_from_slice(b"\\v"),
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\'' => out.extend_from_slice(b"\\'"),
            b'"' => out.extend_from_slice(b"\\\""),
            c if c.is_ascii_control() => {
                out.extend_from_slice(format!("\\{:03o}", c).as_bytes());
            }
            c => out.push(c),
        }
    }

    // Bytes at or above 0x80 pass through untouched, so valid UTF-8 input
    // stays valid; anything else is replaced rather than rejected.
    match String::from_utf8(out) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_nuls_trimmed() {
        assert_eq!(escape(b"kg m-3\0\0\0", FormatMode::Classic), "kg m-3");
        assert_eq!(escape(b"\0\0\0\0", FormatMode::Classic), "");
        assert_eq!(escape(b"", FormatMode::Modern), "");
    }

    #[test]
    fn test_inner_nul_is_octal() {
        assert_eq!(escape(b"a\0b\0", FormatMode::Modern), "a\\000b");
    }

    #[test]
    fn test_mapped_controls() {
        let input = b"\x08\x0c\r\t\x0b\\'\"";
        assert_eq!(
            escape(input, FormatMode::Modern),
            "\\b\\f\\r\\t\\v\\\\\\'\\\""
        );
    }

    #[test]
    fn test_newline_depends_on_format() {
        assert_eq!(escape(b"one\ntwo", FormatMode::Classic), "one\\n\",\"two");
        assert_eq!(escape(b"one\ntwo", FormatMode::Modern), "one\\ntwo");
    }

    #[test]
    fn test_unmapped_controls_round_trip_through_octal() {
        let mapped = [0x08u8, 0x09, 0x0a, 0x0b, 0x0c, 0x0d];
        for byte in (0u8..0x20).chain(std::iter::once(0x7f)) {
            if mapped.contains(&byte) {
                continue;
            }
            // trailing NULs are trimmed, so anchor with a printable byte
            let escaped = escape(&[byte, b'x'], FormatMode::Classic);
            assert_eq!(escaped.len(), 5, "escape of {:#x} was {:?}", byte, escaped);
            assert!(escaped.starts_with('\\'));
            let code = u8::from_str_radix(&escaped[1..4], 8).unwrap();
            assert_eq!(code, byte);
        }
    }

    #[test]
    fn test_printable_and_utf8_pass_through() {
        assert_eq!(escape("µg/m³".as_bytes(), FormatMode::Classic), "µg/m³");
        assert_eq!(escape(b"Hello, world!", FormatMode::Classic), "Hello, world!");
    }
}
