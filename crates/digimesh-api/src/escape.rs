//! Byte stuffing for API mode 2.
//!
//! Any reserved byte after the start delimiter is replaced by `0x7D` followed
//! by the byte XOR `0x20`.

use crate::constants::*;

/// Whether a byte must be escaped.
pub fn is_reserved(byte: u8) -> bool {
    RESERVED_BYTES.contains(&byte)
}

/// Escape a complete frame. The first byte (start delimiter) is copied as is.
pub fn escape(frame: &[u8]) -> Vec<u8> {
    let Some((&first, rest)) = frame.split_first() else {
        return Vec::new();
    };

    let mut escaped = Vec::with_capacity(frame.len() + 4);
    escaped.push(first);
    for &byte in rest {
        if is_reserved(byte) {
            escaped.push(ESCAPE);
            escaped.push(byte ^ ESCAPE_XOR);
        } else {
            escaped.push(byte);
        }
    }
    escaped
}

/// Remove escape sequences.
///
/// A trailing `0x7D` with no byte after it is dropped.
pub fn unescape(frame: &[u8]) -> Vec<u8> {
    let mut unescaped = Vec::with_capacity(frame.len());
    let mut bytes = frame.iter();
    while let Some(&byte) = bytes.next() {
        if byte == ESCAPE {
            if let Some(&next) = bytes.next() {
                unescaped.push(next ^ ESCAPE_XOR);
            }
        } else {
            unescaped.push(byte);
        }
    }
    unescaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_reserved_bytes() {
        let frame = [0x7E, 0x00, 0x02, 0x23, 0x11];
        assert_eq!(escape(&frame), vec![0x7E, 0x00, 0x02, 0x23, 0x7D, 0x31]);

        let frame = [0x7E, 0x7E, 0x7D, 0x13];
        assert_eq!(
            escape(&frame),
            vec![0x7E, 0x7D, 0x5E, 0x7D, 0x5D, 0x7D, 0x33]
        );
    }

    #[test]
    fn test_delimiter_never_escaped() {
        let escaped = escape(&[0x7E]);
        assert_eq!(escaped, vec![0x7E]);
        assert!(escape(&[]).is_empty());
    }

    #[test]
    fn test_unescape_inverts_escape() {
        let frames: [&[u8]; 3] = [
            &[0x7E, 0x00, 0x04, 0x08, 0x52, 0x49, 0x44, 0x62],
            &[0x7E, 0x00, 0x03, 0x7E, 0x7D, 0x11, 0x13],
            &[0x7E, 0x00, 0x01, 0x20, 0x5D, 0x5E],
        ];
        for frame in frames {
            assert_eq!(unescape(&escape(frame)), frame.to_vec());
        }
    }

    #[test]
    fn test_unescape_trailing_escape_dropped() {
        assert_eq!(unescape(&[0x7E, 0x00, 0x7D]), vec![0x7E, 0x00]);
        assert_eq!(unescape(&[0x7D]), Vec::<u8>::new());
    }

    #[test]
    fn test_unescape_plain_bytes_untouched() {
        let data = [0x7E, 0x00, 0x04, 0x01, 0x02];
        assert_eq!(unescape(&data), data.to_vec());
    }
}
