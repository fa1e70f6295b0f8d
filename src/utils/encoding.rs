// Byte layouts used for hashing and for binary wire fields.

use crate::error::{BlockchainError, Result};
use data_encoding::BASE64URL;

pub fn base64url_encode(data: &[u8]) -> String {
    BASE64URL.encode(data)
}

pub fn base64url_decode(field: &str, data: &str) -> Result<Vec<u8>> {
    BASE64URL
        .decode(data.as_bytes())
        .map_err(|e| BlockchainError::Decode(format!("Invalid base64url in {field}: {e}")))
}

/// Appends `bytes` with a big-endian u32 length prefix so that adjacent
/// variable-length fields can never run into each other.
pub fn put_length_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend((bytes.len() as u32).to_be_bytes());
    buf.extend(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64url_uses_url_alphabet() {
        let encoded = base64url_encode(&[0xfb, 0xff, 0xfe]);
        assert_eq!(encoded, "-__-");
        assert_eq!(base64url_decode("data", &encoded).unwrap(), vec![0xfb, 0xff, 0xfe]);
    }

    #[test]
    fn test_base64url_rejects_standard_alphabet() {
        assert!(base64url_decode("data", "+//+").is_err());
    }

    #[test]
    fn test_length_prefix_separates_fields() {
        let mut a = Vec::new();
        put_length_prefixed(&mut a, b"ab");
        put_length_prefixed(&mut a, b"c");

        let mut b = Vec::new();
        put_length_prefixed(&mut b, b"a");
        put_length_prefixed(&mut b, b"bc");

        assert_ne!(a, b);
    }
}
