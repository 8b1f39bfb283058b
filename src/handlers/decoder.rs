use base64::{engine::general_purpose, Engine};
use regex::Regex;
use std::sync::OnceLock;

use crate::models::ImagePayload;

/// Ceiling on the decoded image size.
pub const MAX_DECODED_IMAGE_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    InvalidFormat,
    InvalidBase64,
    TooLarge { estimated_bytes: usize },
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::InvalidFormat => write!(f, "invalid base64 image format"),
            DecodeError::InvalidBase64 => write!(f, "image payload is not valid base64"),
            DecodeError::TooLarge { estimated_bytes } => {
                write!(f, "image too large: ~{} bytes", estimated_bytes)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

fn data_uri_pattern() -> &'static Regex {
    static DATA_URI: OnceLock<Regex> = OnceLock::new();
    DATA_URI.get_or_init(|| {
        Regex::new(r"^data:image/([A-Za-z0-9_]+);base64,(.+)$").expect("valid data uri pattern")
    })
}

/// Decoded size estimate from the encoded length, without decoding.
pub fn estimated_decoded_len(encoded_len: usize) -> usize {
    (encoded_len * 3).div_ceil(4)
}

/// Splits a `data:image/<subtype>;base64,<payload>` string into an [`ImagePayload`].
pub fn decode(data_uri: &str) -> Result<ImagePayload, DecodeError> {
    let captures = data_uri_pattern()
        .captures(data_uri)
        .ok_or(DecodeError::InvalidFormat)?;

    let subtype = &captures[1];
    let data = &captures[2];

    let estimated_bytes = estimated_decoded_len(data.len());
    if estimated_bytes > MAX_DECODED_IMAGE_BYTES {
        return Err(DecodeError::TooLarge { estimated_bytes });
    }

    let decoded = general_purpose::STANDARD
        .decode(data)
        .map_err(|_| DecodeError::InvalidBase64)?;
    log::debug!("🖼️ Decoded image/{}: {} bytes", subtype, decoded.len());

    Ok(ImagePayload {
        mime_type: format!("image/{}", subtype),
        data: data.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_keeps_subtype() {
        for subtype in ["jpeg", "png", "webp", "heic"] {
            let uri = format!("data:image/{};base64,/9j/4AAQSkZJRg==", subtype);
            let payload = decode(&uri).unwrap();
            assert_eq!(payload.mime_type, format!("image/{}", subtype));
            assert_eq!(payload.data, "/9j/4AAQSkZJRg==");
        }
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let cases = [
            "",
            "data:image/jpeg,/9j/4AAQ",
            "data:image/;base64,/9j/4AAQ",
            "data:image/svg+xml;base64,PHN2Zz4=",
            "data:text/plain;base64,aGVsbG8=",
            "data:image/png;base64,",
            " data:image/png;base64,iVBORw0KGgo=",
            "data:image/jpég;base64,/9j/4AAQ",
            "data:image/ｐｎｇ;base64,iVBORw0KGgo=",
        ];
        for case in cases {
            assert_eq!(decode(case), Err(DecodeError::InvalidFormat), "{:?}", case);
        }
    }

    #[test]
    fn test_decode_rejects_invalid_base64() {
        assert_eq!(
            decode("data:image/png;base64,not*base64!"),
            Err(DecodeError::InvalidBase64)
        );
    }

    #[test]
    fn test_size_estimate_boundary() {
        assert_eq!(estimated_decoded_len(4), 3);
        assert_eq!(estimated_decoded_len(5), 4);

        // largest multiple of 4 whose estimate stays within 4 MiB
        let at_limit = "A".repeat(5_592_404);
        let uri = format!("data:image/jpeg;base64,{}", at_limit);
        assert!(decode(&uri).is_ok());

        let over = "A".repeat(5_592_408);
        let uri = format!("data:image/jpeg;base64,{}", over);
        assert!(matches!(decode(&uri), Err(DecodeError::TooLarge { .. })));
    }
}
