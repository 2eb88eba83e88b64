//! LUX URI to identifier extraction
//!
//! Pure mapping from a raw LUX URI to the short identifier stored in the
//! claim value. No I/O, deterministic.

use crate::error::{Result, UploadError};

/// Derive the normalized identifier from a LUX URI.
///
/// A URI containing `"data/"` yields the suffix after the first occurrence.
/// A bare value not starting with `/` passes through unchanged. Anything
/// else is malformed.
pub fn extract_identifier(uri: &str) -> Result<String> {
    if let Some(pos) = uri.find("data/") {
        Ok(uri[pos + "data/".len()..].to_string())
    } else if !uri.starts_with('/') {
        Ok(uri.to_string())
    } else {
        Err(UploadError::InvalidFormat(uri.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_after_data_segment() {
        assert_eq!(
            extract_identifier("http://lux.example.org/data/object/abc-123").unwrap(),
            "object/abc-123"
        );
    }

    #[test]
    fn first_data_occurrence_wins() {
        assert_eq!(
            extract_identifier("https://host/data/set/data/item").unwrap(),
            "set/data/item"
        );
    }

    #[test]
    fn bare_identifier_passes_through() {
        assert_eq!(extract_identifier("abc-123").unwrap(), "abc-123");
    }

    #[test]
    fn leading_slash_is_malformed() {
        match extract_identifier("/bad/path") {
            Err(UploadError::InvalidFormat(uri)) => assert_eq!(uri, "/bad/path"),
            other => panic!("expected InvalidFormat, got {:?}", other),
        }
    }
}
