//! `data:` URLs (RFC 2397).
//!
//! `data:[<mediatype>][;base64],<payload>`. The media type is ignored; the
//! payload is base64-decoded when flagged, percent-decoded otherwise.

use super::TransportError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Decode the payload of a `data:` URL.
///
/// # Errors
///
/// Returns `TransportError::InvalidDataUrl` for a missing `data:` prefix or
/// comma, a bad percent escape, or invalid base64.
pub fn decode(url: &str) -> Result<Vec<u8>, TransportError> {
    let rest = url
        .get(..5)
        .filter(|prefix| prefix.eq_ignore_ascii_case("data:"))
        .map(|_| &url[5..])
        .ok_or_else(|| TransportError::InvalidDataUrl("missing data: prefix".to_string()))?;

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| TransportError::InvalidDataUrl("missing ','".to_string()))?;

    let is_base64 = header
        .rsplit(';')
        .next()
        .is_some_and(|p| p.eq_ignore_ascii_case("base64"));

    let bytes = percent_decode(payload)?;
    if !is_base64 {
        return Ok(bytes);
    }

    let cleaned: Vec<u8> = bytes
        .into_iter()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(cleaned)
        .map_err(|e| TransportError::InvalidDataUrl(e.to_string()))
}

fn percent_decode(input: &str) -> Result<Vec<u8>, TransportError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }

        let escape = bytes
            .get(i + 1..i + 3)
            .filter(|hex| hex.iter().all(u8::is_ascii_hexdigit))
            .and_then(|hex| std::str::from_utf8(hex).ok())
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            .ok_or_else(|| {
                TransportError::InvalidDataUrl(format!("bad percent escape at offset {i}"))
            })?;
        out.push(escape);
        i += 3;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain() {
        assert_eq!(decode("data:,hello").unwrap(), b"hello");
        assert_eq!(decode("data:,").unwrap(), b"");
    }

    #[test]
    fn test_decode_percent_encoded() {
        assert_eq!(
            decode("data:text/plain;charset=utf-8,line%201%0Aline%202").unwrap(),
            b"line 1\nline 2"
        );
    }

    #[test]
    fn test_decode_base64() {
        assert_eq!(decode("data:;base64,aGVsbG8=").unwrap(), b"hello");
        assert!(decode("DATA:application/octet-stream;base64,Zm9v%3DYmFy").is_err());
        assert_eq!(decode("data:text/plain;base64,Zm9vPWJhcg==").unwrap(), b"foo=bar");
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            decode("http://example.com"),
            Err(TransportError::InvalidDataUrl(_))
        ));
        assert!(matches!(
            decode("data:text/plain"),
            Err(TransportError::InvalidDataUrl(_))
        ));
        assert!(matches!(
            decode("data:,%zz"),
            Err(TransportError::InvalidDataUrl(_))
        ));
        assert!(matches!(
            decode("data:;base64,!!!"),
            Err(TransportError::InvalidDataUrl(_))
        ));
    }

    #[test]
    fn test_decode_rejects_signed_escape() {
        assert!(matches!(
            decode("data:,%+f"),
            Err(TransportError::InvalidDataUrl(_))
        ));
        assert!(decode("data:,%-1").is_err());
        assert_eq!(decode("data:,%2B%2b").unwrap(), b"++");
    }
}
