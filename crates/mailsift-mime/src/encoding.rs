//! MIME decoding utilities.
//!
//! Supports Base64, Quoted-Printable, the `Content-Transfer-Encoding` header,
//! and RFC 2047 encoded words in header values.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::charset::Charset;
use crate::error::{Error, Result};

/// Decodes Base64 data.
///
/// Line breaks and other ASCII whitespace inside the payload are ignored, as
/// they are inserted by every mail transport that wraps lines.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64, including truncated or
/// malformed padding.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Decodes a Quoted-Printable body (RFC 2045 §6.7).
///
/// Trailing whitespace on each line is transport padding and is dropped.
/// Hard line breaks keep their original `\r\n` or `\n` form.
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len());

    for raw_line in data.split_inclusive(|&b| b == b'\n') {
        let has_lf = raw_line.ends_with(b"\n");
        let has_crlf = raw_line.ends_with(b"\r\n");
        let line = trim_qp_padding(raw_line);

        // Soft line break
        if let Some(line) = line.strip_suffix(b"=") {
            unescape_qp(line, &mut result)?;
            continue;
        }

        unescape_qp(line, &mut result)?;
        if has_crlf {
            result.extend_from_slice(b"\r\n");
        } else if has_lf {
            result.push(b'\n');
        }
    }

    Ok(result)
}

fn trim_qp_padding(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| !matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        .map_or(0, |pos| pos + 1);
    &line[..end]
}

fn unescape_qp(line: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let mut bytes = line.iter().copied();
    while let Some(byte) = bytes.next() {
        if byte == b'=' {
            let (Some(hi), Some(lo)) = (bytes.next(), bytes.next()) else {
                return Err(Error::InvalidEncoding(
                    "Incomplete escape sequence".to_string(),
                ));
            };
            out.push(hex_pair(hi, lo)?);
        } else {
            out.push(byte);
        }
    }
    Ok(())
}

fn hex_pair(hi: u8, lo: u8) -> Result<u8> {
    let digit = |b: u8| {
        char::from(b)
            .to_digit(16)
            .ok_or_else(|| Error::InvalidEncoding(format!("Invalid hex digit: {:?}", char::from(b))))
    };
    let value = digit(hi)? * 16 + digit(lo)?;
    u8::try_from(value).map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))
}

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Binary (no encoding).
    Binary,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
}

impl TransferEncoding {
    /// Parses a `Content-Transfer-Encoding` value.
    ///
    /// Matching is case-insensitive. An empty value means no encoding was
    /// declared and is treated as 7bit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedTransferEncoding`] carrying the declared
    /// name for anything else.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "7bit" => Ok(Self::SevenBit),
            "8bit" => Ok(Self::EightBit),
            "binary" => Ok(Self::Binary),
            "base64" => Ok(Self::Base64),
            "quoted-printable" => Ok(Self::QuotedPrintable),
            _ => Err(Error::UnsupportedTransferEncoding(s.trim().to_string())),
        }
    }

    /// Returns true if the body is already raw and needs no decoding.
    #[must_use]
    pub const fn is_identity(self) -> bool {
        matches!(self, Self::SevenBit | Self::EightBit | Self::Binary)
    }

    /// Decodes a body according to this transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid for the encoding.
    pub fn decode(self, body: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Base64 => decode_base64(body),
            Self::QuotedPrintable => decode_quoted_printable(body),
            Self::SevenBit | Self::EightBit | Self::Binary => Ok(body.to_vec()),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Binary => write!(f, "binary"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
        }
    }
}

/// Decodes a body given the declared `Content-Transfer-Encoding`, if any.
///
/// # Errors
///
/// Returns [`Error::UnsupportedTransferEncoding`] for unknown encodings, or a
/// decoding error if the body is malformed.
pub fn decode_transfer(encoding: Option<&str>, body: &[u8]) -> Result<Vec<u8>> {
    encoding
        .map_or(Ok(TransferEncoding::SevenBit), TransferEncoding::parse)?
        .decode(body)
}

/// Decodes a single RFC 2047 encoded word.
///
/// Format: `=?charset?encoding?encoded-text?=`. An RFC 2231 language suffix
/// on the charset (`utf-8*en`) is ignored.
///
/// # Errors
///
/// Returns an error if `word` is not an encoded word, names an unsupported
/// charset or encoding, or carries an undecodable payload.
pub fn decode_rfc2047(word: &str) -> Result<String> {
    let inner = word
        .strip_prefix("=?")
        .and_then(|w| w.strip_suffix("?="))
        .ok_or_else(|| Error::InvalidEncoding(format!("Not an encoded word: {word}")))?;

    let mut parts = inner.splitn(3, '?');
    let (Some(charset), Some(encoding), Some(encoded_text)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::InvalidEncoding(
            "Invalid RFC 2047 format".to_string(),
        ));
    };
    if encoded_text.contains('?') {
        return Err(Error::InvalidEncoding(
            "Invalid RFC 2047 format".to_string(),
        ));
    }

    let charset = charset.split_once('*').map_or(charset, |(name, _)| name);
    let charset = Charset::from_label(charset)?;

    let decoded = match encoding {
        "B" | "b" => decode_base64(encoded_text.as_bytes())?,
        "Q" | "q" => decode_q(encoded_text.as_bytes())?,
        _ => {
            return Err(Error::InvalidEncoding(format!(
                "Unknown encoding: {encoding}"
            )));
        }
    };

    charset.decode(&decoded)
}

/// RFC 2047 "Q" encoding: Quoted-Printable with `_` standing for a space
/// and no soft line breaks.
fn decode_q(text: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(text.len());
    let mut bytes = text.iter().copied();
    while let Some(byte) = bytes.next() {
        match byte {
            b'_' => result.push(b' '),
            b'=' => {
                let (Some(hi), Some(lo)) = (bytes.next(), bytes.next()) else {
                    return Err(Error::InvalidEncoding(
                        "Incomplete escape sequence".to_string(),
                    ));
                };
                result.push(hex_pair(hi, lo)?);
            }
            other => result.push(other),
        }
    }
    Ok(result)
}

/// Decodes every encoded word in a header value.
///
/// The value is split on single spaces. Each token that decodes as an
/// encoded word is replaced by its text; any other token is kept verbatim,
/// with one space restored in front of it unless it is the first token.
/// Adjacent encoded words are therefore joined without the space between
/// them, and values containing no encoded words come back unchanged.
///
/// This never fails: a token that cannot be decoded is passed through.
#[must_use]
pub fn decode_sentence(value: &str) -> String {
    let mut result = String::with_capacity(value.len());

    for (index, token) in value.split(' ').enumerate() {
        match decode_rfc2047(token) {
            Ok(decoded) => result.push_str(&decoded),
            Err(e) => {
                if token.starts_with("=?") {
                    tracing::trace!(token, error = %e, "encoded word left undecoded");
                }
                if index > 0 {
                    result.push(' ');
                }
                result.push_str(token);
            }
        }
    }

    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_base64_decode() {
        let decoded = decode_base64(b"SGVsbG8sIFdvcmxkIQ==").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_base64_decode_ignores_line_breaks() {
        let decoded = decode_base64(b"SGVsbG8s\r\nIFdvcmxk\nIQ==\n").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_base64_bad_padding_fails() {
        assert!(matches!(
            decode_base64(b"SGVsbG8sIFdvcmxkIQ="),
            Err(Error::Base64Decode(_))
        ));
    }

    #[test]
    fn test_quoted_printable_decode() {
        let decoded = decode_quoted_printable(b"Hello, World!").unwrap();
        assert_eq!(decoded, b"Hello, World!");

        let decoded = decode_quoted_printable(b"H=C3=A9llo").unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "Héllo");
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        let decoded = decode_quoted_printable(b"Hello=\r\nWorld").unwrap();
        assert_eq!(decoded, b"HelloWorld");

        let decoded = decode_quoted_printable(b"Hello=\nWorld\n").unwrap();
        assert_eq!(decoded, b"HelloWorld\n");
    }

    #[test]
    fn test_quoted_printable_hard_breaks_and_padding() {
        let decoded = decode_quoted_printable(b"a  \r\nb=09\nc").unwrap();
        assert_eq!(decoded, b"a\r\nb\t\nc");
    }

    #[test]
    fn test_quoted_printable_invalid_escape() {
        assert!(decode_quoted_printable(b"=ZZ").is_err());
        assert!(decode_quoted_printable(b"abc=4").is_err());
    }

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit").unwrap(), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse("").unwrap(), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse("BASE64").unwrap(), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("Quoted-Printable").unwrap(),
            TransferEncoding::QuotedPrintable
        );
        assert!(TransferEncoding::parse("binary").unwrap().is_identity());
    }

    #[test]
    fn test_transfer_encoding_unsupported() {
        let err = TransferEncoding::parse("x-uuencode").unwrap_err();
        assert!(matches!(err, Error::UnsupportedTransferEncoding(ref name) if name == "x-uuencode"));
    }

    #[test]
    fn test_decode_transfer_identity_without_header() {
        assert_eq!(decode_transfer(None, b"raw\n").unwrap(), b"raw\n");
        assert_eq!(decode_transfer(Some("base64"), b"WzEsIDIsIDNd").unwrap(), b"[1, 2, 3]");
    }

    #[test]
    fn test_rfc2047_decode() {
        let decoded = decode_rfc2047("=?utf-8?B?SMOpbGxv?=").unwrap();
        assert_eq!(decoded, "Héllo");

        assert!(decode_rfc2047("Hello").is_err());
    }

    #[test]
    fn test_rfc2047_quoted_printable() {
        let decoded = decode_rfc2047("=?utf-8?Q?H=C3=A9llo?=").unwrap();
        assert_eq!(decoded, "Héllo");

        let decoded = decode_rfc2047("=?ISO-8859-1?Q?Keld_J=F8rn_Simonsen?=").unwrap();
        assert_eq!(decoded, "Keld Jørn Simonsen");
    }

    #[test]
    fn test_rfc2047_unsupported_charset() {
        assert!(matches!(
            decode_rfc2047("=?windows-1251?Q?abc?="),
            Err(Error::UnsupportedCharset(_))
        ));
    }

    #[test]
    fn test_rfc2047_language_suffix() {
        let decoded = decode_rfc2047("=?US-ASCII*EN?Q?Keith_Moore?=").unwrap();
        assert_eq!(decoded, "Keith Moore");
    }

    #[test]
    fn test_decode_sentence_mixed_tokens() {
        assert_eq!(
            decode_sentence("Re: =?UTF-8?Q?Peter_Pahol=C3=ADk?= again"),
            "Re:Peter Paholík again"
        );
        assert_eq!(
            decode_sentence("=?UTF-8?Q?Peter_Paholi=CC=81k_1?= =?UTF-8?Q?_4_2017_2017=2D04=2D07=2Ejson?="),
            "Peter Paholi\u{301}k 1 4 2017 2017-04-07.json"
        );
    }

    #[test]
    fn test_decode_sentence_keeps_broken_words() {
        assert_eq!(decode_sentence("=?utf-8?X?abc?= tail"), "=?utf-8?X?abc?= tail");
        assert_eq!(decode_sentence("<part1@example.com>"), "<part1@example.com>");
    }

    proptest! {
        #[test]
        fn decode_sentence_is_identity_without_encoded_words(s in "[a-zA-Z0-9 <>@.,:;\"()\t-]*") {
            prop_assert_eq!(decode_sentence(&s), s);
        }

        #[test]
        fn decode_rfc2047_never_panics(s in r"=\?.*\?.*\?.*\?=") {
            let _ = decode_rfc2047(&s);
        }
    }
}
