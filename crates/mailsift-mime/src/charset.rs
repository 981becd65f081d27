//! Charset transcoding into Unicode text.
//!
//! The table is deliberately small: UTF-8 (and its US-ASCII subset) plus the
//! ISO-8859 family, parts 1-10 and 13-16. Labels outside the table are
//! rejected instead of being decoded with a substitute.

use std::fmt;

use crate::error::{Error, Result};

/// A charset this crate can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Charset {
    /// UTF-8 (passthrough after validation).
    #[default]
    Utf8,
    /// US-ASCII, decoded through the UTF-8 path.
    UsAscii,
    /// ISO-8859-1 (Latin-1).
    Iso8859_1,
    /// ISO-8859-2 (Latin-2).
    Iso8859_2,
    /// ISO-8859-3 (Latin-3).
    Iso8859_3,
    /// ISO-8859-4 (Latin-4).
    Iso8859_4,
    /// ISO-8859-5 (Cyrillic).
    Iso8859_5,
    /// ISO-8859-6 (Arabic).
    Iso8859_6,
    /// ISO-8859-7 (Greek).
    Iso8859_7,
    /// ISO-8859-8 (Hebrew).
    Iso8859_8,
    /// ISO-8859-9 (Latin-5, Turkish).
    Iso8859_9,
    /// ISO-8859-10 (Latin-6).
    Iso8859_10,
    /// ISO-8859-13 (Latin-7).
    Iso8859_13,
    /// ISO-8859-14 (Latin-8).
    Iso8859_14,
    /// ISO-8859-15 (Latin-9).
    Iso8859_15,
    /// ISO-8859-16 (Latin-10).
    Iso8859_16,
}

impl Charset {
    /// Looks up a charset by its MIME label.
    ///
    /// The label is trimmed and lower-cased before lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedCharset`] carrying the label when it is not
    /// in the table.
    pub fn from_label(label: &str) -> Result<Self> {
        let charset = match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" => Self::Utf8,
            "us-ascii" => Self::UsAscii,
            "iso-8859-1" => Self::Iso8859_1,
            "iso-8859-2" => Self::Iso8859_2,
            "iso-8859-3" => Self::Iso8859_3,
            "iso-8859-4" => Self::Iso8859_4,
            "iso-8859-5" => Self::Iso8859_5,
            "iso-8859-6" => Self::Iso8859_6,
            "iso-8859-7" => Self::Iso8859_7,
            "iso-8859-8" => Self::Iso8859_8,
            "iso-8859-9" => Self::Iso8859_9,
            "iso-8859-10" => Self::Iso8859_10,
            "iso-8859-13" => Self::Iso8859_13,
            "iso-8859-14" => Self::Iso8859_14,
            "iso-8859-15" => Self::Iso8859_15,
            "iso-8859-16" => Self::Iso8859_16,
            _ => return Err(Error::UnsupportedCharset(label.trim().to_string())),
        };
        Ok(charset)
    }

    /// Returns the canonical lower-case label.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::UsAscii => "us-ascii",
            Self::Iso8859_1 => "iso-8859-1",
            Self::Iso8859_2 => "iso-8859-2",
            Self::Iso8859_3 => "iso-8859-3",
            Self::Iso8859_4 => "iso-8859-4",
            Self::Iso8859_5 => "iso-8859-5",
            Self::Iso8859_6 => "iso-8859-6",
            Self::Iso8859_7 => "iso-8859-7",
            Self::Iso8859_8 => "iso-8859-8",
            Self::Iso8859_9 => "iso-8859-9",
            Self::Iso8859_10 => "iso-8859-10",
            Self::Iso8859_13 => "iso-8859-13",
            Self::Iso8859_14 => "iso-8859-14",
            Self::Iso8859_15 => "iso-8859-15",
            Self::Iso8859_16 => "iso-8859-16",
        }
    }

    /// Decodes `bytes` into a `String`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not valid in this charset (invalid
    /// UTF-8, or a code point left undefined by the ISO-8859 part).
    pub fn decode(self, bytes: &[u8]) -> Result<String> {
        // Latin-1 and Latin-5 are handled without encoding_rs, whose labels
        // for them resolve to windows-1252 and windows-1254.
        let encoding = match self {
            Self::Utf8 | Self::UsAscii => return String::from_utf8(bytes.to_vec()).map_err(Into::into),
            Self::Iso8859_1 => return Ok(bytes.iter().copied().map(char::from).collect()),
            Self::Iso8859_9 => return Ok(bytes.iter().copied().map(latin5_char).collect()),
            Self::Iso8859_2 => encoding_rs::ISO_8859_2,
            Self::Iso8859_3 => encoding_rs::ISO_8859_3,
            Self::Iso8859_4 => encoding_rs::ISO_8859_4,
            Self::Iso8859_5 => encoding_rs::ISO_8859_5,
            Self::Iso8859_6 => encoding_rs::ISO_8859_6,
            Self::Iso8859_7 => encoding_rs::ISO_8859_7,
            Self::Iso8859_8 => encoding_rs::ISO_8859_8,
            Self::Iso8859_10 => encoding_rs::ISO_8859_10,
            Self::Iso8859_13 => encoding_rs::ISO_8859_13,
            Self::Iso8859_14 => encoding_rs::ISO_8859_14,
            Self::Iso8859_15 => encoding_rs::ISO_8859_15,
            Self::Iso8859_16 => encoding_rs::ISO_8859_16,
        };
        encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(std::borrow::Cow::into_owned)
            .ok_or_else(|| Error::InvalidEncoding(format!("invalid {self} byte sequence")))
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// ISO-8859-9 is ISO-8859-1 with six Turkish letters swapped in.
fn latin5_char(byte: u8) -> char {
    match byte {
        0xD0 => '\u{011E}',
        0xDD => '\u{0130}',
        0xDE => '\u{015E}',
        0xF0 => '\u{011F}',
        0xFD => '\u{0131}',
        0xFE => '\u{015F}',
        other => char::from(other),
    }
}

/// Decodes `bytes` labelled with the MIME charset `label`.
///
/// # Errors
///
/// Returns [`Error::UnsupportedCharset`] for labels outside the table, or a
/// decoding error if the bytes are invalid for the charset.
pub fn decode(label: &str, bytes: &[u8]) -> Result<String> {
    Charset::from_label(label)?.decode(bytes)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_label_lookup_is_case_insensitive() {
        assert_eq!(Charset::from_label("UTF-8").unwrap(), Charset::Utf8);
        assert_eq!(Charset::from_label(" ISO-8859-15 ").unwrap(), Charset::Iso8859_15);
        assert_eq!(Charset::from_label("us-ascii").unwrap(), Charset::UsAscii);
    }

    #[test]
    fn test_unknown_label_is_rejected() {
        let err = Charset::from_label("windows-1251").unwrap_err();
        assert!(matches!(err, Error::UnsupportedCharset(ref name) if name == "windows-1251"));

        // Parts 11 and 12 are not in the table.
        assert!(Charset::from_label("iso-8859-11").is_err());
        assert!(Charset::from_label("iso-8859-12").is_err());
    }

    #[test]
    fn test_utf8_passthrough() {
        assert_eq!(decode("utf-8", "Héllo".as_bytes()).unwrap(), "Héllo");
        assert!(matches!(
            decode("utf-8", &[0xC3, 0x28]),
            Err(Error::Utf8Decode(_))
        ));
    }

    #[test]
    fn test_latin1_is_not_windows_1252() {
        // 0x80 is a C1 control in ISO-8859-1 but the euro sign in windows-1252.
        assert_eq!(decode("iso-8859-1", &[0x80]).unwrap(), "\u{80}");
        assert_eq!(decode("iso-8859-1", b"Andr\xE9").unwrap(), "André");
    }

    #[test]
    fn test_latin5_turkish_letters() {
        assert_eq!(decode("iso-8859-9", &[0xDD, 0xFD, 0xE9]).unwrap(), "İıé");
    }

    #[test]
    fn test_iso_8859_family() {
        assert_eq!(decode("iso-8859-2", &[0xB1]).unwrap(), "ą");
        assert_eq!(decode("iso-8859-5", &[0xB0]).unwrap(), "А");
        assert_eq!(decode("iso-8859-7", &[0xE1]).unwrap(), "α");
        assert_eq!(decode("iso-8859-15", &[0xA4]).unwrap(), "€");
        assert_eq!(
            decode("iso-8859-8", &[0xED, 0xE5, 0xEC, 0xF9]).unwrap(),
            "םולש"
        );
    }

    #[test]
    fn test_undefined_code_point_is_rejected() {
        // 0xA1 is unassigned in ISO-8859-6 and 0xD2 in ISO-8859-7.
        assert!(matches!(decode("iso-8859-6", &[0xA1]), Err(Error::InvalidEncoding(_))));
        assert!(matches!(decode("iso-8859-7", &[0xD2]), Err(Error::InvalidEncoding(_))));
        assert_eq!(decode("iso-8859-13", b"plain").unwrap(), "plain");
    }

    #[test]
    fn test_display_uses_canonical_name() {
        assert_eq!(Charset::Iso8859_16.to_string(), "iso-8859-16");
        assert_eq!(Charset::default(), Charset::Utf8);
    }
}
