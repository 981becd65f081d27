//! MIME content type handling.

use std::collections::HashMap;
use std::fmt;

use crate::charset::Charset;
use crate::error::{Error, Result};

/// MIME content type with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "jpeg").
    pub sub_type: String,
    /// Parameters (e.g., charset=utf-8, boundary=xxx). Names are lower-cased.
    pub parameters: HashMap<String, String>,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: HashMap::new(),
        }
    }

    /// Creates a text/plain content type, the RFC 2045 default.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain")
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Returns a parameter by (case-insensitive) name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameter("charset")
    }

    /// Resolves the charset parameter, defaulting to UTF-8 when absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedCharset`] if the declared charset is not
    /// in the decoding table.
    pub fn resolve_charset(&self) -> Result<Charset> {
        self.charset()
            .map_or(Ok(Charset::default()), Charset::from_label)
    }

    /// Returns the boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameter("boundary")
    }

    /// Returns the `name` parameter if present.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.parameter("name")
    }

    /// Returns the media type without parameters, e.g. `text/plain`.
    #[must_use]
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Checks the media type, ignoring case.
    #[must_use]
    pub fn is(&self, main_type: &str, sub_type: &str) -> bool {
        self.main_type.eq_ignore_ascii_case(main_type) && self.sub_type.eq_ignore_ascii_case(sub_type)
    }

    /// Parses a content type string.
    ///
    /// Format: `type/subtype; param1=value1; param2="value 2"`
    ///
    /// # Errors
    ///
    /// Returns an error if the format is invalid.
    pub fn parse(s: &str) -> Result<Self> {
        let (type_str, parameters) = parse_header_value(s)?;

        let Some((main_type, sub_type)) = type_str.split_once('/') else {
            return Err(Error::InvalidContentType(format!("Missing subtype: {s}")));
        };
        let main_type = main_type.trim().to_lowercase();
        let sub_type = sub_type.trim().to_lowercase();
        if main_type.is_empty() || sub_type.is_empty() || sub_type.contains('/') {
            return Err(Error::InvalidContentType(format!("Invalid media type: {s}")));
        }

        Ok(Self {
            main_type,
            sub_type,
            parameters,
        })
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let main = &self.main_type;
        let sub = &self.sub_type;
        write!(f, "{main}/{sub}")
    }
}

/// A `Content-Disposition` header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Disposition type, lower-cased (`inline`, `attachment`, ...).
    pub kind: String,
    /// Parameters. Names are lower-cased.
    pub parameters: HashMap<String, String>,
}

impl ContentDisposition {
    /// Parses a content disposition string.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter list is malformed.
    pub fn parse(s: &str) -> Result<Self> {
        let (kind, parameters) = parse_header_value(s)?;
        Ok(Self {
            kind: kind.to_lowercase(),
            parameters,
        })
    }

    /// Returns the `filename` parameter if present.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.parameters.get("filename").map(String::as_str)
    }

    /// Checks if the disposition is `attachment`.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.kind == "attachment"
    }
}

/// Splits `value; a=b; c="d"` into its leading token and parameter map.
///
/// RFC 2231 continuations (`name*0`, `name*1*`) and extended values
/// (`name*=utf-8''%E2%82%AC`) are reassembled under the plain name.
fn parse_header_value(s: &str) -> Result<(String, HashMap<String, String>)> {
    let mut segments = split_unquoted(s, ';')?.into_iter();
    let head = segments.next().unwrap_or_default().trim().to_string();
    if head.is_empty() {
        return Err(Error::InvalidContentType(format!("Empty value: {s:?}")));
    }

    let mut parameters = HashMap::new();
    let mut continuations: HashMap<String, Vec<Section>> = HashMap::new();

    for segment in segments {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let Some((key, value)) = segment.split_once('=') else {
            return Err(Error::InvalidContentType(format!(
                "Parameter without value: {segment}"
            )));
        };
        let key = key.trim().to_ascii_lowercase();
        let value = unquote(value.trim());

        match key.split_once('*') {
            None => {
                parameters.insert(key, value);
            }
            Some((name, rest)) => {
                let extended = rest.ends_with('*') || rest.is_empty();
                let index = rest.trim_end_matches('*');
                let index = if index.is_empty() {
                    0
                } else {
                    index.parse::<usize>().map_err(|_| {
                        Error::InvalidContentType(format!("Invalid parameter section: {key}"))
                    })?
                };
                continuations.entry(name.to_string()).or_default().push(Section {
                    index,
                    extended,
                    value,
                });
            }
        }
    }

    for (name, sections) in continuations {
        if let Some(value) = join_sections(sections) {
            parameters.insert(name, value);
        } else {
            tracing::debug!(parameter = %name, "dropping undecodable RFC 2231 parameter");
        }
    }

    Ok((head, parameters))
}

struct Section {
    index: usize,
    extended: bool,
    value: String,
}

/// Reassembles RFC 2231 sections. Returns `None` if the value uses a
/// charset outside the table or has broken percent escapes.
fn join_sections(mut sections: Vec<Section>) -> Option<String> {
    sections.sort_by_key(|s| s.index);

    let mut charset = Charset::default();
    let mut bytes = Vec::new();
    for (position, section) in sections.iter().enumerate() {
        if !section.extended {
            bytes.extend_from_slice(section.value.as_bytes());
            continue;
        }
        let mut value = section.value.as_str();
        if position == 0 {
            let mut fields = value.splitn(3, '\'');
            if let (Some(label), Some(_language), Some(rest)) = (fields.next(), fields.next(), fields.next()) {
                if !label.is_empty() {
                    charset = Charset::from_label(label).ok()?;
                }
                value = rest;
            }
        }
        percent_decode(value, &mut bytes)?;
    }

    charset.decode(&bytes).ok()
}

fn percent_decode(value: &str, out: &mut Vec<u8>) -> Option<()> {
    let mut bytes = value.bytes();
    while let Some(byte) = bytes.next() {
        if byte == b'%' {
            let hi = char::from(bytes.next()?).to_digit(16)?;
            let lo = char::from(bytes.next()?).to_digit(16)?;
            out.push(u8::try_from(hi * 16 + lo).ok()?);
        } else {
            out.push(byte);
        }
    }
    Some(())
}

/// Splits on `separator` outside of double-quoted strings.
fn split_unquoted(s: &str, separator: char) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, ch) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == separator && !in_quotes => {
                parts.push(&s[start..i]);
                start = i + ch.len_utf8();
            }
            _ => {}
        }
    }

    if in_quotes {
        return Err(Error::InvalidContentType(format!("Unterminated quoted string: {s}")));
    }
    parts.push(&s[start..]);
    Ok(parts)
}

/// Strips surrounding quotes and resolves backslash escapes.
fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        return value.to_string();
    };

    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                result.push(next);
            }
        } else {
            result.push(ch);
        }
    }
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_new() {
        let ct = ContentType::new("text", "plain");
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert!(ct.parameters.is_empty());
    }

    #[test]
    fn test_content_type_parse() {
        let ct = ContentType::parse("text/plain; charset=utf-8").unwrap();
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert_eq!(ct.charset(), Some("utf-8"));
        assert_eq!(ct.mime_type(), "text/plain");
    }

    #[test]
    fn test_content_type_parse_is_case_insensitive() {
        let ct = ContentType::parse("Multipart/Mixed; BOUNDARY=abc").unwrap();
        assert!(ct.is("multipart", "mixed"));
        assert_eq!(ct.boundary(), Some("abc"));
    }

    #[test]
    fn test_content_type_parse_quoted() {
        let ct = ContentType::parse("multipart/mixed; boundary=\"----=_Part_123\"").unwrap();
        assert_eq!(ct.main_type, "multipart");
        assert_eq!(ct.sub_type, "mixed");
        assert_eq!(ct.boundary(), Some("----=_Part_123"));
    }

    #[test]
    fn test_content_type_quoted_semicolon_and_escape() {
        let ct = ContentType::parse(r#"application/octet-stream; name="a;b \"c\".txt"; x=1"#).unwrap();
        assert_eq!(ct.name(), Some(r#"a;b "c".txt"#));
        assert_eq!(ct.parameter("x"), Some("1"));
    }

    #[test]
    fn test_content_type_folded_parameters() {
        let ct = ContentType::parse("image/jpeg; x-unix-mode=0644; name=\"image.gif\"").unwrap();
        assert_eq!(ct.mime_type(), "image/jpeg");
        assert_eq!(ct.name(), Some("image.gif"));
    }

    #[test]
    fn test_content_type_invalid() {
        assert!(ContentType::parse("").is_err());
        assert!(ContentType::parse("text").is_err());
        assert!(ContentType::parse("text/plain; charset=\"utf-8").is_err());
    }

    #[test]
    fn test_rfc2231_extended_value() {
        let cd = ContentDisposition::parse("attachment; filename*=utf-8''%E2%82%AC%20rates.txt").unwrap();
        assert_eq!(cd.filename(), Some("€ rates.txt"));
        assert!(cd.is_attachment());
    }

    #[test]
    fn test_rfc2231_continuations() {
        let cd = ContentDisposition::parse(
            "attachment; filename*0*=iso-8859-1'en'Caf%E9; filename*1=\" menu.pdf\"",
        )
        .unwrap();
        assert_eq!(cd.filename(), Some("Café menu.pdf"));
    }

    #[test]
    fn test_rfc2231_unknown_charset_is_dropped() {
        let cd = ContentDisposition::parse("attachment; filename*=koi8-r''%C1").unwrap();
        assert_eq!(cd.filename(), None);
    }

    #[test]
    fn test_content_type_display() {
        let ct = ContentType::text_plain().with_parameter("charset", "utf-8");
        assert_eq!(ct.to_string(), "text/plain");
        assert_eq!(ct.resolve_charset().unwrap(), Charset::Utf8);
    }

    #[test]
    fn test_resolve_charset_default_and_unsupported() {
        assert_eq!(ContentType::text_plain().resolve_charset().unwrap(), Charset::Utf8);
        let ct = ContentType::parse("text/plain; charset=windows-1251").unwrap();
        assert!(matches!(
            ct.resolve_charset(),
            Err(Error::UnsupportedCharset(ref name)) if name == "windows-1251"
        ));
    }
}
