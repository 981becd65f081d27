//! MIME header handling.

use std::fmt;

use crate::content_type::{ContentDisposition, ContentType};
use crate::encoding::decode_sentence;
use crate::error::{Error, Result};

/// Collection of email headers.
///
/// Names are matched case-insensitively but keep the spelling of their
/// first occurrence. Fields iterate in first-seen order, and values for a
/// repeated name keep the order in which they appeared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Headers {
    fields: Vec<(String, Vec<String>)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.values_mut(&name) {
            Some(values) => values.push(value),
            None => self.fields.push((name, vec![value])),
        }
    }

    fn values(&self, name: &str) -> Option<&Vec<String>> {
        self.fields
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, values)| values)
    }

    fn values_mut(&mut self, name: &str) -> Option<&mut Vec<String>> {
        self.fields
            .iter_mut()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, values)| values)
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values(name).and_then(|v| v.first().map(String::as_str))
    }

    /// Gets the first value for a header, or `""` if it is absent.
    #[must_use]
    pub fn get_or_empty(&self, name: &str) -> &str {
        self.get(name).unwrap_or_default()
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.values(name)
            .map(|v| v.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns an iterator over all headers, by name in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.as_str(), v.as_str())))
    }

    /// Applies `f` to every value of every header, keeping names and order.
    #[must_use]
    pub fn map_values(&self, f: impl Fn(&str) -> String) -> Self {
        let fields = self
            .fields
            .iter()
            .map(|(name, values)| (name.clone(), values.iter().map(|v| f(v)).collect()))
            .collect();
        Self { fields }
    }

    /// Returns a copy with RFC 2047 encoded words decoded in every value.
    #[must_use]
    pub fn decode_words(&self) -> Self {
        self.map_values(decode_sentence)
    }

    /// Parses the `Content-Type` header.
    ///
    /// Returns `None` when the header is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is present but malformed.
    pub fn content_type(&self) -> Result<Option<ContentType>> {
        self.get("content-type").map(ContentType::parse).transpose()
    }

    /// Parses the `Content-Disposition` header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is present but malformed.
    pub fn content_disposition(&self) -> Result<Option<ContentDisposition>> {
        self.get("content-disposition")
            .map(ContentDisposition::parse)
            .transpose()
    }

    /// Parses a header block from the start of `input`.
    ///
    /// Reading stops at the first empty line; the bytes after it are
    /// returned as the body. If the input ends without an empty line, the
    /// body is empty. Lines may end in `\r\n` or `\n`, and folded
    /// continuation lines are joined with a single space.
    ///
    /// ```text
    /// Header-Name: value
    /// Continuation: line
    ///   continued
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if a line is neither a `Name: value` field nor a
    /// continuation of one.
    pub fn parse(input: &[u8]) -> Result<(Self, &[u8])> {
        let mut headers = Self::new();
        let mut current: Option<(String, String)> = None;
        let mut pos = 0;

        while pos < input.len() {
            let (line, next) = next_line(input, pos);
            pos = next;

            if line.is_empty() {
                // Empty line signals end of headers
                break;
            }

            let line = String::from_utf8_lossy(line);

            // Check for continuation line (starts with space or tab)
            if line.starts_with(' ') || line.starts_with('\t') {
                let Some((_, value)) = current.as_mut() else {
                    return Err(Error::InvalidHeader(format!(
                        "Continuation line before first field: {line:?}"
                    )));
                };
                let folded = line.trim();
                if !folded.is_empty() {
                    if !value.is_empty() {
                        value.push(' ');
                    }
                    value.push_str(folded);
                }
                continue;
            }

            // Save previous header if exists
            if let Some((name, value)) = current.take() {
                headers.add(name, value);
            }

            let Some((name, value)) = line.split_once(':') else {
                return Err(Error::InvalidHeader(format!("Missing colon: {line:?}")));
            };
            let name = name.trim_end();
            if !is_field_name(name) {
                return Err(Error::InvalidHeader(format!("Invalid field name: {name:?}")));
            }
            current = Some((name.to_string(), value.trim().to_string()));
        }

        // Save last header
        if let Some((name, value)) = current {
            headers.add(name, value);
        }

        Ok((headers, &input[pos.min(input.len())..]))
    }
}

/// Splits a whole message into its header block and body.
///
/// A leading mbox `From ` separator line is skipped.
///
/// # Errors
///
/// Returns an error if the input is empty, has no header fields, or the
/// header block is malformed.
pub fn split_message(input: &[u8]) -> Result<(Headers, &[u8])> {
    let mut input = input;
    if input.starts_with(b"From ") {
        let (_, next) = next_line(input, 0);
        input = &input[next..];
    }

    let (headers, body) = Headers::parse(input)?;
    if headers.is_empty() {
        return Err(Error::InvalidHeader("Message has no header fields".to_string()));
    }
    Ok((headers, body))
}

/// Returns the line starting at `pos` without its terminator, and the
/// position after the terminator.
fn next_line(input: &[u8], pos: usize) -> (&[u8], usize) {
    let rest = &input[pos..];
    match rest.iter().position(|&b| b == b'\n') {
        Some(lf) => {
            let line = &rest[..lf];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            (line, pos + lf + 1)
        }
        None => (rest.strip_suffix(b"\r").unwrap_or(rest), input.len()),
    }
}

/// RFC 5322 field names: printable ASCII except colon.
fn is_field_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_graphic() && b != b':')
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            writeln!(f, "{name}: {value}")?;
        }
        Ok(())
    }
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
    fn test_headers_new() {
        let headers = Headers::new();
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain")); // Case insensitive
        assert_eq!(headers.get_or_empty("Subject"), "");
    }

    #[test]
    fn test_headers_repeated_values_keep_order() {
        let mut headers = Headers::new();
        headers.add("Received", "from a");
        headers.add("received", "from b");
        assert_eq!(headers.get_all("Received"), vec!["from a", "from b"]);
        assert_eq!(headers.get("Received"), Some("from a"));
    }

    #[test]
    fn test_headers_parse() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: text/plain;\r\n",
            " charset=utf-8\r\n",
            "\r\n",
            "Body\r\n"
        );

        let (headers, body) = Headers::parse(text.as_bytes()).unwrap();
        assert_eq!(headers.get("From"), Some("sender@example.com"));
        assert_eq!(headers.get("To"), Some("recipient@example.com"));
        assert_eq!(headers.get("Subject"), Some("Test Message"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
        assert_eq!(body, b"Body\r\n");
    }

    #[test]
    fn test_headers_parse_lf_and_tab_folding() {
        let text = "Content-Type: application/csv; \n\tname=\"unencoded.csv\"\n\nabc";
        let (headers, body) = Headers::parse(text.as_bytes()).unwrap();
        assert_eq!(
            headers.get("content-type"),
            Some("application/csv; name=\"unencoded.csv\"")
        );
        assert_eq!(body, b"abc");
    }

    #[test]
    fn test_headers_parse_without_blank_line() {
        let (headers, body) = Headers::parse(b"Subject: only headers").unwrap();
        assert_eq!(headers.get("subject"), Some("only headers"));
        assert!(body.is_empty());
    }

    #[test]
    fn test_headers_parse_leading_blank_line() {
        let (headers, body) = Headers::parse(b"\nplain body").unwrap();
        assert!(headers.is_empty());
        assert_eq!(body, b"plain body");
    }

    #[test]
    fn test_headers_parse_rejects_garbage() {
        assert!(Headers::parse(b"not a header\n\n").is_err());
        assert!(Headers::parse(b" folded first\n\n").is_err());
        assert!(Headers::parse(b"Bad Name: x\n\n").is_err());
    }

    #[test]
    fn test_split_message_skips_mbox_separator() {
        let text = "From someone@example.com  Mon Mar 28 07:50:43 2022\nSubject: hi\n\nbody";
        let (headers, body) = split_message(text.as_bytes()).unwrap();
        assert_eq!(headers.get("subject"), Some("hi"));
        assert_eq!(body, b"body");
    }

    #[test]
    fn test_split_message_rejects_empty() {
        assert!(split_message(b"").is_err());
        assert!(split_message(b"\nbody").is_err());
    }

    #[test]
    fn test_decode_words() {
        let mut headers = Headers::new();
        headers.add("Subject", "=?UTF-8?Q?Peter_Pahol=C3=ADk?=");
        headers.add("X-Custom", "plain value");

        let decoded = headers.decode_words();
        assert_eq!(decoded.get("subject"), Some("Peter Paholík"));
        assert_eq!(decoded.get("x-custom"), Some("plain value"));
        assert_eq!(headers.get("subject"), Some("=?UTF-8?Q?Peter_Pahol=C3=ADk?="));
    }

    #[test]
    fn test_content_type_and_disposition() {
        let (headers, _) = Headers::parse(
            b"Content-Type: text/html; charset=UTF-8\nContent-Disposition: inline\n\n",
        )
        .unwrap();
        assert!(headers.content_type().unwrap().unwrap().is("text", "html"));
        assert!(!headers.content_disposition().unwrap().unwrap().is_attachment());
        assert!(Headers::new().content_type().unwrap().is_none());
    }

    #[test]
    fn test_headers_display() {
        let mut headers = Headers::new();
        headers.add("From", "sender@example.com");
        headers.add("to", "recipient@example.com");

        assert_eq!(
            headers.to_string(),
            "From: sender@example.com\nto: recipient@example.com\n"
        );
    }

    #[test]
    fn test_headers_iter() {
        let mut headers = Headers::new();
        headers.add("From", "sender@example.com");
        headers.add("To", "recipient@example.com");

        let mut count = 0;
        for (name, value) in headers.iter() {
            assert!(!name.is_empty());
            assert!(!value.is_empty());
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn test_headers_keep_first_seen_names() {
        let (headers, _) =
            Headers::parse(b"Subject: x\nX-Custom-Thing: 1\nx-custom-thing: 2\nTO: a@b\n\n")
                .unwrap();

        let names: Vec<_> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Subject", "X-Custom-Thing", "X-Custom-Thing", "TO"]);
        assert_eq!(headers.get_all("X-CUSTOM-THING"), vec!["1", "2"]);
        assert_eq!(headers.get("to"), Some("a@b"));

        let decoded = headers.decode_words();
        assert_eq!(decoded.iter().next(), Some(("Subject", "x")));
    }
}
