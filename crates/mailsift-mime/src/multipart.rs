//! Boundary-delimited multipart bodies (RFC 2046 §5.1).

use crate::content_type::ContentType;
use crate::encoding::{TransferEncoding, decode_sentence};
use crate::error::{Error, Result};
use crate::header::Headers;

/// MIME message part.
#[derive(Debug, Clone)]
pub struct Part<'a> {
    /// Part headers.
    pub headers: Headers,
    /// Part body (raw bytes, still transfer-encoded).
    pub body: &'a [u8],
}

impl<'a> Part<'a> {
    /// Creates a new part.
    #[must_use]
    pub const fn new(headers: Headers, body: &'a [u8]) -> Self {
        Self { headers, body }
    }

    /// Parses a part from its raw bytes (headers, blank line, body).
    ///
    /// # Errors
    ///
    /// Returns an error if the part headers are malformed.
    pub fn parse(raw: &'a [u8]) -> Result<Self> {
        let (headers, body) = Headers::parse(raw)?;
        Ok(Self::new(headers, body))
    }

    /// Gets the content type, defaulting to `text/plain` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        Ok(self
            .headers
            .content_type()?
            .unwrap_or_else(ContentType::text_plain))
    }

    /// Returns the declared `Content-Transfer-Encoding`, if any.
    #[must_use]
    pub fn declared_transfer_encoding(&self) -> Option<&str> {
        self.headers.get("content-transfer-encoding")
    }

    /// Gets the transfer encoding (7bit when undeclared).
    ///
    /// # Errors
    ///
    /// Returns an error if the declared encoding is not supported.
    pub fn transfer_encoding(&self) -> Result<TransferEncoding> {
        self.declared_transfer_encoding()
            .map_or(Ok(TransferEncoding::SevenBit), TransferEncoding::parse)
    }

    /// Decodes the body according to the transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoding is unsupported or decoding fails.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        self.transfer_encoding()?.decode(self.body)
    }

    /// Returns the raw filename: the `Content-Disposition` `filename`
    /// parameter, falling back to the `Content-Type` `name` parameter.
    ///
    /// Empty values count as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if either header is malformed.
    pub fn filename(&self) -> Result<Option<String>> {
        let from_disposition = self
            .headers
            .content_disposition()?
            .and_then(|cd| cd.filename().map(str::to_string));
        let filename = match from_disposition {
            Some(name) if !name.is_empty() => Some(name),
            _ => self
                .headers
                .content_type()?
                .and_then(|ct| ct.name().map(str::to_string)),
        };
        Ok(filename.filter(|name| !name.is_empty()))
    }

    /// Returns the `Content-Id`, word-decoded, with angle brackets and
    /// surrounding whitespace removed. Empty if the header is absent.
    #[must_use]
    pub fn content_id(&self) -> String {
        decode_sentence(self.headers.get_or_empty("content-id"))
            .trim_matches(|c: char| c == '<' || c == '>' || c.is_whitespace())
            .to_string()
    }
}

/// Iterator over the parts of a multipart body.
///
/// The preamble before the first delimiter and the epilogue after the
/// closing delimiter are ignored. Iteration ends at the closing delimiter;
/// running out of input inside a part yields
/// [`Error::TruncatedMultipart`].
#[derive(Debug)]
pub struct Multipart<'a> {
    body: &'a [u8],
    dash_boundary: Vec<u8>,
    pos: Option<usize>,
    done: bool,
}

impl<'a> Multipart<'a> {
    /// Creates a splitter for `body` delimited by `boundary`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingBoundary`] if the boundary is empty.
    pub fn new(body: &'a [u8], boundary: &str) -> Result<Self> {
        if boundary.is_empty() {
            return Err(Error::MissingBoundary);
        }
        let mut dash_boundary = b"--".to_vec();
        dash_boundary.extend_from_slice(boundary.as_bytes());
        Ok(Self {
            body,
            dash_boundary,
            pos: None,
            done: false,
        })
    }

    fn boundary(&self) -> String {
        String::from_utf8_lossy(&self.dash_boundary[2..]).into_owned()
    }

    /// Finds the next delimiter line at or after `from`.
    fn find_delimiter(&self, from: usize) -> Option<Delimiter> {
        let mut line_start = from;
        while line_start <= self.body.len() {
            let rest = &self.body[line_start..];
            let line_len = rest.iter().position(|&b| b == b'\n');
            let line = &rest[..line_len.unwrap_or(rest.len())];
            let next = line_len.map_or(self.body.len(), |len| line_start + len + 1);

            if let Some(after) = line.strip_prefix(self.dash_boundary.as_slice()) {
                if let Some(after) = after.strip_prefix(b"--") {
                    if is_padding(after) {
                        return Some(Delimiter { line_start, next, closing: true });
                    }
                } else if is_padding(after) {
                    return Some(Delimiter { line_start, next, closing: false });
                }
            }

            if line_len.is_none() {
                return None;
            }
            line_start = next;
        }
        None
    }

    fn next_part(&mut self) -> Result<Option<Part<'a>>> {
        let start = match self.pos {
            Some(pos) => pos,
            None => {
                let Some(first) = self.find_delimiter(0) else {
                    return Err(Error::TruncatedMultipart(self.boundary()));
                };
                if first.closing {
                    return Ok(None);
                }
                first.next
            }
        };

        let Some(delimiter) = self.find_delimiter(start) else {
            // A trailing delimiter followed only by whitespace ends the body.
            if is_padding(&self.body[start..]) {
                return Ok(None);
            }
            return Err(Error::TruncatedMultipart(self.boundary()));
        };

        // The line break before a delimiter belongs to the delimiter.
        let mut end = delimiter.line_start;
        if end > start {
            end -= 1;
            if end > start && self.body[end - 1] == b'\r' {
                end -= 1;
            }
        }

        let part = Part::parse(&self.body[start..end])?;
        if delimiter.closing {
            self.done = true;
        } else {
            self.pos = Some(delimiter.next);
        }
        Ok(Some(part))
    }
}

impl<'a> Iterator for Multipart<'a> {
    type Item = Result<Part<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_part() {
            Ok(Some(part)) => Some(Ok(part)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

struct Delimiter {
    /// Offset of the first `-` of the delimiter line.
    line_start: usize,
    /// Offset just past the delimiter line's terminator.
    next: usize,
    closing: bool,
}

fn is_padding(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
}

/// Splits a multipart body into its parts.
///
/// # Errors
///
/// Returns an error if the boundary is empty, a part's headers are
/// malformed, or the closing delimiter is missing.
pub fn split<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<Part<'a>>> {
    Multipart::new(body, boundary)?.collect()
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
    fn test_split_two_parts() {
        let body = concat!(
            "This is the preamble.\r\n",
            "--abc\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "Part 1\r\n",
            "--abc\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<p>Part 2</p>\r\n",
            "--abc--\r\n",
            "Epilogue\r\n"
        );

        let parts = split(body.as_bytes(), "abc").unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].body, b"Part 1");
        assert_eq!(parts[1].body, b"<p>Part 2</p>");
        assert!(parts[1].content_type().unwrap().is("text", "html"));
    }

    #[test]
    fn test_split_keeps_inner_blank_lines() {
        let body = "--b\nContent-Type: text/plain\n\nline\n\n\n--b--\n";
        let parts = split(body.as_bytes(), "b").unwrap();
        assert_eq!(parts[0].body, b"line\n\n");
    }

    #[test]
    fn test_split_part_without_headers() {
        let body = "--b\n\nno headers here\n--b--";
        let parts = split(body.as_bytes(), "b").unwrap();
        assert!(parts[0].headers.is_empty());
        assert_eq!(parts[0].body, b"no headers here");
        assert!(parts[0].content_type().unwrap().is("text", "plain"));
    }

    #[test]
    fn test_split_ignores_longer_boundary() {
        let body = "--b\n\n--bx is not a delimiter\n--b --\n--b--\n";
        let parts = split(body.as_bytes(), "b").unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].body, b"--bx is not a delimiter\n--b --");
    }

    #[test]
    fn test_split_trailing_delimiter_without_close() {
        let body = "--b\nContent-Type: text/html\n\n<p/>\n--b\n\n";
        let parts = split(body.as_bytes(), "b").unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].body, b"<p/>");
    }

    #[test]
    fn test_split_truncated() {
        let body = "--b\nContent-Type: text/plain\n\nnever closed\n";
        assert!(matches!(
            split(body.as_bytes(), "b"),
            Err(Error::TruncatedMultipart(ref b)) if b == "b"
        ));
        assert!(matches!(
            split(b"no delimiter at all", "b"),
            Err(Error::TruncatedMultipart(_))
        ));
    }

    #[test]
    fn test_split_empty_boundary() {
        assert!(matches!(split(b"--\n", ""), Err(Error::MissingBoundary)));
    }

    #[test]
    fn test_part_filename_sources() {
        let part = Part::parse(
            b"Content-Type: application/json; name=\"from-type.json\"\nContent-Disposition: attachment; filename=\"from-disposition.json\"\n\n",
        )
        .unwrap();
        assert_eq!(part.filename().unwrap().as_deref(), Some("from-disposition.json"));

        let part = Part::parse(b"Content-Type: image/jpeg; name=\"image.gif\"\n\n").unwrap();
        assert_eq!(part.filename().unwrap().as_deref(), Some("image.gif"));

        let part = Part::parse(b"Content-Type: text/plain\nContent-Disposition: inline\n\n").unwrap();
        assert_eq!(part.filename().unwrap(), None);
    }

    #[test]
    fn test_part_content_id() {
        let part = Part::parse(b"Content-ID: <part2.9599C449@develhell.com>\n\n").unwrap();
        assert_eq!(part.content_id(), "part2.9599C449@develhell.com");
        assert_eq!(Part::parse(b"\n").unwrap().content_id(), "");
    }

    #[test]
    fn test_part_decode_body() {
        let part = Part::parse(b"Content-Transfer-Encoding: base64\n\nWzEsIDIs\nIDNd").unwrap();
        assert_eq!(part.decode_body().unwrap(), b"[1, 2, 3]");

        let part = Part::parse(b"Content-Transfer-Encoding: x-gzip\n\nabc").unwrap();
        assert!(matches!(
            part.decode_body(),
            Err(Error::UnsupportedTransferEncoding(_))
        ));
    }
}
