//! Top-level message parsing and parser configuration.

use std::io::Read;

use mailsift_mime::{ContentType, Headers, split_message};

use crate::error::{Error, Result};
use crate::fields::HeaderFields;
use crate::message::Message;
use crate::walker::Walker;

/// Default multipart nesting limit.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Parser configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    /// Deepest multipart nesting accepted. The top-level multipart is depth 1.
    pub max_depth: usize,
    /// Largest accepted input in bytes, or `None` for no limit.
    pub max_message_size: Option<usize>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_message_size: None,
        }
    }
}

impl ParserConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> ParserConfigBuilder {
        ParserConfigBuilder::new()
    }
}

/// Builder for [`ParserConfig`].
#[derive(Debug, Clone, Default)]
pub struct ParserConfigBuilder {
    config: ParserConfig,
}

impl ParserConfigBuilder {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum multipart nesting depth.
    #[must_use]
    pub const fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    /// Sets the maximum input size in bytes.
    #[must_use]
    pub const fn max_message_size(mut self, bytes: usize) -> Self {
        self.config.max_message_size = Some(bytes);
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub const fn build(self) -> ParserConfig {
        self.config
    }
}

/// Message parser.
///
/// A parser holds only its configuration, so one instance can be shared
/// and reused for any number of messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct Parser {
    config: ParserConfig,
}

impl Parser {
    /// Creates a parser with the given configuration.
    #[must_use]
    pub const fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Returns the parser configuration.
    #[must_use]
    pub const fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parses a complete message.
    ///
    /// # Errors
    ///
    /// Returns an error if the header block, any address or date field, or
    /// any MIME entity cannot be decoded. No partial message is returned.
    pub fn parse(&self, input: &[u8]) -> Result<Message> {
        if let Some(limit) = self.config.max_message_size {
            if input.len() > limit {
                return Err(Error::MessageTooLarge {
                    size: input.len(),
                    limit,
                });
            }
        }
        tracing::debug!(size = input.len(), "parsing message");

        let (raw_headers, body) = split_message(input)?;
        let fields = HeaderFields::interpret(&raw_headers)?;

        let content_type = top_level_content_type(&raw_headers)?;
        let walked = Walker::new(self.config.max_depth).walk(&content_type, body)?;

        tracing::debug!(
            text = walked.text_body.len(),
            html = walked.html_body.len(),
            attachments = walked.attachments.len(),
            embedded = walked.embedded_files.len(),
            "parsed message"
        );

        Ok(Message {
            headers: fields.headers,
            subject: fields.subject,
            sender: fields.sender,
            from: fields.from,
            reply_to: fields.reply_to,
            to: fields.to,
            cc: fields.cc,
            bcc: fields.bcc,
            date: fields.date,
            message_id: fields.message_id,
            in_reply_to: fields.in_reply_to,
            references: fields.references,
            resent_from: fields.resent_from,
            resent_sender: fields.resent_sender,
            resent_to: fields.resent_to,
            resent_cc: fields.resent_cc,
            resent_bcc: fields.resent_bcc,
            resent_date: fields.resent_date,
            resent_message_id: fields.resent_message_id,
            content_type: fields.content_type,
            text_body: walked.text_body,
            html_body: walked.html_body,
            attachments: walked.attachments,
            embedded_files: walked.embedded_files,
        })
    }

    /// Reads a message to the end and parses it.
    ///
    /// When a size limit is configured, at most one byte past the limit is
    /// read before the message is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if reading fails, otherwise as [`Parser::parse`].
    pub fn parse_reader<R: Read>(&self, reader: R) -> Result<Message> {
        let mut input = Vec::new();
        match self.config.max_message_size {
            Some(limit) => {
                let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
                reader.take(cap).read_to_end(&mut input)?;
            }
            None => {
                let mut reader = reader;
                reader.read_to_end(&mut input)?;
            }
        }
        self.parse(&input)
    }
}

/// A missing `Content-Type` means `text/plain`; a blank one names no type.
fn top_level_content_type(headers: &Headers) -> Result<ContentType> {
    match headers.get("content-type") {
        None => Ok(ContentType::text_plain()),
        Some(value) if value.trim().is_empty() => Err(Error::UnrecognizedMimeType(String::new())),
        Some(value) => Ok(ContentType::parse(value)?),
    }
}

/// Parses a message with the default configuration.
///
/// # Errors
///
/// See [`Parser::parse`].
pub fn parse(input: impl AsRef<[u8]>) -> Result<Message> {
    Parser::default().parse(input.as_ref())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ParserConfig::builder()
            .max_depth(4)
            .max_message_size(1024)
            .build();
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.max_message_size, Some(1024));

        let default = ParserConfig::default();
        assert_eq!(default.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(default.max_message_size, None);
        assert_eq!(ParserConfigBuilder::new().build(), default);
    }

    #[test]
    fn test_parse_plain_message() {
        let message = parse("Subject: Hi\r\nDate: Fri, 21 Nov 1997 09:55:06 -0600\r\n\r\nHello!\r\n").unwrap();
        assert_eq!(message.subject, "Hi");
        assert_eq!(message.text_body, "Hello!");
        assert_eq!(message.content_type, "");
        assert!(message.date.is_some());
        assert!(!message.has_attachments());
    }

    #[test]
    fn test_parse_size_limit() {
        let parser = Parser::new(ParserConfig::builder().max_message_size(8).build());
        let err = parser.parse(b"Subject: too long\n\nbody").unwrap_err();
        assert!(matches!(err, Error::MessageTooLarge { limit: 8, .. }));

        let err = parser.parse_reader(&b"Subject: too long\n\nbody"[..]).unwrap_err();
        assert!(matches!(err, Error::MessageTooLarge { size: 9, limit: 8 }));
    }

    #[test]
    fn test_parse_reader() {
        let message = Parser::default()
            .parse_reader(std::io::Cursor::new(b"Subject: r\n\nfrom a reader\n".to_vec()))
            .unwrap();
        assert_eq!(message.text_body, "from a reader");
    }

    #[test]
    fn test_parse_rejects_empty_input() {
        assert!(matches!(parse(b""), Err(Error::MalformedMessage(_))));
    }

    #[test]
    fn test_parse_blank_content_type_is_unrecognized() {
        let err = parse("Subject: x\nContent-Type: \n\nbody\n").unwrap_err();
        assert!(matches!(err, Error::UnrecognizedMimeType(ref name) if name.is_empty()));

        let message = parse("Subject: x\n\nbody\n").unwrap();
        assert_eq!(message.text_body, "body");
    }

    #[test]
    fn test_parse_rejects_bad_content_type() {
        let err = parse("Content-Type: nonsense\n\nbody").unwrap_err();
        assert!(matches!(err, Error::Mime(mailsift_mime::Error::InvalidContentType(_))));
    }
}
