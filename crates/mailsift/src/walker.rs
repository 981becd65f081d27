//! Recursive classification and decoding of MIME entities.
//!
//! Every part is classified once into a [`PartKind`] from its content type,
//! filename presence, transfer-encoding presence and the multipart it sits
//! in. The walk then matches on the kind; kinds that are not allowed in a
//! context fail the whole parse.

use mailsift_mime::{ContentType, Multipart, Part, decode_sentence};

use crate::error::{Error, Result};
use crate::message::{Attachment, EmbeddedFile};

/// Where a part appears in the entity tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    /// The message body itself.
    TopLevel,
    /// A direct child of `multipart/mixed`.
    Mixed,
    /// A direct child of `multipart/alternative` or `multipart/related`.
    Alternative,
}

/// Classification of a MIME entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartKind {
    /// `text/plain` body contribution.
    PlainText,
    /// `text/html` body contribution.
    Html,
    /// Nested `multipart/mixed`.
    MultipartMixed,
    /// Nested `multipart/alternative`.
    MultipartAlternative,
    /// Nested `multipart/related`.
    MultipartRelated,
    /// File attached to a `multipart/mixed` message.
    Attachment,
    /// Inline file referenced by content id.
    EmbeddedFile,
    /// Media type not allowed in its context.
    Unrecognized(String),
}

impl PartKind {
    /// Classifies an entity.
    ///
    /// In `multipart/mixed`, a part carrying a filename is an attachment
    /// whatever its media type. In `multipart/alternative`, a part that is
    /// neither text nor `multipart/related` is an embedded file exactly when
    /// it declares a `Content-Transfer-Encoding`.
    #[must_use]
    pub fn classify(
        context: Context,
        content_type: &ContentType,
        has_filename: bool,
        has_transfer_encoding: bool,
    ) -> Self {
        let is = |main: &str, sub: &str| content_type.is(main, sub);

        match context {
            Context::TopLevel => {
                if is("text", "plain") {
                    Self::PlainText
                } else if is("text", "html") {
                    Self::Html
                } else if is("multipart", "mixed") {
                    Self::MultipartMixed
                } else if is("multipart", "alternative") {
                    Self::MultipartAlternative
                } else {
                    Self::Unrecognized(content_type.mime_type())
                }
            }
            Context::Mixed => {
                if is("multipart", "alternative") {
                    Self::MultipartAlternative
                } else if has_filename {
                    Self::Attachment
                } else {
                    Self::Unrecognized(content_type.mime_type())
                }
            }
            Context::Alternative => {
                if is("text", "plain") {
                    Self::PlainText
                } else if is("text", "html") {
                    Self::Html
                } else if is("multipart", "related") {
                    Self::MultipartRelated
                } else if has_transfer_encoding {
                    Self::EmbeddedFile
                } else {
                    Self::Unrecognized(content_type.mime_type())
                }
            }
        }
    }
}

/// Everything collected from one entity subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Walked {
    pub text_body: String,
    pub html_body: String,
    pub attachments: Vec<Attachment>,
    pub embedded_files: Vec<EmbeddedFile>,
}

impl Walked {
    /// Appends another subtree's results in document order.
    fn merge(&mut self, other: Self) {
        self.text_body.push_str(&other.text_body);
        self.html_body.push_str(&other.html_body);
        self.attachments.extend(other.attachments);
        self.embedded_files.extend(other.embedded_files);
    }
}

/// Depth-bounded recursive walker.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Walker {
    max_depth: usize,
}

impl Walker {
    pub const fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Walks a message body given its top-level content type.
    ///
    /// Top-level text bodies are charset-decoded as they stand; no
    /// transfer decoding is applied at this level.
    pub fn walk(self, content_type: &ContentType, body: &[u8]) -> Result<Walked> {
        let kind = PartKind::classify(Context::TopLevel, content_type, false, false);
        tracing::debug!(?kind, content_type = %content_type, "walking message body");

        let mut walked = Walked::default();
        match kind {
            PartKind::PlainText => walked.text_body = decode_text(content_type, body)?,
            PartKind::Html => walked.html_body = decode_text(content_type, body)?,
            PartKind::MultipartMixed => walked = self.mixed(content_type, body, 1)?,
            PartKind::MultipartAlternative => walked = self.alternative(content_type, body, 1)?,
            PartKind::MultipartRelated | PartKind::Attachment | PartKind::EmbeddedFile => {
                return Err(Error::UnrecognizedMimeType(content_type.mime_type()));
            }
            PartKind::Unrecognized(media_type) => {
                return Err(Error::UnrecognizedMimeType(media_type));
            }
        }
        Ok(walked)
    }

    fn parts<'a>(self, content_type: &ContentType, body: &'a [u8], depth: usize) -> Result<Multipart<'a>> {
        if depth > self.max_depth {
            return Err(Error::NestingTooDeep(self.max_depth));
        }
        let boundary = content_type.boundary().unwrap_or_default();
        Ok(Multipart::new(body, boundary)?)
    }

    fn mixed(self, content_type: &ContentType, body: &[u8], depth: usize) -> Result<Walked> {
        let mut walked = Walked::default();

        for part in self.parts(content_type, body, depth)? {
            let part = part?;
            let part_type = part.content_type()?;
            let filename = part.filename()?;
            let kind = PartKind::classify(
                Context::Mixed,
                &part_type,
                filename.is_some(),
                part.declared_transfer_encoding().is_some(),
            );
            tracing::debug!(depth, ?kind, content_type = %part_type, "multipart/mixed part");

            match kind {
                PartKind::MultipartAlternative => {
                    // The alternative branch replaces the bodies and inline
                    // files collected so far; attachments are kept.
                    let inner = self.alternative(&part_type, part.body, depth + 1)?;
                    walked.text_body = inner.text_body;
                    walked.html_body = inner.html_body;
                    walked.embedded_files = inner.embedded_files;
                }
                PartKind::Attachment => {
                    let filename = filename.unwrap_or_default();
                    walked.attachments.push(attachment(&part, &part_type, &filename)?);
                }
                PartKind::Unrecognized(media_type) => {
                    return Err(Error::UnrecognizedMimeType(media_type));
                }
                PartKind::PlainText
                | PartKind::Html
                | PartKind::MultipartMixed
                | PartKind::MultipartRelated
                | PartKind::EmbeddedFile => {
                    return Err(Error::UnrecognizedMimeType(part_type.mime_type()));
                }
            }
        }

        Ok(walked)
    }

    fn alternative(self, content_type: &ContentType, body: &[u8], depth: usize) -> Result<Walked> {
        let mut walked = Walked::default();

        for part in self.parts(content_type, body, depth)? {
            let part = part?;
            let part_type = part.content_type()?;
            let kind = PartKind::classify(
                Context::Alternative,
                &part_type,
                false,
                part.declared_transfer_encoding().is_some(),
            );
            tracing::debug!(depth, ?kind, content_type = %part_type, "multipart/alternative part");

            match kind {
                PartKind::PlainText => {
                    walked.text_body.push_str(&decode_text(&part_type, &part.decode_body()?)?);
                }
                PartKind::Html => {
                    walked.html_body.push_str(&decode_text(&part_type, &part.decode_body()?)?);
                }
                PartKind::MultipartRelated => {
                    let inner = self.alternative(&part_type, part.body, depth + 1)?;
                    walked.merge(inner);
                }
                PartKind::EmbeddedFile => walked.embedded_files.push(embedded_file(&part)?),
                PartKind::Unrecognized(media_type) => {
                    return Err(Error::UnrecognizedMimeType(media_type));
                }
                PartKind::MultipartMixed | PartKind::MultipartAlternative | PartKind::Attachment => {
                    return Err(Error::UnrecognizedMimeType(part_type.mime_type()));
                }
            }
        }

        Ok(walked)
    }
}

/// Charset-decodes text and drops one trailing line break.
fn decode_text(content_type: &ContentType, bytes: &[u8]) -> Result<String> {
    let text = content_type.resolve_charset()?.decode(bytes)?;
    Ok(trim_newline(text))
}

fn trim_newline(mut text: String) -> String {
    if text.ends_with("\r\n") {
        text.truncate(text.len() - 2);
    } else if text.ends_with('\n') {
        text.truncate(text.len() - 1);
    }
    text
}

fn attachment(part: &Part<'_>, content_type: &ContentType, raw_filename: &str) -> Result<Attachment> {
    let filename = decode_sentence(raw_filename);
    Ok(Attachment {
        filename: base_name(&filename).to_string(),
        content_type: content_type.mime_type(),
        data: part.decode_body()?,
    })
}

/// Last path segment of a filename, with `/` and `\` both separators.
fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty())
        .unwrap_or(name)
}

fn embedded_file(part: &Part<'_>) -> Result<EmbeddedFile> {
    Ok(EmbeddedFile {
        content_id: part.content_id(),
        content_type: part.headers.get_or_empty("content-type").to_string(),
        data: part.decode_body()?,
    })
}
