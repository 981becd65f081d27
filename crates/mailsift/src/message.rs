//! Parsed message model.

use std::io::Cursor;

use chrono::{DateTime, FixedOffset};
use mailsift_mime::{Address, Headers};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A fully decoded email message.
///
/// Built once by [`Parser::parse`](crate::Parser::parse) and never mutated
/// by the library afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Message {
    /// All header fields, RFC 2047 words decoded. Names are lower-cased.
    pub headers: Headers,

    /// Decoded `Subject`.
    pub subject: String,
    /// `Sender`, if present.
    pub sender: Option<Address>,
    /// `From` mailboxes.
    pub from: Vec<Address>,
    /// `Reply-To` mailboxes.
    pub reply_to: Vec<Address>,
    /// `To` mailboxes.
    pub to: Vec<Address>,
    /// `Cc` mailboxes.
    pub cc: Vec<Address>,
    /// `Bcc` mailboxes.
    pub bcc: Vec<Address>,
    /// `Date`, or `None` when the header is absent.
    pub date: Option<DateTime<FixedOffset>>,
    /// `Message-ID` without angle brackets.
    pub message_id: String,
    /// `In-Reply-To` identifiers in header order.
    pub in_reply_to: Vec<String>,
    /// `References` identifiers in header order.
    pub references: Vec<String>,

    /// `Resent-From` mailboxes.
    pub resent_from: Vec<Address>,
    /// `Resent-Sender`, if present.
    pub resent_sender: Option<Address>,
    /// `Resent-To` mailboxes.
    pub resent_to: Vec<Address>,
    /// `Resent-Cc` mailboxes.
    pub resent_cc: Vec<Address>,
    /// `Resent-Bcc` mailboxes.
    pub resent_bcc: Vec<Address>,
    /// `Resent-Date`; the Unix epoch when the header is absent.
    pub resent_date: DateTime<FixedOffset>,
    /// `Resent-Message-ID` without angle brackets.
    pub resent_message_id: String,

    /// Declared top-level `Content-Type`, empty when absent.
    pub content_type: String,

    /// Concatenated `text/plain` content.
    pub text_body: String,
    /// Concatenated `text/html` content.
    pub html_body: String,
    /// Attachments in document order.
    pub attachments: Vec<Attachment>,
    /// Inline files referenced from the HTML body by content id.
    pub embedded_files: Vec<EmbeddedFile>,
}

impl Message {
    /// Returns `true` if the message carries any attachments.
    #[must_use]
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    /// Looks up an embedded file by content id.
    #[must_use]
    pub fn embedded_file(&self, content_id: &str) -> Option<&EmbeddedFile> {
        self.embedded_files
            .iter()
            .find(|file| file.content_id == content_id)
    }
}

/// A file attached to a `multipart/mixed` message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Attachment {
    /// Decoded filename.
    pub filename: String,
    /// Media type without parameters, e.g. `application/pdf`.
    pub content_type: String,
    /// Transfer-decoded content.
    pub data: Vec<u8>,
}

impl Attachment {
    /// Returns a reader over the attachment content.
    #[must_use]
    pub fn reader(&self) -> Cursor<&[u8]> {
        Cursor::new(self.data.as_slice())
    }
}

/// An inline part referenced by `cid:` URLs in the HTML body.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EmbeddedFile {
    /// `Content-Id` without angle brackets.
    pub content_id: String,
    /// Declared `Content-Type`, parameters included.
    pub content_type: String,
    /// Transfer-decoded content.
    pub data: Vec<u8>,
}

impl EmbeddedFile {
    /// Returns a reader over the file content.
    #[must_use]
    pub fn reader(&self) -> Cursor<&[u8]> {
        Cursor::new(self.data.as_slice())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Read;

    use super::*;

    #[test]
    fn test_attachment_reader() {
        let attachment = Attachment {
            filename: "data.json".into(),
            content_type: "application/json".into(),
            data: b"[1, 2, 3]".to_vec(),
        };

        let mut out = String::new();
        attachment.reader().read_to_string(&mut out).unwrap();
        assert_eq!(out, "[1, 2, 3]");
        // Each reader starts from the beginning.
        assert_eq!(attachment.reader().bytes().count(), 9);
    }

    #[test]
    fn test_embedded_reader() {
        let file = EmbeddedFile {
            content_id: "logo@example.com".into(),
            content_type: "image/png".into(),
            data: vec![0x89, b'P', b'N', b'G'],
        };

        let mut out = Vec::new();
        file.reader().read_to_end(&mut out).unwrap();
        assert_eq!(out, file.data);
    }
}
