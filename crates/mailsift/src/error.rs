//! Error types for message parsing.

use thiserror::Error;

/// Errors that can occur while parsing a message.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error while reading the message source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Message or part header section could not be parsed.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Address-valued header does not follow RFC 5322.
    #[error("Malformed address in {field}: {message}")]
    MalformedAddress {
        /// Header field the address came from.
        field: String,
        /// Description of what went wrong.
        message: String,
    },

    /// Date header is present but cannot be parsed.
    #[error("Unparseable date in {field}: {value:?}")]
    UnparseableDate {
        /// Header field the date came from.
        field: String,
        /// The raw header value.
        value: String,
    },

    /// Charset missing from the decoding table.
    #[error("Unsupported charset: {0}")]
    UnsupportedCharset(String),

    /// Content-Transfer-Encoding that cannot be decoded.
    #[error("Unsupported transfer encoding: {0}")]
    UnsupportedTransferEncoding(String),

    /// Part whose media type is not allowed where it appears.
    #[error("Unrecognized MIME type: {0}")]
    UnrecognizedMimeType(String),

    /// Multipart body ended before its closing delimiter.
    #[error("Multipart body with boundary {0:?} is not terminated")]
    TruncatedMultipart(String),

    /// Multipart nesting exceeds the configured depth.
    #[error("Multipart nesting exceeds maximum depth of {0}")]
    NestingTooDeep(usize),

    /// Input exceeds the configured size limit.
    #[error("Message of {size} bytes exceeds limit of {limit} bytes")]
    MessageTooLarge {
        /// Size of the rejected input.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Lower-level MIME decoding failure (base64, UTF-8, content type).
    #[error(transparent)]
    Mime(mailsift_mime::Error),
}

impl From<mailsift_mime::Error> for Error {
    fn from(err: mailsift_mime::Error) -> Self {
        use mailsift_mime::Error as Mime;

        match err {
            Mime::UnsupportedCharset(name) => Self::UnsupportedCharset(name),
            Mime::UnsupportedTransferEncoding(name) => Self::UnsupportedTransferEncoding(name),
            Mime::TruncatedMultipart(boundary) => Self::TruncatedMultipart(boundary),
            Mime::InvalidHeader(message) => Self::MalformedMessage(message),
            other => Self::Mime(other),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
