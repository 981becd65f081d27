//! # mailsift
//!
//! Decodes raw RFC 5322 / MIME email into a structured [`Message`]: typed
//! header fields, plain-text and HTML bodies, attachments and the inline
//! files an HTML body references by content id.
//!
//! ## Features
//!
//! - **Header fields**: Address lists, dates, message ids, `Resent-*` blocks
//! - **RFC 2047**: Encoded words in subjects, display names and filenames
//! - **Multipart walk**: `multipart/mixed`, `multipart/alternative` and
//!   `multipart/related`, nested to a configurable depth
//! - **Transfer encodings**: Base64 and Quoted-Printable part bodies
//! - **Charsets**: UTF-8, US-ASCII and ISO-8859 parts 1-10 and 13-16
//!
//! ## Quick Start
//!
//! ```ignore
//! let raw = std::fs::read("message.eml")?;
//! let message = mailsift::parse(&raw)?;
//!
//! println!("Subject: {}", message.subject);
//! for from in &message.from {
//!     println!("From: {from}");
//! }
//! println!("{}", message.text_body);
//!
//! for attachment in &message.attachments {
//!     println!("{} ({}, {} bytes)", attachment.filename, attachment.content_type, attachment.data.len());
//! }
//! ```
//!
//! ### Configuring Limits
//!
//! ```ignore
//! use mailsift::{Parser, ParserConfig};
//!
//! let parser = Parser::new(
//!     ParserConfig::builder()
//!         .max_depth(8)
//!         .max_message_size(25 * 1024 * 1024)
//!         .build(),
//! );
//! let message = parser.parse_reader(std::io::stdin())?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
mod message;
mod parser;
mod walker;

pub mod fields;

pub use error::{Error, Result};
pub use message::{Attachment, EmbeddedFile, Message};
pub use parser::{DEFAULT_MAX_DEPTH, Parser, ParserConfig, ParserConfigBuilder, parse};
pub use walker::{Context, PartKind};

pub use mailsift_mime::{Address, Headers};
