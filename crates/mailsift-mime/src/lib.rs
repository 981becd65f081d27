//! # mailsift-mime
//!
//! Wire-format primitives for reading Internet mail.
//!
//! ## Features
//!
//! - **Headers**: Unfolding, case-insensitive lookup, RFC 2047 word decoding
//! - **Content types**: `Content-Type` / `Content-Disposition` with RFC 2231 parameters
//! - **Transfer encodings**: Base64, Quoted-Printable and the identity encodings
//! - **Charsets**: UTF-8, US-ASCII and the ISO-8859 family
//! - **Addresses**: RFC 5322 mailbox and mailbox-list parsing
//! - **Multipart**: Boundary splitting with preamble/epilogue handling
//!
//! ## Quick Start
//!
//! ### Splitting a Message
//!
//! ```ignore
//! use mailsift_mime::split_message;
//!
//! let raw = b"Subject: Hello\r\nContent-Type: text/plain\r\n\r\nHi there";
//! let (headers, body) = split_message(raw)?;
//! assert_eq!(headers.get("subject"), Some("Hello"));
//! assert_eq!(body, b"Hi there");
//! ```
//!
//! ### Walking a Multipart Body
//!
//! ```ignore
//! use mailsift_mime::Multipart;
//!
//! for part in Multipart::new(body, "boundary42")? {
//!     let part = part?;
//!     println!("{} ({} bytes)", part.content_type()?, part.decode_body()?.len());
//! }
//! ```
//!
//! ### Decoding Header Words
//!
//! ```ignore
//! use mailsift_mime::decode_sentence;
//!
//! assert_eq!(decode_sentence("=?UTF-8?Q?caf=C3=A9?= menu"), "café menu");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod content_type;
mod error;
mod header;

pub mod charset;
pub mod encoding;
pub mod multipart;

pub use address::Address;
pub use charset::Charset;
pub use content_type::{ContentDisposition, ContentType};
pub use encoding::{TransferEncoding, decode_sentence};
pub use error::{Error, Result};
pub use header::{Headers, split_message};
pub use multipart::{Multipart, Part};
