//! Typed interpretation of RFC 5322 header fields.
//!
//! Address fields are parsed from the raw header values so that encoded
//! display names containing commas or quotes survive; the address grammar
//! decodes RFC 2047 words inside display names itself. Every other field is
//! read from the word-decoded header map.

use chrono::{DateTime, FixedOffset};
use mailsift_mime::{Address, Headers};

use crate::error::{Error, Result};

/// Header fields extracted from a message header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HeaderFields {
    pub headers: Headers,
    pub subject: String,
    pub sender: Option<Address>,
    pub from: Vec<Address>,
    pub reply_to: Vec<Address>,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
    pub date: Option<DateTime<FixedOffset>>,
    pub message_id: String,
    pub in_reply_to: Vec<String>,
    pub references: Vec<String>,
    pub resent_from: Vec<Address>,
    pub resent_sender: Option<Address>,
    pub resent_to: Vec<Address>,
    pub resent_cc: Vec<Address>,
    pub resent_bcc: Vec<Address>,
    pub resent_date: DateTime<FixedOffset>,
    pub resent_message_id: String,
    pub content_type: String,
}

impl HeaderFields {
    /// Interprets a raw header block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedAddress`] or [`Error::UnparseableDate`] for
    /// the first field that fails to parse.
    pub fn interpret(raw: &Headers) -> Result<Self> {
        let headers = raw.decode_words();

        let date = match non_empty(headers.get("date")) {
            Some(value) => Some(parse_date_field("Date", value)?),
            None => None,
        };
        let resent_date = match non_empty(headers.get("resent-date")) {
            Some(value) => parse_date_field("Resent-Date", value)?,
            None => DateTime::UNIX_EPOCH.fixed_offset(),
        };

        Ok(Self {
            subject: headers.get_or_empty("subject").to_string(),
            sender: address(raw, "Sender")?,
            from: address_list(raw, "From")?,
            reply_to: address_list(raw, "Reply-To")?,
            to: address_list(raw, "To")?,
            cc: address_list(raw, "Cc")?,
            bcc: address_list(raw, "Bcc")?,
            date,
            message_id: parse_message_id(headers.get_or_empty("message-id")),
            in_reply_to: parse_message_id_list(headers.get_or_empty("in-reply-to")),
            references: parse_message_id_list(headers.get_or_empty("references")),
            resent_from: address_list(raw, "Resent-From")?,
            resent_sender: address(raw, "Resent-Sender")?,
            resent_to: address_list(raw, "Resent-To")?,
            resent_cc: address_list(raw, "Resent-Cc")?,
            resent_bcc: address_list(raw, "Resent-Bcc")?,
            resent_date,
            resent_message_id: parse_message_id(headers.get_or_empty("resent-message-id")),
            content_type: headers.get_or_empty("content-type").to_string(),
            headers,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn malformed_address(field: &str, err: mailsift_mime::Error) -> Error {
    let message = match err {
        mailsift_mime::Error::InvalidAddress(message) => message,
        other => other.to_string(),
    };
    Error::MalformedAddress {
        field: field.to_string(),
        message,
    }
}

fn address_list(raw: &Headers, field: &str) -> Result<Vec<Address>> {
    match non_empty(raw.get(field)) {
        Some(value) => Address::parse_list(value).map_err(|e| malformed_address(field, e)),
        None => Ok(Vec::new()),
    }
}

fn address(raw: &Headers, field: &str) -> Result<Option<Address>> {
    non_empty(raw.get(field))
        .map(|value| Address::parse(value).map_err(|e| malformed_address(field, e)))
        .transpose()
}

fn parse_date_field(field: &str, value: &str) -> Result<DateTime<FixedOffset>> {
    parse_date(value).ok_or_else(|| Error::UnparseableDate {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Parses an RFC 5322 date-time.
///
/// The strict RFC 2822 grammar is tried first. On failure, trailing
/// comments such as `(GMT)` or `(PST)` are stripped and the value is tried
/// again. Single-digit days, missing seconds and obsolete zone names are
/// accepted by both passes.
///
/// Returns `None` if neither pass succeeds.
#[must_use]
pub fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date);
    }

    let relaxed = strip_trailing_comments(value);
    if relaxed.len() == value.len() {
        tracing::debug!(value, "date is not RFC 2822");
        return None;
    }
    DateTime::parse_from_rfc2822(relaxed).ok()
}

fn strip_trailing_comments(mut value: &str) -> &str {
    while value.ends_with(')') {
        let Some(open) = value.rfind('(') else {
            break;
        };
        value = value[..open].trim_end();
    }
    value
}

/// Strips angle brackets and surrounding whitespace from a message id.
#[must_use]
pub fn parse_message_id(value: &str) -> String {
    trim_id(value).to_string()
}

/// Splits a whitespace-separated list of message ids (`In-Reply-To`,
/// `References`), keeping header order and dropping empty tokens.
#[must_use]
pub fn parse_message_id_list(value: &str) -> Vec<String> {
    value
        .split_whitespace()
        .map(trim_id)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

fn trim_id(value: &str) -> &str {
    value.trim_matches(|c: char| c == '<' || c == '>' || c.is_whitespace())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::similar_names)]
mod tests {
    use super::*;

    fn headers(raw: &str) -> Headers {
        Headers::parse(raw.as_bytes()).unwrap().0
    }

    #[test]
    fn test_parse_date_rfc2822() {
        let date = parse_date("Fri, 21 Nov 1997 09:55:06 -0600").unwrap();
        assert_eq!(date.to_rfc2822(), "Fri, 21 Nov 1997 09:55:06 -0600");

        let date = parse_date("Tue, 1 Jul 2003 10:52:37 +0200").unwrap();
        assert_eq!(date.timestamp(), 1_057_049_557);
    }

    #[test]
    fn test_parse_date_trailing_comment() {
        let plain = parse_date("Tue, 1 Jul 2003 10:52:37 +0200").unwrap();
        let commented = parse_date("Tue, 1 Jul 2003 10:52:37 +0200 (GMT)").unwrap();
        assert_eq!(plain, commented);
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date("yesterday").is_none());
        assert!(parse_date("not a date (really)").is_none());
        assert!(parse_date("").is_none());
    }

    #[test]
    fn test_parse_message_id() {
        assert_eq!(parse_message_id("<1234@local.machine.example>"), "1234@local.machine.example");
        assert_eq!(parse_message_id("  <a@b>  "), "a@b");
        assert_eq!(parse_message_id(""), "");
    }

    #[test]
    fn test_parse_message_id_list() {
        assert_eq!(
            parse_message_id_list("<1234@local.machine.example> <3456@example.net>"),
            vec!["1234@local.machine.example", "3456@example.net"]
        );
        assert_eq!(parse_message_id_list("<3456@example.net>"), vec!["3456@example.net"]);
        assert_eq!(parse_message_id_list("<a@b>\t<c@d> <>"), vec!["a@b", "c@d"]);
        assert!(parse_message_id_list("   ").is_empty());
    }

    #[test]
    fn test_interpret_basic_fields() {
        let raw = headers(concat!(
            "From: John Doe <jdoe@machine.example>\n",
            "Sender: Michael Jones <mjones@machine.example>\n",
            "To: Mary Smith <mary@example.net>\n",
            "Subject: Saying Hello\n",
            "Date: Fri, 21 Nov 1997 09:55:06 -0600\n",
            "Message-ID: <1234@local.machine.example>\n",
            "\n"
        ));

        let fields = HeaderFields::interpret(&raw).unwrap();
        assert_eq!(fields.subject, "Saying Hello");
        assert_eq!(fields.from, vec![Address::new("John Doe", "jdoe@machine.example")]);
        assert_eq!(
            fields.sender,
            Some(Address::new("Michael Jones", "mjones@machine.example"))
        );
        assert_eq!(fields.message_id, "1234@local.machine.example");
        assert!(fields.date.is_some());
        assert!(fields.cc.is_empty());
        assert!(fields.resent_sender.is_none());
        assert_eq!(fields.resent_date, DateTime::UNIX_EPOCH.fixed_offset());
        assert_eq!(fields.content_type, "");
    }

    #[test]
    fn test_interpret_missing_date() {
        let fields = HeaderFields::interpret(&headers("Subject: x\n\n")).unwrap();
        assert!(fields.date.is_none());

        let fields = HeaderFields::interpret(&headers("Date:   \n\n")).unwrap();
        assert!(fields.date.is_none());
    }

    #[test]
    fn test_interpret_bad_date() {
        let err = HeaderFields::interpret(&headers("Date: someday soon\n\n")).unwrap_err();
        assert!(matches!(err, Error::UnparseableDate { ref field, .. } if field == "Date"));

        let err = HeaderFields::interpret(&headers("Resent-Date: 99 Foo\n\n")).unwrap_err();
        assert!(matches!(err, Error::UnparseableDate { ref field, .. } if field == "Resent-Date"));
    }

    #[test]
    fn test_interpret_malformed_address() {
        let err = HeaderFields::interpret(&headers("To: not an address\n\n")).unwrap_err();
        assert!(matches!(err, Error::MalformedAddress { ref field, .. } if field == "To"));

        let err =
            HeaderFields::interpret(&headers("Cc: Undisclosed recipients:;\n\n")).unwrap_err();
        assert!(matches!(err, Error::MalformedAddress { ref field, .. } if field == "Cc"));
    }

    #[test]
    fn test_interpret_decodes_subject_and_display_names() {
        let raw = headers(concat!(
            "From: =?UTF-8?Q?Peter_Pahol=C3=ADk?= <peter.paholik@gmail.com>\n",
            "Subject: =?UTF-8?Q?Peter_Pahol=C3=ADk?=\n",
            "\n"
        ));

        let fields = HeaderFields::interpret(&raw).unwrap();
        assert_eq!(fields.subject, "Peter Paholík");
        assert_eq!(fields.from[0].name, "Peter Paholík");
        assert_eq!(fields.headers.get("subject"), Some("Peter Paholík"));
        // The raw map is left untouched.
        assert_eq!(raw.get("subject"), Some("=?UTF-8?Q?Peter_Pahol=C3=ADk?="));
    }

    #[test]
    fn test_interpret_encoded_name_with_comma() {
        let raw = headers("From: =?UTF-8?Q?Doe=2C_John?= <jdoe@example.com>\n\n");
        let fields = HeaderFields::interpret(&raw).unwrap();
        assert_eq!(fields.from, vec![Address::new("Doe, John", "jdoe@example.com")]);
    }
}
