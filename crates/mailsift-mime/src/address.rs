//! Email address parsing (RFC 5322 §3.4).
//!
//! Supports `name-addr` (`Display Name <local@domain>`), bare `addr-spec`,
//! quoted strings with backslash escapes, nested comments, domain literals
//! and RFC 2047 encoded words in display names. Group syntax
//! (`Friends: a@b.test, c@d.test;`) is rejected.

use std::fmt;

use crate::encoding::decode_rfc2047;
use crate::error::{Error, Result};

/// A parsed email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Address {
    /// Display name, decoded (may be empty).
    pub name: String,
    /// Mailbox in `local@domain` form.
    pub mailbox: String,
}

impl Address {
    /// Creates an address from a display name and mailbox.
    #[must_use]
    pub fn new(name: impl Into<String>, mailbox: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mailbox: mailbox.into(),
        }
    }

    /// Parses exactly one address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the input is not a single valid
    /// address.
    pub fn parse(input: &str) -> Result<Self> {
        let mut parser = AddressParser::new(input);
        let address = parser.address()?;
        parser.skip_cfws()?;
        if !parser.is_eof() {
            return Err(parser.error("expected a single address"));
        }
        Ok(address)
    }

    /// Parses a comma-separated address list.
    ///
    /// Empty list elements (`a@b.test,,c@d.test`) are skipped, as the
    /// obsolete list syntax allows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if any element is malformed.
    pub fn parse_list(input: &str) -> Result<Vec<Self>> {
        let mut parser = AddressParser::new(input);
        let mut addresses = Vec::new();

        loop {
            parser.skip_cfws()?;
            match parser.peek() {
                None => break,
                Some(',') => {
                    parser.advance();
                    continue;
                }
                Some(_) => {}
            }

            addresses.push(parser.address()?);
            parser.skip_cfws()?;
            match parser.advance() {
                None => break,
                Some(',') => {}
                Some(c) => return Err(parser.error(&format!("expected ',' but found {c:?}"))),
            }
        }

        if addresses.is_empty() {
            return Err(parser.error("empty address list"));
        }
        Ok(addresses)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.mailbox)
        } else {
            write!(f, "\"{}\" <{}>", self.name.replace('\\', "\\\\").replace('"', "\\\""), self.mailbox)
        }
    }
}

/// One word of a display-name phrase.
enum Word {
    Atom(String),
    Quoted(String),
}

/// Cursor over the characters of a header value.
struct AddressParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> AddressParser<'a> {
    const fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        match self.advance() {
            Some(ch) if ch == expected => Ok(()),
            Some(ch) => Err(self.error(&format!("expected {expected:?} but found {ch:?}"))),
            None => Err(self.error(&format!("expected {expected:?} at end of input"))),
        }
    }

    fn error(&self, message: &str) -> Error {
        Error::InvalidAddress(format!("{message} at position {} in {:?}", self.pos, self.input))
    }

    /// Skips folding whitespace and (nested) comments.
    fn skip_cfws(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('(') => self.skip_comment()?,
                _ => return Ok(()),
            }
        }
    }

    fn skip_comment(&mut self) -> Result<()> {
        self.expect('(')?;
        let mut depth = 1;
        while depth > 0 {
            match self.advance() {
                Some('\\') => {
                    self.advance();
                }
                Some('(') => depth += 1,
                Some(')') => depth -= 1,
                Some(_) => {}
                None => return Err(self.error("unterminated comment")),
            }
        }
        Ok(())
    }

    /// `address = name-addr / addr-spec`
    fn address(&mut self) -> Result<Address> {
        self.skip_cfws()?;
        let start = self.pos;

        // A bare addr-spec, as long as nothing but a separator follows it.
        if let Ok(mailbox) = self.addr_spec() {
            let after = self.pos;
            self.skip_cfws()?;
            if matches!(self.peek(), None | Some(',')) {
                return Ok(Address::new(String::new(), mailbox));
            }
            self.pos = after;
        }
        self.pos = start;

        let name = if self.peek() == Some('<') {
            String::new()
        } else {
            self.display_name()?
        };

        self.skip_cfws()?;
        if self.peek() == Some(':') {
            return Err(self.error("group syntax is not supported"));
        }
        let mailbox = self.angle_addr()?;
        Ok(Address::new(name, mailbox))
    }

    /// `angle-addr = [CFWS] "<" addr-spec ">" [CFWS]`
    fn angle_addr(&mut self) -> Result<String> {
        self.expect('<')?;
        self.skip_cfws()?;
        let mailbox = self.addr_spec()?;
        self.skip_cfws()?;
        self.expect('>')?;
        Ok(mailbox)
    }

    /// `addr-spec = local-part "@" domain`
    fn addr_spec(&mut self) -> Result<String> {
        let local = if self.peek() == Some('"') {
            let quoted = self.quoted_string()?;
            if quoted.chars().all(is_atext) && !quoted.is_empty() {
                quoted
            } else {
                format!("\"{}\"", quoted.replace('\\', "\\\\").replace('"', "\\\""))
            }
        } else {
            self.dot_atom()?
        };

        self.skip_cfws()?;
        self.expect('@')?;
        self.skip_cfws()?;

        let domain = if self.peek() == Some('[') {
            self.domain_literal()?
        } else {
            self.dot_atom()?
        };

        Ok(format!("{local}@{domain}"))
    }

    /// `dot-atom-text = 1*atext *("." 1*atext)`
    fn dot_atom(&mut self) -> Result<String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_atext(c) || c == '.' {
                self.advance();
            } else {
                break;
            }
        }
        let atom = &self.input[start..self.pos];
        if atom.is_empty() {
            return Err(self.error("expected an atom"));
        }
        if atom.starts_with('.') || atom.ends_with('.') || atom.contains("..") {
            return Err(self.error(&format!("misplaced dot in {atom:?}")));
        }
        Ok(atom.to_string())
    }

    fn domain_literal(&mut self) -> Result<String> {
        let start = self.pos;
        self.expect('[')?;
        loop {
            match self.advance() {
                Some(']') => break,
                Some('[' | '\\') | None => return Err(self.error("invalid domain literal")),
                Some(_) => {}
            }
        }
        Ok(self.input[start..self.pos].to_string())
    }

    /// Returns the unescaped content of a quoted string.
    fn quoted_string(&mut self) -> Result<String> {
        self.expect('"')?;
        let mut content = String::new();
        loop {
            match self.advance() {
                Some('"') => return Ok(content),
                Some('\\') => match self.advance() {
                    Some(c) => content.push(c),
                    None => return Err(self.error("unterminated quoted string")),
                },
                Some(c) => content.push(c),
                None => return Err(self.error("unterminated quoted string")),
            }
        }
    }

    /// `display-name = phrase`, with encoded words decoded.
    ///
    /// Words are joined with one space, except between two adjacent encoded
    /// words, which are joined directly as RFC 2047 §6.2 requires.
    fn display_name(&mut self) -> Result<String> {
        let mut words = Vec::new();
        loop {
            self.skip_cfws()?;
            match self.peek() {
                Some('"') => words.push(Word::Quoted(self.quoted_string()?)),
                Some(c) if is_atext(c) || c == '.' => {
                    let start = self.pos;
                    while let Some(c) = self.peek() {
                        if is_atext(c) || c == '.' {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                    words.push(Word::Atom(self.input[start..self.pos].to_string()));
                }
                _ => break,
            }
        }

        if words.is_empty() {
            return Err(self.error("expected a display name or '<'"));
        }

        let mut name = String::new();
        let mut previous_encoded = false;
        for word in words {
            let (text, encoded) = match word {
                Word::Atom(atom) => match decode_rfc2047(&atom) {
                    Ok(decoded) => (decoded, true),
                    Err(_) => (atom, false),
                },
                Word::Quoted(text) => (text, false),
            };
            if !name.is_empty() && !(encoded && previous_encoded) {
                name.push(' ');
            }
            name.push_str(&text);
            previous_encoded = encoded;
        }
        Ok(name)
    }
}

/// RFC 5322 `atext`, extended to non-ASCII characters (RFC 6532).
fn is_atext(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-/=?^_`{|}~".contains(c) || !c.is_ascii()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_addr() {
        let addr = Address::parse("\"Joe Q. Public\" <john.q.public@example.com>").unwrap();
        assert_eq!(addr, Address::new("Joe Q. Public", "john.q.public@example.com"));
    }

    #[test]
    fn test_parse_bare_and_angle_only() {
        assert_eq!(
            Address::parse("jdoe@example.org").unwrap(),
            Address::new("", "jdoe@example.org")
        );
        assert_eq!(
            Address::parse("<boss@nil.test>").unwrap(),
            Address::new("", "boss@nil.test")
        );
    }

    #[test]
    fn test_parse_list_rfc5322_example() {
        let list = Address::parse_list("Mary Smith <mary@x.test>, jdoe@example.org, Who? <one@y.test>").unwrap();
        assert_eq!(
            list,
            vec![
                Address::new("Mary Smith", "mary@x.test"),
                Address::new("", "jdoe@example.org"),
                Address::new("Who?", "one@y.test"),
            ]
        );
    }

    #[test]
    fn test_parse_list_quoted_specials() {
        let list = Address::parse_list(r#"<boss@nil.test>, "Giant; \"Big\" Box" <sysservices@example.net>"#).unwrap();
        assert_eq!(list[1], Address::new(r#"Giant; "Big" Box"#, "sysservices@example.net"));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_parse_comments_and_folding() {
        let addr = Address::parse("Pete(A nice \\) chap) <pete(his account)@silly.test(his host)>").unwrap();
        assert_eq!(addr, Address::new("Pete", "pete@silly.test"));
    }

    #[test]
    fn test_parse_encoded_display_name() {
        let addr = Address::parse("=?UTF-8?Q?Peter_Pahol=C3=ADk?= <peter.paholik@gmail.com>").unwrap();
        assert_eq!(addr.name, "Peter Paholík");

        let addr = Address::parse("=?UTF-8?Q?Pe?= =?UTF-8?Q?ter?= Smith <p@example.com>").unwrap();
        assert_eq!(addr.name, "Peter Smith");
    }

    #[test]
    fn test_parse_domain_literal_and_quoted_local() {
        assert_eq!(Address::parse("user@[192.0.2.1]").unwrap().mailbox, "user@[192.0.2.1]");
        assert_eq!(
            Address::parse("\"john doe\"@example.com").unwrap().mailbox,
            "\"john doe\"@example.com"
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Address::parse("no-at-sign").is_err());
        assert!(Address::parse("Name <missing-close@example.com").is_err());
        assert!(Address::parse("a..b@example.com").is_err());
        assert!(Address::parse("a@b.test c@d.test").is_err());
        assert!(Address::parse_list("a@b.test; c@d.test").is_err());
        assert!(Address::parse_list("   ").is_err());
    }

    #[test]
    fn test_parse_rejects_groups() {
        let err = Address::parse_list("A Group:Ed Jones <c@a.test>,joe@where.test;").unwrap_err();
        assert!(err.to_string().contains("group"));
    }

    #[test]
    fn test_parse_list_skips_empty_elements() {
        let list = Address::parse_list("a@b.test,, c@d.test,").unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(Address::new("", "a@b.test").to_string(), "a@b.test");
        assert_eq!(Address::new("A \"B\"", "a@b.test").to_string(), r#""A \"B\"" <a@b.test>"#);
    }
}
