//! Character scanner shared by the concise and XML parsers.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected character {found:?} at offset {offset}")]
    UnexpectedChar { found: char, offset: usize },
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("unclosed string starting at offset {0}")]
    UnclosedString(usize),
    #[error("invalid escape sequence at offset {0}")]
    InvalidEscape(usize),
    #[error("invalid number at offset {0}")]
    InvalidNumber(usize),
    #[error("{message} at offset {offset}")]
    Invalid { message: String, offset: usize },
}

pub(crate) struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn peek_str(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Consumes `s` if the input continues with it.
    pub fn eat(&mut self, s: &str) -> bool {
        if self.peek_str(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.advance();
                Ok(())
            }
            _ => Err(self.unexpected()),
        }
    }

    pub fn expect_str(&mut self, expected: &str) -> Result<(), ParseError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    pub fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    /// Consumes characters while `pred` holds and returns them.
    pub fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if pred(c)) {
            self.advance();
        }
        &self.input[start..self.pos]
    }

    /// Consumes everything up to (not including) `delim`.
    pub fn take_until(&mut self, delim: &str) -> Result<&'a str, ParseError> {
        let start = self.pos;
        match self.rest().find(delim) {
            Some(i) => {
                self.pos += i;
                Ok(&self.input[start..self.pos])
            }
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    pub fn parse_usize(&mut self) -> Result<usize, ParseError> {
        let start = self.pos;
        let digits = self.take_while(|c| c.is_ascii_digit());
        digits.parse().map_err(|_| ParseError::InvalidNumber(start))
    }

    /// Parses a double-quoted literal with `\\` and `\"` escapes, or the bare
    /// word `null`.
    pub fn parse_nullable_literal(&mut self) -> Result<Option<String>, ParseError> {
        if self.eat("null") {
            return Ok(None);
        }
        self.parse_literal().map(Some)
    }

    pub fn parse_literal(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        self.expect('"')?;
        let mut result = String::new();
        loop {
            match self.advance() {
                None => return Err(ParseError::UnclosedString(start)),
                Some('"') => return Ok(result),
                Some('\\') => match self.advance() {
                    Some(c @ ('\\' | '"')) => result.push(c),
                    Some(_) => return Err(ParseError::InvalidEscape(self.pos - 1)),
                    None => return Err(ParseError::UnclosedString(start)),
                },
                Some(c) => result.push(c),
            }
        }
    }

    pub fn unexpected(&self) -> ParseError {
        match self.peek() {
            Some(found) => ParseError::UnexpectedChar {
                found,
                offset: self.pos,
            },
            None => ParseError::UnexpectedEnd,
        }
    }

    pub fn invalid(&self, message: impl Into<String>) -> ParseError {
        ParseError::Invalid {
            message: message.into(),
            offset: self.pos,
        }
    }
}
