//! PDF Lexer
//!
//! Tokenizes PDF syntax according to ISO 32000-1 Section 7.2. The lexer works
//! over a shared in-memory buffer and can be repositioned anywhere in it, which
//! is what the loader needs for random access through the xref table.

use super::{ParseError, ParseResult};
use bytes::Bytes;

/// PDF Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Boolean: true or false
    Boolean(bool),

    /// Integer number
    Integer(i64),

    /// Real number
    Real(f64),

    /// String (literal or hexadecimal)
    String(Vec<u8>),

    /// Name object (e.g., /Type)
    Name(String),

    /// Left square bracket [
    ArrayStart,

    /// Right square bracket ]
    ArrayEnd,

    /// Dictionary start <<
    DictStart,

    /// Dictionary end >>
    DictEnd,

    /// Stream keyword
    Stream,

    /// Endstream keyword
    EndStream,

    /// Obj keyword
    Obj,

    /// Endobj keyword
    EndObj,

    /// Xref keyword
    XRef,

    /// Trailer keyword
    Trailer,

    /// StartXRef keyword
    StartXRef,

    /// The `R` of an indirect reference
    R,

    /// Null object
    Null,

    /// Comment, without the leading '%'
    Comment(String),

    /// Any other bare word (`n` and `f` in xref tables, operators)
    Keyword(String),

    /// End of file
    Eof,
}

impl Token {
    /// Non-negative integer token, as used for object numbers and offsets
    pub fn as_unsigned(&self) -> Option<u64> {
        match self {
            Token::Integer(value) if *value >= 0 => Some(*value as u64),
            _ => None,
        }
    }
}

/// PDF whitespace per Table 1 of ISO 32000-1
pub(crate) fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

pub(crate) fn is_delimiter(ch: u8) -> bool {
    matches!(
        ch,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// PDF Lexer over an in-memory buffer
#[derive(Debug, Clone)]
pub struct Lexer {
    data: Bytes,
    position: usize,
    token_start: usize,
}

impl Lexer {
    /// Create a new lexer positioned at the start of `data`
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self::at(data.into(), 0)
    }

    /// Create a lexer positioned at `position`
    pub fn at(data: Bytes, position: usize) -> Self {
        let position = position.min(data.len());
        Self {
            data,
            position,
            token_start: position,
        }
    }

    /// The whole underlying buffer
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.position
    }

    /// Offset at which the most recently returned token started
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    /// Move to an absolute offset, clamped to the buffer
    pub fn seek(&mut self, position: usize) {
        self.position = position.min(self.data.len());
        self.token_start = self.position;
    }

    /// Step back so the most recent token is read again
    pub fn unread(&mut self) {
        self.position = self.token_start;
    }

    /// Get the next token, including comments
    pub fn next_token(&mut self) -> ParseResult<Token> {
        self.skip_whitespace();
        self.token_start = self.position;

        let ch = match self.peek_char() {
            Some(ch) => ch,
            None => return Ok(Token::Eof),
        };

        match ch {
            b'%' => Ok(self.read_comment()),
            b'/' => self.read_name(),
            b'(' => self.read_literal_string(),
            b'<' => self.read_angle_bracket(),
            b'>' => {
                self.consume_char();
                if self.peek_char() == Some(b'>') {
                    self.consume_char();
                    Ok(Token::DictEnd)
                } else {
                    Err(self.syntax_error("Expected '>' after '>'"))
                }
            }
            b'[' => {
                self.consume_char();
                Ok(Token::ArrayStart)
            }
            b']' => {
                self.consume_char();
                Ok(Token::ArrayEnd)
            }
            b'+' | b'-' | b'0'..=b'9' | b'.' => self.read_number(),
            _ if ch.is_ascii_alphabetic() || ch == b'\'' || ch == b'"' || ch == b'*' => {
                Ok(self.read_keyword())
            }
            _ => Err(self.syntax_error(format!("Unexpected character: {:?}", ch as char))),
        }
    }

    /// Get the next token that is not a comment
    pub fn next_significant(&mut self) -> ParseResult<Token> {
        loop {
            match self.next_token()? {
                Token::Comment(_) => continue,
                token => return Ok(token),
            }
        }
    }

    /// Like [`Lexer::next_significant`], but running out of input is an error
    pub fn next_required(&mut self) -> ParseResult<Token> {
        match self.next_significant()? {
            Token::Eof => Err(ParseError::UnexpectedEof {
                position: self.position,
            }),
            token => Ok(token),
        }
    }

    /// Read `n` significant tokens, stopping early at end of input
    pub fn next_tokens(&mut self, n: usize) -> ParseResult<Vec<Token>> {
        let mut tokens = Vec::with_capacity(n);
        for _ in 0..n {
            let token = self.next_significant()?;
            let eof = token == Token::Eof;
            tokens.push(token);
            if eof {
                break;
            }
        }
        Ok(tokens)
    }

    /// Look at the next significant token without consuming it
    pub fn peek_token(&mut self) -> ParseResult<Token> {
        let saved = (self.position, self.token_start);
        let token = self.next_significant();
        (self.position, self.token_start) = saved;
        token
    }

    fn peek_char(&self) -> Option<u8> {
        self.data.get(self.position).copied()
    }

    fn consume_char(&mut self) -> Option<u8> {
        let ch = self.peek_char();
        if ch.is_some() {
            self.position += 1;
        }
        ch
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek_char() {
            if !is_whitespace(ch) {
                break;
            }
            self.position += 1;
        }
    }

    fn syntax_error(&self, message: impl Into<String>) -> ParseError {
        ParseError::SyntaxError {
            position: self.position,
            message: message.into(),
        }
    }

    /// Read a comment (from % to end of line)
    fn read_comment(&mut self) -> Token {
        self.consume_char(); // consume '%'
        let start = self.position;
        while let Some(ch) = self.peek_char() {
            if ch == b'\n' || ch == b'\r' {
                break;
            }
            self.position += 1;
        }
        Token::Comment(String::from_utf8_lossy(&self.data[start..self.position]).into_owned())
    }

    /// Read a name object (e.g., /Type)
    fn read_name(&mut self) -> ParseResult<Token> {
        self.consume_char(); // consume '/'
        let mut name = String::new();

        while let Some(ch) = self.peek_char() {
            if is_whitespace(ch) || is_delimiter(ch) {
                break;
            }
            self.consume_char();

            // Hex codes in names (e.g., /A#20B means /A B)
            if ch == b'#' {
                let digits = (self.consume_char(), self.consume_char());
                let value = match digits {
                    (Some(high), Some(low)) => hex_value(high)
                        .zip(hex_value(low))
                        .map(|(high, low)| (high << 4) | low),
                    _ => None,
                };
                match value {
                    Some(value) => name.push(value as char),
                    None => return Err(self.syntax_error("Invalid hex code in name")),
                }
            } else {
                name.push(ch as char);
            }
        }

        Ok(Token::Name(name))
    }

    /// Read a literal string (parentheses)
    fn read_literal_string(&mut self) -> ParseResult<Token> {
        self.consume_char(); // consume '('
        let mut string = Vec::new();
        let mut paren_depth = 1;
        let mut escape = false;

        while paren_depth > 0 {
            let ch = self
                .consume_char()
                .ok_or_else(|| self.syntax_error("Unterminated string"))?;

            if escape {
                match ch {
                    b'n' => string.push(b'\n'),
                    b'r' => string.push(b'\r'),
                    b't' => string.push(b'\t'),
                    b'b' => string.push(b'\x08'),
                    b'f' => string.push(b'\x0C'),
                    b'0'..=b'7' => {
                        let mut value = u32::from(ch - b'0');
                        for _ in 0..2 {
                            match self.peek_char() {
                                Some(next @ b'0'..=b'7') => {
                                    self.consume_char();
                                    value = value * 8 + u32::from(next - b'0');
                                }
                                _ => break,
                            }
                        }
                        string.push(value as u8);
                    }
                    // Line continuation
                    b'\r' => {
                        if self.peek_char() == Some(b'\n') {
                            self.consume_char();
                        }
                    }
                    b'\n' => {}
                    _ => string.push(ch),
                }
                escape = false;
            } else {
                match ch {
                    b'\\' => escape = true,
                    b'(' => {
                        string.push(ch);
                        paren_depth += 1;
                    }
                    b')' => {
                        paren_depth -= 1;
                        if paren_depth > 0 {
                            string.push(ch);
                        }
                    }
                    _ => string.push(ch),
                }
            }
        }

        Ok(Token::String(string))
    }

    /// Read angle bracket tokens (hex strings or dict markers)
    fn read_angle_bracket(&mut self) -> ParseResult<Token> {
        self.consume_char(); // consume '<'

        if self.peek_char() == Some(b'<') {
            self.consume_char();
            return Ok(Token::DictStart);
        }

        let mut digits = Vec::new();
        loop {
            let ch = self
                .consume_char()
                .ok_or_else(|| self.syntax_error("Unterminated hex string"))?;
            match ch {
                b'>' => break,
                _ if is_whitespace(ch) => {}
                _ => match hex_value(ch) {
                    Some(value) => digits.push(value),
                    None => return Err(self.syntax_error("Invalid character in hex string")),
                },
            }
        }

        // Odd number of digits: the final one is padded with 0
        let bytes = digits
            .chunks(2)
            .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
            .collect();
        Ok(Token::String(bytes))
    }

    /// Read a number (integer or real)
    fn read_number(&mut self) -> ParseResult<Token> {
        let start = self.position;
        let mut has_dot = false;

        if matches!(self.peek_char(), Some(b'+' | b'-')) {
            self.consume_char();
        }

        while let Some(ch) = self.peek_char() {
            match ch {
                b'0'..=b'9' => {
                    self.consume_char();
                }
                b'.' if !has_dot => {
                    self.consume_char();
                    has_dot = true;
                }
                _ => break,
            }
        }

        let text = String::from_utf8_lossy(&self.data[start..self.position]).into_owned();
        if has_dot {
            let value = text
                .parse::<f64>()
                .or_else(|_| match text.as_str() {
                    // "-." and "." are occasionally written for zero
                    "." | "-." | "+." => Ok(0.0),
                    _ => Err(()),
                })
                .map_err(|_| self.syntax_error(format!("Invalid real number: '{text}'")))?;
            Ok(Token::Real(value))
        } else {
            let value = text
                .parse::<i64>()
                .map_err(|_| self.syntax_error(format!("Invalid integer: '{text}'")))?;
            Ok(Token::Integer(value))
        }
    }

    /// Read a bare word and classify it
    fn read_keyword(&mut self) -> Token {
        let start = self.position;
        while let Some(ch) = self.peek_char() {
            if is_whitespace(ch) || is_delimiter(ch) {
                break;
            }
            self.position += 1;
        }

        match &self.data[start..self.position] {
            b"true" => Token::Boolean(true),
            b"false" => Token::Boolean(false),
            b"null" => Token::Null,
            b"R" => Token::R,
            b"obj" => Token::Obj,
            b"endobj" => Token::EndObj,
            b"stream" => Token::Stream,
            b"endstream" => Token::EndStream,
            b"xref" => Token::XRef,
            b"trailer" => Token::Trailer,
            b"startxref" => Token::StartXRef,
            word => Token::Keyword(String::from_utf8_lossy(word).into_owned()),
        }
    }
}

/// Offset of the first `needle` in `haystack` at or after `from`
pub(crate) fn find_bytes(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

/// Offset of the last `needle` in `haystack`
pub(crate) fn rfind_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}

fn hex_value(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        _ => None,
    }
}
