//! PDF Object Model and Structural Reader
//!
//! Value types produced by the loader (ISO 32000-1 Section 7.3) and the
//! recursive-descent reader that builds them from tokens. Indirect references
//! are never resolved here: every `num gen R` pattern becomes a
//! [`PdfObject::Reference`] registered with the [`Registry`], and holders
//! resolve it later through the document.

use super::lexer::{Lexer, Token};
use super::registry::Registry;
use super::{ParseError, ParseResult};
use indexmap::IndexMap;
use std::borrow::Borrow;
use std::fmt;

/// Maximum nesting of arrays and dictionaries inside one value
pub const MAX_NESTING_DEPTH: usize = 512;

/// Identity of an indirect object: (object number, generation number)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    pub number: u32,
    pub generation: u16,
}

impl ObjectId {
    pub const fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }

    /// Build an identity from two integer tokens, rejecting out-of-range values
    pub fn from_integers(number: i64, generation: i64) -> Option<Self> {
        let number = u32::try_from(number).ok()?;
        let generation = u16::try_from(generation).ok()?;
        Some(Self::new(number, generation))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.number, self.generation)
    }
}

impl From<(u32, u16)> for ObjectId {
    fn from((number, generation): (u32, u16)) -> Self {
        Self::new(number, generation)
    }
}

/// PDF Name object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PdfName(pub String);

/// PDF String object
#[derive(Debug, Clone, PartialEq)]
pub struct PdfString(pub Vec<u8>);

/// PDF Array object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfArray(pub Vec<PdfObject>);

/// PDF Dictionary object. Keys keep the order they were read in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfDictionary(pub IndexMap<PdfName, PdfObject>);

/// A dictionary followed by stream data.
///
/// The raw bytes and the decoded bytes live beside the dictionary, never in it,
/// so iterating the dictionary only ever yields names and values.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfStream {
    pub dict: PdfDictionary,
    pub data: Vec<u8>,
    pub decoded: Option<Vec<u8>>,
}

impl PdfStream {
    pub fn new(dict: PdfDictionary, data: Vec<u8>) -> Self {
        Self {
            dict,
            data,
            decoded: None,
        }
    }

    /// Decode the raw bytes through the stream's filter chain
    pub fn decode(&self) -> ParseResult<Vec<u8>> {
        super::filters::decode_stream(&self.data, &self.dict)
    }

    /// Get the raw (possibly compressed) stream data
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }

    /// Decoded bytes if the stream has been decompressed, raw bytes otherwise
    pub fn content(&self) -> &[u8] {
        self.decoded.as_deref().unwrap_or(&self.data)
    }
}

/// PDF Object types
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PdfObject {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(PdfString),
    Name(PdfName),
    Array(PdfArray),
    Dictionary(PdfDictionary),
    Stream(PdfStream),
    Reference(ObjectId),
}

impl PdfObject {
    /// Read one value, registering any indirect references it contains
    pub fn parse(lexer: &mut Lexer, registry: &mut Registry) -> ParseResult<Self> {
        let token = lexer.next_required()?;
        let value = Self::parse_from_token(lexer, registry, token, 0)?;

        // A bare `num gen R` in value position
        if let PdfObject::Integer(number) = value {
            if let Some(id) = Self::peek_reference_tail(lexer, number)? {
                return Ok(registry.get_or_create(id));
            }
        }
        Ok(value)
    }

    fn parse_from_token(
        lexer: &mut Lexer,
        registry: &mut Registry,
        token: Token,
        depth: usize,
    ) -> ParseResult<Self> {
        match token {
            Token::Null => Ok(PdfObject::Null),
            Token::Boolean(b) => Ok(PdfObject::Boolean(b)),
            Token::Integer(i) => Ok(PdfObject::Integer(i)),
            Token::Real(r) => Ok(PdfObject::Real(r)),
            Token::String(s) => Ok(PdfObject::String(PdfString(s))),
            Token::Name(n) => Ok(PdfObject::Name(PdfName(n))),
            Token::ArrayStart => Self::parse_array(lexer, registry, depth + 1),
            Token::DictStart => {
                PdfDictionary::parse_inner(lexer, registry, depth + 1).map(PdfObject::Dictionary)
            }
            // Empty object: leave `endobj` for the caller
            Token::EndObj => {
                lexer.unread();
                Ok(PdfObject::Null)
            }
            Token::Eof => Err(ParseError::UnexpectedEof {
                position: lexer.position(),
            }),
            other => Err(ParseError::SyntaxError {
                position: lexer.token_start(),
                message: format!("Unexpected token {other:?}"),
            }),
        }
    }

    /// If the next two tokens are `gen R`, consume them and return the identity
    fn peek_reference_tail(lexer: &mut Lexer, number: i64) -> ParseResult<Option<ObjectId>> {
        if number < 0 {
            return Ok(None);
        }
        let rewind = lexer.position();
        let tokens = match lexer.next_tokens(2) {
            Ok(tokens) => tokens,
            Err(_) => {
                lexer.seek(rewind);
                return Ok(None);
            }
        };
        if let [Token::Integer(generation), Token::R] = tokens.as_slice() {
            return ObjectId::from_integers(number, *generation)
                .map(Some)
                .ok_or(ParseError::InvalidReference(number as u32, *generation as u16));
        }
        lexer.seek(rewind);
        Ok(None)
    }

    fn parse_array(lexer: &mut Lexer, registry: &mut Registry, depth: usize) -> ParseResult<Self> {
        if depth > MAX_NESTING_DEPTH {
            return Err(ParseError::SyntaxError {
                position: lexer.position(),
                message: "Arrays nested too deeply".to_string(),
            });
        }

        let mut elements = Vec::new();
        loop {
            match lexer.next_required()? {
                Token::ArrayEnd => break,
                Token::R => {
                    let generation = elements.pop();
                    let number = elements.pop();
                    let id = match (number, generation) {
                        (Some(PdfObject::Integer(number)), Some(PdfObject::Integer(generation))) => {
                            ObjectId::from_integers(number, generation)
                        }
                        _ => None,
                    };
                    let id = id.ok_or_else(|| ParseError::SyntaxError {
                        position: lexer.token_start(),
                        message: "'R' not preceded by two object numbers".to_string(),
                    })?;
                    elements.push(registry.get_or_create(id));
                }
                token => elements.push(Self::parse_from_token(lexer, registry, token, depth)?),
            }
        }

        Ok(PdfObject::Array(PdfArray(elements)))
    }

    /// Check if this object is null
    pub fn is_null(&self) -> bool {
        matches!(self, PdfObject::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PdfObject::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PdfObject::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value, accepting integers as reals
    pub fn as_real(&self) -> Option<f64> {
        match self {
            PdfObject::Real(r) => Some(*r),
            PdfObject::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&PdfString> {
        match self {
            PdfObject::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&PdfName> {
        match self {
            PdfObject::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&PdfArray> {
        match self {
            PdfObject::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Dictionary view, including the dictionary of a stream
    pub fn as_dict(&self) -> Option<&PdfDictionary> {
        match self {
            PdfObject::Dictionary(d) => Some(d),
            PdfObject::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&PdfStream> {
        match self {
            PdfObject::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            PdfObject::Reference(id) => Some(*id),
            _ => None,
        }
    }
}

impl PdfDictionary {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    fn parse_inner(lexer: &mut Lexer, registry: &mut Registry, depth: usize) -> ParseResult<Self> {
        if depth > MAX_NESTING_DEPTH {
            return Err(ParseError::SyntaxError {
                position: lexer.position(),
                message: "Dictionaries nested too deeply".to_string(),
            });
        }

        let mut dict = IndexMap::new();
        loop {
            let key = match lexer.next_required()? {
                Token::DictEnd => break,
                Token::Name(key) => key,
                _ => {
                    return Err(ParseError::SyntaxError {
                        position: lexer.token_start(),
                        message: "Expected PDF /name object".to_string(),
                    })
                }
            };

            let token = lexer.next_required()?;
            let mut value = PdfObject::parse_from_token(lexer, registry, token, depth)?;

            // Two integers in value position must be a reference
            if let PdfObject::Integer(number) = value {
                if number >= 0 && matches!(lexer.peek_token(), Ok(Token::Integer(_))) {
                    let tokens = lexer.next_tokens(2)?;
                    let id = match tokens.as_slice() {
                        [Token::Integer(generation), Token::R] => {
                            ObjectId::from_integers(number, *generation)
                        }
                        _ => None,
                    };
                    let id = id.ok_or_else(|| ParseError::SyntaxError {
                        position: lexer.token_start(),
                        message: "Expected 'R' following two integers".to_string(),
                    })?;
                    value = registry.get_or_create(id);
                }
            }

            dict.insert(PdfName(key), value);
        }

        Ok(PdfDictionary(dict))
    }

    pub fn get(&self, key: &str) -> Option<&PdfObject> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PdfObject) {
        self.0.insert(PdfName(key.into()), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<PdfObject> {
        self.0.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PdfName, &PdfObject)> {
        self.0.iter()
    }

    /// Value of `/Type`, if it is a name
    pub fn get_type(&self) -> Option<&str> {
        self.get("Type")
            .and_then(|obj| obj.as_name())
            .map(|n| n.as_str())
    }
}

impl PdfArray {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PdfObject> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PdfObject> {
        self.0.iter()
    }
}

impl PdfString {
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    pub fn as_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl PdfName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PdfName {
    fn borrow(&self) -> &str {
        &self.0
    }
}
