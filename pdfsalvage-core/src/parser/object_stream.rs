//! PDF Object Stream Parser
//!
//! Handles compressed objects stored in object streams (PDF 1.5+). The
//! cross-reference data says which containers hold which objects; the
//! container itself starts with a header of `objnum offset` pairs followed by
//! the member values, each found at `/First + offset` in the decoded bytes.

use super::lexer::{Lexer, Token};
use super::objects::{PdfObject, PdfStream};
use super::registry::Registry;
use super::{ParseError, ParseResult};
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};

/// Which containers hold which objects, as announced by xref streams
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectStreamGroups {
    /// Container object number to (member object number, index) pairs
    groups: BTreeMap<u32, Vec<(u32, u32)>>,
    /// Member object number to its container
    members: HashMap<u32, u32>,
}

impl ObjectStreamGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `member` lives in `container` at `index`, replacing any
    /// earlier assignment of `member`
    pub fn insert(&mut self, container: u32, member: u32, index: u32) {
        self.remove_member(member);
        self.groups
            .entry(container)
            .or_default()
            .push((member, index));
        self.members.insert(member, container);
    }

    pub fn remove_member(&mut self, member: u32) {
        if let Some(container) = self.members.remove(&member) {
            if let Some(entries) = self.groups.get_mut(&container) {
                entries.retain(|&(number, _)| number != member);
                if entries.is_empty() {
                    self.groups.remove(&container);
                }
            }
        }
    }

    pub fn container_of(&self, member: u32) -> Option<u32> {
        self.members.get(&member).copied()
    }

    /// Container object numbers in ascending order
    pub fn containers(&self) -> impl Iterator<Item = u32> + '_ {
        self.groups.keys().copied()
    }

    pub fn members(&self, container: u32) -> &[(u32, u32)] {
        self.groups
            .get(&container)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of compressed objects
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// A decoded object stream, ready to hand out its members
#[derive(Debug, Clone)]
pub struct ObjectStream {
    data: Bytes,
    /// Object number and absolute offset of each member, in header order
    offsets: Vec<(u32, usize)>,
}

impl ObjectStream {
    /// Parse the member header of an object stream
    pub fn parse(stream: &PdfStream) -> ParseResult<Self> {
        let dict = &stream.dict;
        if dict.get_type() != Some("ObjStm") {
            return Err(ParseError::SyntaxError {
                position: 0,
                message: format!(
                    "Expected /ObjStm object stream, found /Type {:?}",
                    dict.get_type()
                ),
            });
        }

        let first = dict
            .get("First")
            .and_then(PdfObject::as_integer)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| ParseError::SyntaxError {
                position: 0,
                message: "Object stream /First missing or invalid".to_string(),
            })?;

        let data = Bytes::from(match &stream.decoded {
            Some(decoded) => decoded.clone(),
            None => stream.decode()?,
        });

        // `/N` pairs exactly; without a usable `/N`, pairs run up to `/First`
        let count = dict
            .get("N")
            .and_then(PdfObject::as_integer)
            .and_then(|n| usize::try_from(n).ok());
        let mut lexer = Lexer::new(data.clone());
        let mut offsets = Vec::new();
        loop {
            let more = match count {
                Some(count) => offsets.len() < count,
                None => lexer.position() < first,
            };
            if !more {
                break;
            }
            let number = match lexer.next_significant()? {
                Token::Integer(n) if lexer.token_start() < first => u32::try_from(n).ok(),
                _ => None,
            };
            let offset = match lexer.next_significant()? {
                Token::Integer(n) => usize::try_from(n).ok(),
                _ => None,
            };
            match (number, offset) {
                (Some(number), Some(offset)) => {
                    offsets.push((number, first.saturating_add(offset)))
                }
                _ => break,
            }
        }

        Ok(Self { data, offsets })
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Member object numbers in header order
    pub fn object_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.offsets.iter().map(|&(number, _)| number)
    }

    /// Read the member at header position `index`
    pub fn read_object(
        &self,
        index: usize,
        registry: &mut Registry,
    ) -> ParseResult<(u32, PdfObject)> {
        let (number, offset) =
            *self
                .offsets
                .get(index)
                .ok_or_else(|| ParseError::SyntaxError {
                    position: 0,
                    message: format!("No object at index {index} in object stream"),
                })?;
        if offset >= self.data.len() {
            return Err(ParseError::UnexpectedEof { position: offset });
        }
        let mut lexer = Lexer::at(self.data.clone(), offset);
        let object = PdfObject::parse(&mut lexer, registry)?;
        Ok((number, object))
    }
}
