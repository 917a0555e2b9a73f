//! PDF Cross-Reference Table Parser
//!
//! Parses xref tables according to ISO 32000-1 Section 7.5.4 and
//! cross-reference streams (Section 7.5.8), following the `/Prev` chain of
//! incremental updates. Each section is kept separately and merged once the
//! whole chain is known, so newer revisions override older ones.

use super::diagnostics::Diagnostics;
use super::filters::decode_stream;
use super::lexer::{find_bytes, is_whitespace, rfind_bytes, Lexer, Token};
use super::object_stream::ObjectStreamGroups;
use super::objects::{ObjectId, PdfObject};
use super::registry::Registry;
use super::stream;
use super::trailer::PdfTrailer;
use super::xref_stream::{XRefEntry, XRefStream};
use super::{ParseError, ParseOptions, ParseResult};
use bytes::Bytes;
use std::collections::{HashMap, HashSet};

/// Byte offset of each indirect object header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetTable {
    entries: HashMap<ObjectId, usize>,
}

impl OffsetTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ObjectId) -> Option<usize> {
        self.entries.get(&id).copied()
    }

    /// Record `offset` unless `id` already has one. Returns true if recorded.
    pub fn insert_first(&mut self, id: ObjectId, offset: usize) -> bool {
        match self.entries.entry(id) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(offset);
                true
            }
        }
    }

    /// Record `offset`, replacing any earlier one
    pub fn insert(&mut self, id: ObjectId, offset: usize) {
        self.entries.insert(id, offset);
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<usize> {
        self.entries.remove(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, usize)> + '_ {
        self.entries.iter().map(|(&id, &offset)| (id, offset))
    }

    /// Identities in ascending order
    pub fn ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<_> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// Which encoding a section used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefKind {
    /// Classic `xref` table followed by `trailer`
    Table,
    /// Cross-reference stream object
    Stream,
}

/// An object stored inside an object stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedEntry {
    pub number: u32,
    pub container: u32,
    pub index: u32,
}

/// One cross-reference section, i.e. one revision of the document
#[derive(Debug, Clone)]
pub struct XRefSection {
    /// Where the section starts in the file
    pub offset: usize,
    pub kind: XRefKind,
    pub offsets: OffsetTable,
    pub compressed: Vec<CompressedEntry>,
    pub trailer: PdfTrailer,
    /// The classic table only parsed through the line-oriented fallback
    pub recovered: bool,
}

/// Parser for the cross-reference sections of one file
pub struct XRefParser<'a> {
    data: &'a Bytes,
    registry: &'a mut Registry,
    diagnostics: &'a mut Diagnostics,
    options: &'a ParseOptions,
}

fn invalid(position: usize, message: impl Into<String>) -> ParseError {
    ParseError::InvalidXRef {
        position,
        message: message.into(),
    }
}

impl<'a> XRefParser<'a> {
    pub fn new(
        data: &'a Bytes,
        registry: &'a mut Registry,
        diagnostics: &'a mut Diagnostics,
        options: &'a ParseOptions,
    ) -> Self {
        Self {
            data,
            registry,
            diagnostics,
            options,
        }
    }

    /// Parse the section at `startxref` and every older one it links to.
    ///
    /// Sections are returned newest first.
    pub fn parse_chain(&mut self, startxref: usize) -> ParseResult<Vec<XRefSection>> {
        let mut sections = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(startxref);
        let mut tail = None;

        while let Some(offset) = next {
            if !visited.insert(offset) {
                self.diagnostics.warn(
                    Some(offset),
                    format!("xref /Prev chain loops back to offset {offset}"),
                );
                tail = None;
                break;
            }
            if sections.len() >= self.options.max_xref_sections {
                self.diagnostics.warn(
                    Some(offset),
                    format!(
                        "xref /Prev chain longer than {} sections, ignoring the rest",
                        self.options.max_xref_sections
                    ),
                );
                tail = None;
                break;
            }

            let (section, lexer) = self.parse_section(offset)?;
            tracing::debug!(
                offset,
                kind = ?section.kind,
                entries = section.offsets.len(),
                compressed = section.compressed.len(),
                "parsed xref section"
            );
            next = section.trailer.prev;
            tail = Some(lexer);
            sections.push(section);
        }

        if let Some(mut lexer) = tail {
            if lexer.next_significant().ok() != Some(Token::StartXRef) {
                self.diagnostics.warn(
                    Some(lexer.token_start()),
                    "Expected \"startxref\" at end of xref table",
                );
            }
        }
        Ok(sections)
    }

    /// Parse one section. The returned lexer sits just after it.
    pub fn parse_section(&mut self, offset: usize) -> ParseResult<(XRefSection, Lexer)> {
        if offset >= self.data.len() {
            return Err(invalid(
                offset,
                format!("xref offset {offset} is past the end of the file"),
            ));
        }

        let mut lexer = Lexer::at(self.data.clone(), offset);
        match lexer.next_significant()? {
            Token::XRef => self.parse_table(lexer, offset),
            Token::Integer(_) => {
                lexer.unread();
                self.parse_stream(lexer, offset)
            }
            other => Err(invalid(
                lexer.token_start(),
                format!("Expected \"xref\" keyword or xref stream object, found {other:?}"),
            )),
        }
    }

    fn parse_table(&mut self, mut lexer: Lexer, offset: usize) -> ParseResult<(XRefSection, Lexer)> {
        let start = lexer.position();
        let mut offsets = OffsetTable::new();

        let recovered = match read_subsections(&mut lexer, &mut offsets) {
            Ok(()) => false,
            Err(err) if self.options.lenient_xref => {
                tracing::debug!(%err, "strict xref parse failed, rescanning lines");
                offsets = OffsetTable::new();
                let trailer_at = self.rescan_table(start, &mut offsets)?;
                lexer.seek(trailer_at);
                true
            }
            Err(err) => return Err(err),
        };

        match lexer.next_significant()? {
            Token::Trailer => {}
            other => {
                return Err(invalid(
                    lexer.token_start(),
                    format!("Expected \"trailer\", found {other:?}"),
                ))
            }
        }
        if lexer.peek_token()? != Token::DictStart {
            return Err(invalid(lexer.position(), "Expected \"<<\" starting trailer"));
        }
        let dict = match PdfObject::parse(&mut lexer, self.registry)? {
            PdfObject::Dictionary(dict) => dict,
            _ => return Err(invalid(offset, "Trailer is not a dictionary")),
        };

        let section = XRefSection {
            offset,
            kind: XRefKind::Table,
            offsets,
            compressed: Vec::new(),
            trailer: PdfTrailer::from_dict(dict, offset),
            recovered,
        };
        Ok((section, lexer))
    }

    /// Line-oriented fallback for a table the strict pass could not read.
    ///
    /// Returns the offset of the `trailer` keyword.
    fn rescan_table(&mut self, start: usize, offsets: &mut OffsetTable) -> ParseResult<usize> {
        let data = self.data.clone();
        let limit = find_bytes(&data, b"startxref", start).unwrap_or(data.len());
        let end = rfind_bytes(&data[start..limit.max(start)], b"trailer")
            .map(|found| start + found)
            .ok_or_else(|| invalid(start, "Invalid table format: no trailer"))?;

        let mut number: Option<u64> = None;
        let mut line_start = start;
        for line in data[start..end].split(|&b| b == b'\r' || b == b'\n') {
            let position = line_start;
            line_start += line.len() + 1;

            let fields: Vec<&[u8]> = line
                .split(|&b| is_whitespace(b))
                .filter(|field| !field.is_empty())
                .collect();
            match fields.as_slice() {
                [] => {}
                [first, _count] => number = Some(parse_decimal(first, position)?),
                [offset, generation, flag] => {
                    let offset = parse_decimal(offset, position)?;
                    let generation = parse_decimal(generation, position)?;
                    let current = number
                        .ok_or_else(|| invalid(position, "xref entry before subsection header"))?;
                    if offset != 0 && *flag == b"n" {
                        let id = object_id(current, generation, position)?;
                        offsets.insert_first(id, to_offset(offset, position)?);
                    }
                    number = Some(current + 1);
                }
                _ => {
                    self.diagnostics.error(
                        Some(position),
                        format!(
                            "Invalid line in xref table: {:?}",
                            String::from_utf8_lossy(line)
                        ),
                    );
                    return Err(invalid(start, "Invalid table format"));
                }
            }
        }

        self.diagnostics.warn(Some(start), "Badly formatted xref table");
        Ok(end)
    }

    fn parse_stream(&mut self, mut lexer: Lexer, offset: usize) -> ParseResult<(XRefSection, Lexer)> {
        let header = lexer.next_tokens(3)?;
        if !matches!(
            header.as_slice(),
            [Token::Integer(_), Token::Integer(_), Token::Obj]
        ) {
            return Err(invalid(offset, "Expected xref stream"));
        }

        let dict = match PdfObject::parse(&mut lexer, self.registry)? {
            PdfObject::Dictionary(dict) if dict.get_type() == Some("XRef") => dict,
            _ => return Err(invalid(offset, "Expected xref stream")),
        };
        if lexer.next_significant()? != Token::Stream {
            return Err(invalid(
                lexer.token_start(),
                "Expected stream after xref stream dictionary",
            ));
        }

        let start = stream::data_start(self.data, lexer.position(), self.diagnostics);
        let length = dict
            .get("Length")
            .and_then(PdfObject::as_integer)
            .and_then(|length| usize::try_from(length).ok());
        let extracted = stream::extract(self.data, start.offset, length, self.diagnostics);
        let decoded = decode_stream(&extracted.data, &dict)
            .map_err(|err| invalid(offset, format!("Could not decode xref stream: {err}")))?;

        let table = XRefStream::parse(&dict, decoded, offset)?;
        if table.is_truncated() {
            self.diagnostics.warn(
                Some(offset),
                format!(
                    "Xref stream data truncated: {} of {} bytes",
                    table.data.len(),
                    table.expected_len()
                ),
            );
        }

        let mut offsets = OffsetTable::new();
        let mut compressed = Vec::new();
        let mut seen = HashSet::new();
        for (number, entry) in table.to_xref_entries() {
            let Ok(number) = u32::try_from(number) else {
                continue;
            };
            match entry {
                XRefEntry::InUse {
                    offset: at,
                    generation,
                } if at != 0 => {
                    if let (Ok(generation), Ok(at)) = (u16::try_from(generation), usize::try_from(at))
                    {
                        if seen.insert(number) {
                            offsets.insert_first(ObjectId::new(number, generation), at);
                        }
                    }
                }
                XRefEntry::Compressed {
                    stream_object_number,
                    index_within_stream,
                } => {
                    if let (Ok(container), Ok(index)) = (
                        u32::try_from(stream_object_number),
                        u32::try_from(index_within_stream),
                    ) {
                        if seen.insert(number) {
                            compressed.push(CompressedEntry {
                                number,
                                container,
                                index,
                            });
                        }
                    }
                }
                _ => {}
            }
        }

        lexer.seek(extracted.end);
        let section = XRefSection {
            offset,
            kind: XRefKind::Stream,
            offsets,
            compressed,
            trailer: PdfTrailer::from_dict(dict, offset),
            recovered: false,
        };
        Ok((section, lexer))
    }
}

/// Strict pass over classic subsections, stopping in front of `trailer`
fn read_subsections(lexer: &mut Lexer, offsets: &mut OffsetTable) -> ParseResult<()> {
    loop {
        let first = match lexer.next_significant()? {
            Token::Trailer => {
                lexer.unread();
                return Ok(());
            }
            token => token.as_unsigned().ok_or_else(|| {
                invalid(
                    lexer.token_start(),
                    format!("Expected xref subsection start, found {token:?}"),
                )
            })?,
        };
        let count = next_unsigned(lexer)?;

        for number in first..first.saturating_add(count) {
            let offset = next_unsigned(lexer)?;
            let generation = next_unsigned(lexer)?;
            match lexer.next_significant()? {
                Token::Keyword(flag) if flag == "n" => {
                    if offset != 0 {
                        let position = lexer.token_start();
                        let id = object_id(number, generation, position)?;
                        offsets.insert_first(id, to_offset(offset, position)?);
                    }
                }
                Token::Keyword(flag) if flag == "f" => {}
                other => {
                    return Err(invalid(
                        lexer.token_start(),
                        format!("Invalid xref entry flag {other:?}"),
                    ))
                }
            }
        }
    }
}

fn next_unsigned(lexer: &mut Lexer) -> ParseResult<u64> {
    let token = lexer.next_significant()?;
    token.as_unsigned().ok_or_else(|| {
        invalid(
            lexer.token_start(),
            format!("Expected unsigned integer in xref table, found {token:?}"),
        )
    })
}

fn parse_decimal(field: &[u8], position: usize) -> ParseResult<u64> {
    std::str::from_utf8(field)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| {
            invalid(
                position,
                format!("Invalid number {:?} in xref table", String::from_utf8_lossy(field)),
            )
        })
}

fn object_id(number: u64, generation: u64, position: usize) -> ParseResult<ObjectId> {
    match (u32::try_from(number), u16::try_from(generation)) {
        (Ok(number), Ok(generation)) => Ok(ObjectId::new(number, generation)),
        _ => Err(invalid(
            position,
            format!("Object identity {number} {generation} out of range"),
        )),
    }
}

fn to_offset(offset: u64, position: usize) -> ParseResult<usize> {
    usize::try_from(offset).map_err(|_| invalid(position, format!("Offset {offset} out of range")))
}

/// Merge sections (given newest first) into one offset table and one set of
/// object stream groups.
///
/// Sections are applied oldest first and each one overrides what came before:
/// an in-use entry takes the object out of any container, and a compressed
/// entry drops any recorded generation-0 offset. Free entries carry no
/// information and leave older entries in place.
pub fn merge(sections: &[XRefSection]) -> (OffsetTable, ObjectStreamGroups) {
    let mut offsets = OffsetTable::new();
    let mut groups = ObjectStreamGroups::new();

    for section in sections.iter().rev() {
        for (id, offset) in section.offsets.iter() {
            offsets.insert(id, offset);
            groups.remove_member(id.number);
        }
        for entry in &section.compressed {
            offsets.remove(ObjectId::new(entry.number, 0));
            groups.insert(entry.container, entry.number, entry.index);
        }
    }

    (offsets, groups)
}
