//! Lazy indirect object reader
//!
//! Holds the file buffer together with the merged cross-reference data and
//! resolves indirect objects on demand. Every object is parsed at most once;
//! the result lives in the [`Registry`] and later lookups return it unchanged.

use super::diagnostics::Diagnostics;
use super::filters;
use super::header::{self, PdfHeader};
use super::lexer::{find_bytes, Lexer, Token};
use super::object_stream::{ObjectStream, ObjectStreamGroups};
use super::objects::{ObjectId, PdfDictionary, PdfObject, PdfStream};
use super::registry::Registry;
use super::stream;
use super::trailer::PdfTrailer;
use super::xref::{self, OffsetTable, XRefParser};
use super::{ParseError, ParseOptions, ParseResult};
use bytes::Bytes;
use std::collections::HashSet;

static NULL_OBJECT: PdfObject = PdfObject::Null;

/// File structure found before any object is resolved
struct Structure {
    data: Bytes,
    header: PdfHeader,
    trailer: PdfTrailer,
    section_count: usize,
    offsets: OffsetTable,
    object_streams: ObjectStreamGroups,
}

/// Random-access reader over one PDF buffer
pub struct PdfReader {
    data: Bytes,
    options: ParseOptions,
    header: PdfHeader,
    trailer: PdfTrailer,
    section_count: usize,
    offsets: OffsetTable,
    object_streams: ObjectStreamGroups,
    /// Containers already unpacked, successfully or not
    expanded: HashSet<u32>,
    registry: Registry,
    diagnostics: Diagnostics,
}

impl PdfReader {
    /// Check the file framing and read the whole cross-reference chain.
    ///
    /// Object streams named by the cross-reference data are unpacked right
    /// away; everything else is left for [`resolve`](Self::resolve).
    pub fn new(data: impl Into<Bytes>, options: ParseOptions) -> ParseResult<Self> {
        let mut registry = Registry::new();
        let mut diagnostics = Diagnostics::new();

        let structure =
            match Self::read_structure(data.into(), &options, &mut registry, &mut diagnostics) {
                Ok(structure) => structure,
                Err(err) => {
                    diagnostics.error(err.position(), err.to_string());
                    return Err(err);
                }
            };
        tracing::debug!(
            sections = structure.section_count,
            objects = structure.offsets.len(),
            compressed = structure.object_streams.len(),
            "read cross-reference data"
        );

        let mut reader = Self {
            data: structure.data,
            options,
            header: structure.header,
            trailer: structure.trailer,
            section_count: structure.section_count,
            offsets: structure.offsets,
            object_streams: structure.object_streams,
            expanded: HashSet::new(),
            registry,
            diagnostics,
        };
        reader.expand_object_streams();
        Ok(reader)
    }

    fn read_structure(
        data: Bytes,
        options: &ParseOptions,
        registry: &mut Registry,
        diagnostics: &mut Diagnostics,
    ) -> ParseResult<Structure> {
        let header = PdfHeader::locate(&data, diagnostics)?;
        let end = header::footer_end(&data, diagnostics)?;
        let data = data.slice(..end);
        let startxref = header::find_startxref(&data)?;

        let sections = XRefParser::new(&data, registry, diagnostics, options).parse_chain(startxref)?;
        let section_count = sections.len();
        let (offsets, object_streams) = xref::merge(&sections);
        let trailers: Vec<PdfTrailer> = sections.into_iter().map(|s| s.trailer).collect();
        let trailer = PdfTrailer::merge(&trailers).ok_or_else(|| ParseError::InvalidXRef {
            position: startxref,
            message: "No cross-reference section found".to_string(),
        })?;

        Ok(Structure {
            data,
            header,
            trailer,
            section_count,
            offsets,
            object_streams,
        })
    }

    /// Resolve `id`, loading it from the file the first time.
    ///
    /// Objects that cannot be found resolve to null with a warning.
    pub fn resolve(&mut self, id: ObjectId) -> ParseResult<&PdfObject> {
        if !self.registry.is_resolved(id) {
            self.load_indirect(id)?;
        }
        Ok(self
            .registry
            .get(id)
            .map(|indirect| &indirect.object)
            .unwrap_or(&NULL_OBJECT))
    }

    /// Follow `obj` if it is a reference, otherwise return it as is
    pub fn resolve_object<'a>(&'a mut self, obj: &'a PdfObject) -> ParseResult<&'a PdfObject> {
        match obj {
            PdfObject::Reference(id) => self.resolve(*id),
            _ => Ok(obj),
        }
    }

    fn load_indirect(&mut self, id: ObjectId) -> ParseResult<()> {
        if self.registry.is_loading(id) {
            self.diagnostics.warn(
                None,
                format!("Circular reference to object {id} while it is being read"),
            );
            return Ok(());
        }
        self.registry.get_or_create(id);

        let offset = match self.offsets.get(id) {
            Some(offset) => offset,
            None => {
                if self.load_from_container(id) {
                    return Ok(());
                }
                self.diagnostics
                    .warn(None, format!("Did not find PDF object ({id})"));
                self.registry.store(id, PdfObject::Null);
                return Ok(());
            }
        };

        self.registry.begin(id);
        match self.read_indirect(id, offset) {
            Ok(object) => {
                self.registry.store(id, object);
                Ok(())
            }
            Err(err) => {
                self.registry.release(id);
                self.diagnostics.error(err.position(), err.to_string());
                Err(err)
            }
        }
    }

    /// Unpack the container holding `id` if that has not happened yet
    fn load_from_container(&mut self, id: ObjectId) -> bool {
        if id.generation != 0 {
            return false;
        }
        let Some(container) = self.object_streams.container_of(id.number) else {
            return false;
        };
        if let Err(err) = self.expand_object_stream(container) {
            self.diagnostics.error(
                None,
                format!("Could not read object stream {container}: {err}"),
            );
        }
        self.registry.is_resolved(id)
    }

    fn read_indirect(&mut self, id: ObjectId, offset: usize) -> ParseResult<PdfObject> {
        let mut lexer = Lexer::at(self.data.clone(), offset);
        if !header_matches(&mut lexer, id) {
            let expected = format!("{} {} obj", id.number, id.generation);
            let relocated = if self.options.relocate_objects {
                self.locate_header(&expected)
            } else {
                None
            };
            match relocated {
                Some(position) => {
                    self.diagnostics.warn(
                        Some(position),
                        format!(
                            "Indirect object {expected} found at incorrect offset {position} (expected offset {offset})"
                        ),
                    );
                    lexer.seek(position);
                    lexer.next_tokens(3)?;
                }
                None => {
                    self.diagnostics.warn(
                        Some(offset),
                        format!("Expected indirect object '{expected}'"),
                    );
                    return Ok(PdfObject::Null);
                }
            }
        }

        let object = PdfObject::parse(&mut lexer, &mut self.registry)?;
        match lexer.next_significant()? {
            Token::EndObj => Ok(object),
            Token::Stream => match object {
                PdfObject::Dictionary(dict) => self.read_stream(id, dict, lexer.position()),
                other => {
                    self.diagnostics.error(
                        Some(lexer.token_start()),
                        format!("Expected 'endobj' after object {id}, found stream data"),
                    );
                    Ok(other)
                }
            },
            token => {
                self.diagnostics.warn(
                    Some(lexer.token_start()),
                    format!("Expected 'endobj' or 'stream' after object {id}, found {token:?}"),
                );
                Ok(object)
            }
        }
    }

    /// Line-initial occurrence of `expected`, if there is exactly one
    fn locate_header(&self, expected: &str) -> Option<usize> {
        for eol in [b'\n', b'\r'] {
            let mut needle = vec![eol];
            needle.extend_from_slice(expected.as_bytes());
            if let Some(found) = find_bytes(&self.data, &needle, 0) {
                if find_bytes(&self.data, &needle, found + 1).is_some() {
                    return None;
                }
                return Some(found + 1);
            }
        }
        None
    }

    fn read_stream(
        &mut self,
        id: ObjectId,
        dict: PdfDictionary,
        keyword_end: usize,
    ) -> ParseResult<PdfObject> {
        let start = stream::data_start(&self.data, keyword_end, &mut self.diagnostics);
        let length = self.stream_length(&dict)?;
        let extracted = stream::extract(&self.data, start.offset, length, &mut self.diagnostics);
        if !extracted.framing.is_exact() {
            tracing::debug!(object = %id, framing = ?extracted.framing, "repaired stream framing");
        }
        Ok(PdfObject::Stream(PdfStream::new(dict, extracted.data)))
    }

    fn stream_length(&mut self, dict: &PdfDictionary) -> ParseResult<Option<usize>> {
        let length = match dict.get("Length") {
            Some(PdfObject::Reference(id)) => self.resolve(*id)?.as_integer(),
            Some(other) => other.as_integer(),
            None => None,
        };
        Ok(length.and_then(|length| usize::try_from(length).ok()))
    }

    /// Unpack every container named in the cross-reference data.
    ///
    /// Failures are recorded and do not stop the remaining containers.
    pub fn expand_object_streams(&mut self) -> usize {
        let containers: Vec<u32> = self.object_streams.containers().collect();
        let mut stored = 0;
        for container in containers {
            match self.expand_object_stream(container) {
                Ok(count) => stored += count,
                Err(err) => self.diagnostics.error(
                    None,
                    format!("Could not read object stream {container}: {err}"),
                ),
            }
        }
        stored
    }

    /// Store the members of object stream `container` in the registry.
    ///
    /// Members whose identity the cross-reference data assigns elsewhere are
    /// skipped. Returns the number of objects stored.
    pub fn expand_object_stream(&mut self, container: u32) -> ParseResult<usize> {
        if !self.expanded.insert(container) {
            return Ok(0);
        }
        let id = ObjectId::new(container, 0);
        let position = self.offsets.get(id).unwrap_or(0);
        let parsed = match self.resolve(id)? {
            PdfObject::Stream(stream) => ObjectStream::parse(stream)?,
            other => {
                return Err(ParseError::SyntaxError {
                    position,
                    message: format!("Object stream {id} is not a stream: {other:?}"),
                })
            }
        };

        let wanted: Vec<(usize, ObjectId)> = parsed
            .object_numbers()
            .enumerate()
            .map(|(index, number)| (index, ObjectId::new(number, 0)))
            .filter(|&(_, member)| {
                !self.offsets.contains(member)
                    && self
                        .object_streams
                        .container_of(member.number)
                        .map_or(true, |owner| owner == container)
                    && !self.registry.is_resolved(member)
            })
            .collect();

        let mut stored = 0;
        for (index, member) in wanted {
            let (_, object) = parsed.read_object(index, &mut self.registry)?;
            if !self.registry.is_resolved(member) {
                self.registry.store(member, object);
                stored += 1;
            }
        }
        tracing::debug!(container, stored, "expanded object stream");
        Ok(stored)
    }

    /// Resolve every referenced object, including ones discovered on the way.
    ///
    /// Returns the number of identities resolved.
    pub fn force_all(&mut self) -> ParseResult<usize> {
        let mut attempted = HashSet::new();
        loop {
            let pending: Vec<ObjectId> = self
                .registry
                .deferred()
                .into_iter()
                .filter(|id| !attempted.contains(id))
                .collect();
            if pending.is_empty() {
                break;
            }
            for id in pending {
                attempted.insert(id);
                self.resolve(id)?;
            }
        }
        Ok(attempted.len())
    }

    /// [`force_all`](Self::force_all), then decode every stream.
    ///
    /// Streams that fail to decode keep their raw bytes; the failures are
    /// recorded and returned.
    pub fn decompress_all(&mut self) -> ParseResult<Vec<(ObjectId, ParseError)>> {
        self.force_all()?;
        let failures = filters::decode_all(self.registry.resolved_mut());
        for (id, err) in &failures {
            self.diagnostics
                .error(None, format!("Could not decode stream {id}: {err}"));
        }
        Ok(failures)
    }

    /// Resolved value of `id`, without loading anything
    pub fn get(&self, id: ObjectId) -> Option<&PdfObject> {
        self.registry.get(id).map(|indirect| &indirect.object)
    }

    pub fn header(&self) -> &PdfHeader {
        &self.header
    }

    /// Trailer merged across all revisions
    pub fn trailer(&self) -> &PdfTrailer {
        &self.trailer
    }

    /// Number of cross-reference sections in the update chain
    pub fn section_count(&self) -> usize {
        self.section_count
    }

    pub fn offsets(&self) -> &OffsetTable {
        &self.offsets
    }

    pub fn object_streams(&self) -> &ObjectStreamGroups {
        &self.object_streams
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }
}

/// Consume `num gen obj` and check it names `id`
fn header_matches(lexer: &mut Lexer, id: ObjectId) -> bool {
    match lexer.next_tokens(3) {
        Ok(tokens) => matches!(
            tokens.as_slice(),
            [Token::Integer(number), Token::Integer(generation), Token::Obj]
                if ObjectId::from_integers(*number, *generation) == Some(id)
        ),
        Err(_) => false,
    }
}
