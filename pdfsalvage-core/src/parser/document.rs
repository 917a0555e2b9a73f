//! Loaded PDF document
//!
//! [`PdfDocument`] is what a load produces: the file version, the top-level
//! document dictionary (Root, Info and ID), the flattened page list and the
//! reader that keeps resolving objects on demand.
//!
//! # Example
//!
//! ```rust,no_run
//! use pdfsalvage::parser::{ParseOptions, PdfDocument};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut document = PdfDocument::open("damaged.pdf", ParseOptions::default())?;
//!
//! println!("PDF {}", document.version());
//! for page in document.pages() {
//!     println!("{:?} {}x{}", page.id, page.width(), page.height());
//! }
//!
//! document.force_all()?;
//! for diagnostic in document.diagnostics().iter() {
//!     println!("{diagnostic}");
//! }
//! # Ok(())
//! # }
//! ```

use super::diagnostics::Diagnostics;
use super::header::PdfVersion;
use super::object_stream::ObjectStreamGroups;
use super::objects::{ObjectId, PdfDictionary, PdfObject};
use super::page_tree::{self, ParsedPage};
use super::reader::PdfReader;
use super::trailer::PdfTrailer;
use super::xref::OffsetTable;
use super::{ParseError, ParseOptions, ParseResult};
use bytes::Bytes;
use std::io::Read;
use std::path::Path;

/// Load a document held in memory.
///
/// With `decompress` set, every object is resolved and every stream decoded
/// before returning.
pub fn load(data: impl Into<Bytes>, decompress: bool) -> ParseResult<PdfDocument> {
    PdfDocument::load(data, ParseOptions::default().with_decompress(decompress))
}

/// Load a document held in memory with explicit options
pub fn load_with_options(data: impl Into<Bytes>, options: ParseOptions) -> ParseResult<PdfDocument> {
    PdfDocument::load(data, options)
}

/// A loaded PDF document
pub struct PdfDocument {
    reader: PdfReader,
    version: PdfVersion,
    /// Root, Info and ID from the merged trailer
    document: PdfDictionary,
    pages: Vec<ParsedPage>,
}

impl PdfDocument {
    /// Parse `data` into a document.
    ///
    /// Fails only on the fatal conditions of [`ParseError`]; everything the
    /// loader repaired is listed in [`diagnostics`](Self::diagnostics).
    pub fn load(data: impl Into<Bytes>, options: ParseOptions) -> ParseResult<Self> {
        let decompress = options.decompress;
        let mut reader = PdfReader::new(data, options)?;

        let header_version = match reader.header().pdf_version() {
            Some(version) => version,
            None => {
                let found = reader.header().version.clone();
                let offset = reader.header().offset;
                reader.diagnostics_mut().warn(
                    Some(offset),
                    format!("Unreadable PDF version {found:?}, assuming 1.0"),
                );
                PdfVersion::new(1, 0)
            }
        };
        let version = match reader.trailer().version() {
            Some(declared) if declared > header_version => {
                tracing::debug!(%declared, header = %header_version, "version raised by trailer");
                declared
            }
            _ => header_version,
        };

        let document = reader.trailer().document_dict();
        let pages = match document.get("Root") {
            Some(root) => {
                let root = root.clone();
                let pages = page_tree::flatten(&mut reader, &root);
                Self::fatal(&mut reader, pages)?
            }
            None => {
                reader
                    .diagnostics_mut()
                    .error(None, "Trailer has no /Root entry, document has no pages");
                Vec::new()
            }
        };

        if decompress {
            let decoded = reader.decompress_all();
            Self::fatal(&mut reader, decoded)?;
        }

        tracing::debug!(
            %version,
            pages = pages.len(),
            resolved = reader.registry().resolved_count(),
            deferred = reader.registry().deferred_count(),
            "loaded document"
        );

        Ok(Self {
            reader,
            version,
            document,
            pages,
        })
    }

    /// Read and load the file at `path`
    pub fn open(path: impl AsRef<Path>, options: ParseOptions) -> ParseResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| {
            tracing::error!(path = %path.display(), "Could not read PDF file");
            ParseError::Unreadable {
                path: path.display().to_string(),
                source,
            }
        })?;
        Self::load(data, options)
    }

    /// Read `source` to the end, then load it
    pub fn from_reader<R: Read>(mut source: R, options: ParseOptions) -> ParseResult<Self> {
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;
        Self::load(data, options)
    }

    fn fatal<T>(reader: &mut PdfReader, result: ParseResult<T>) -> ParseResult<T> {
        result.map_err(|err| {
            reader.diagnostics_mut().error(err.position(), err.to_string());
            err
        })
    }

    /// Effective version: the header's, or the trailer's when that is newer
    pub fn version(&self) -> PdfVersion {
        self.version
    }

    /// Top-level dictionary with Root, Info and ID
    pub fn document_dict(&self) -> &PdfDictionary {
        &self.document
    }

    pub fn root(&self) -> Option<ObjectId> {
        self.document.get("Root").and_then(PdfObject::as_reference)
    }

    pub fn info(&self) -> Option<ObjectId> {
        self.document.get("Info").and_then(PdfObject::as_reference)
    }

    pub fn id(&self) -> Option<&PdfObject> {
        self.document.get("ID")
    }

    pub fn trailer(&self) -> &PdfTrailer {
        self.reader.trailer()
    }

    /// Leaf pages in document order
    pub fn pages(&self) -> &[ParsedPage] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Resolve the indirect object `id`, loading it if needed
    pub fn get_object(&mut self, id: ObjectId) -> ParseResult<&PdfObject> {
        self.reader.resolve(id)
    }

    /// Follow `obj` when it is a reference
    pub fn resolve<'a>(&'a mut self, obj: &'a PdfObject) -> ParseResult<&'a PdfObject> {
        self.reader.resolve_object(obj)
    }

    /// Resolve everything reachable from the objects read so far
    pub fn force_all(&mut self) -> ParseResult<usize> {
        self.reader.force_all()
    }

    /// Resolve everything, then decode every stream
    pub fn decompress_all(&mut self) -> ParseResult<Vec<(ObjectId, ParseError)>> {
        self.reader.decompress_all()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        self.reader.diagnostics()
    }

    /// Identities referenced but not resolved yet
    pub fn deferred_count(&self) -> usize {
        self.reader.registry().deferred_count()
    }

    pub fn resolved_count(&self) -> usize {
        self.reader.registry().resolved_count()
    }

    /// Merged offset table
    pub fn offsets(&self) -> &OffsetTable {
        self.reader.offsets()
    }

    pub fn object_stream_groups(&self) -> &ObjectStreamGroups {
        self.reader.object_streams()
    }

    pub fn reader(&self) -> &PdfReader {
        &self.reader
    }

    pub fn reader_mut(&mut self) -> &mut PdfReader {
        &mut self.reader
    }
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.version)
            .field("document", &self.document)
            .field("pages", &self.pages.len())
            .field("resolved", &self.resolved_count())
            .field("diagnostics", &self.diagnostics().len())
            .finish()
    }
}
