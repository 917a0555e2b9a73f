//! PDF Loader Module
//!
//! This module implements a lenient loader that turns a PDF byte buffer into an
//! in-memory object graph. It locates the cross-reference data (classic tables
//! or cross-reference streams, across the whole incremental-update chain),
//! builds a lazy registry of indirect objects, and flattens the page tree.
//! Known classes of real-world damage are repaired and reported through
//! [`Diagnostics`] rather than failing the load.

pub mod diagnostics;
pub mod document;
pub mod filters;
pub mod header;
pub mod lexer;
pub mod object_stream;
pub mod objects;
pub mod page_tree;
pub mod reader;
pub mod registry;
pub mod stream;
pub mod trailer;
pub mod xref;
pub mod xref_stream;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use self::diagnostics::{Diagnostic, Diagnostics, Severity};
pub use self::document::{load, load_with_options, PdfDocument};
pub use self::header::PdfVersion;
pub use self::lexer::{Lexer, Token};
pub use self::object_stream::ObjectStreamGroups;
pub use self::objects::{
    ObjectId, PdfArray, PdfDictionary, PdfName, PdfObject, PdfStream, PdfString,
};
pub use self::page_tree::ParsedPage;
pub use self::reader::PdfReader;
pub use self::registry::{IndirectObject, Registry};
pub use self::stream::StreamFraming;
pub use self::trailer::PdfTrailer;
pub use self::xref::{OffsetTable, XRefSection};

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// PDF Parser errors
///
/// Every variant is fatal to the load that produced it. Recoverable damage is
/// never reported through this type; see [`Diagnostics`].
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not read PDF file {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Empty PDF file!")]
    EmptyFile,

    #[error("Invalid PDF header: {found:?}")]
    InvalidHeader { found: String },

    #[error("EOF mark not found")]
    MissingEofMarker,

    #[error("Invalid startxref at position {position}: {message}")]
    InvalidStartXref { position: usize, message: String },

    #[error("Syntax error at position {position}: {message}")]
    SyntaxError { position: usize, message: String },

    #[error("Unexpected end of file at position {position}")]
    UnexpectedEof { position: usize },

    #[error("Invalid xref table at position {position}: {message}")]
    InvalidXRef { position: usize, message: String },

    #[error("Invalid object reference: {0} {1} R")]
    InvalidReference(u32, u16),

    #[error("Stream decode error: {0}")]
    StreamDecodeError(String),
}

impl ParseError {
    /// Byte position the error is tied to, when there is one
    pub fn position(&self) -> Option<usize> {
        match self {
            ParseError::InvalidStartXref { position, .. }
            | ParseError::SyntaxError { position, .. }
            | ParseError::UnexpectedEof { position }
            | ParseError::InvalidXRef { position, .. } => Some(*position),
            _ => None,
        }
    }
}

/// Options controlling how forgiving the loader is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Decode every stream once the document is loaded
    pub decompress: bool,
    /// Re-scan a malformed classic xref table line by line
    pub lenient_xref: bool,
    /// Search for an object header when its recorded offset is wrong
    pub relocate_objects: bool,
    /// Upper bound on the number of sections followed through `/Prev`
    pub max_xref_sections: usize,
}

impl ParseOptions {
    /// Recover from every known class of damage (the default)
    pub fn lenient() -> Self {
        Self {
            decompress: false,
            lenient_xref: true,
            relocate_objects: true,
            max_xref_sections: 4096,
        }
    }

    /// Refuse to repair malformed xref tables or misplaced objects
    pub fn strict() -> Self {
        Self {
            decompress: false,
            lenient_xref: false,
            relocate_objects: false,
            max_xref_sections: 4096,
        }
    }

    pub fn with_decompress(mut self, decompress: bool) -> Self {
        self.decompress = decompress;
        self
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::lenient()
    }
}
