//! # pdfsalvage
//!
//! A lenient PDF loader. It turns a PDF byte buffer into an in-memory object
//! graph even when the file is not well-formed, repairing the kinds of damage
//! real-world files carry and reporting every repair.
//!
//! ## Features
//!
//! - **Cross-reference recovery**: classic tables and cross-reference streams,
//!   the whole incremental-update chain, with a line-by-line fallback for
//!   malformed tables
//! - **Lazy resolution**: indirect objects are parsed on first use and memoized
//! - **Misplaced objects**: an object whose recorded offset is wrong is found
//!   again by searching for its header
//! - **Damaged streams**: wrong or missing `/Length` values are repaired from
//!   the `endstream` position
//! - **Object streams**: compressed objects are unpacked from their containers
//! - **Page tree**: flattened into document order with inherited attributes
//! - **Diagnostics**: every repair is logged through `tracing` and collected
//!   in a list the caller can inspect
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfsalvage::parser::load;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("document.pdf")?;
//! let document = load(bytes, false)?;
//!
//! println!("Version: {}", document.version());
//! println!("Pages: {}", document.page_count());
//! for diagnostic in document.diagnostics().iter() {
//!     eprintln!("{diagnostic}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! Only a handful of conditions abort a load: an unreadable source, a missing
//! header or `%%EOF` marker, an unusable `startxref`, a cross-reference section
//! that cannot be read even leniently, and a dictionary with a non-name key.
//! Those are returned as [`parser::ParseError`]. Everything else is recovered.

pub mod parser;

pub use parser::{
    load, load_with_options, Diagnostic, Diagnostics, ObjectId, ParseError, ParseOptions,
    ParseResult, ParsedPage, PdfArray, PdfDictionary, PdfDocument, PdfName, PdfObject,
    PdfReader, PdfStream, PdfString, PdfVersion, Severity,
};

/// Current version of pdfsalvage
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
