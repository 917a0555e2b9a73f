//! PDF Trailer Parser
//!
//! Parses PDF trailer according to ISO 32000-1 Section 7.5.5

use super::header::PdfVersion;
use super::objects::{ObjectId, PdfDictionary, PdfObject};

/// PDF Trailer information
#[derive(Debug, Clone, PartialEq)]
pub struct PdfTrailer {
    /// The trailer dictionary
    pub dict: PdfDictionary,
    /// Byte offset of previous xref section (if any)
    pub prev: Option<usize>,
    /// Byte offset of this xref section
    pub xref_offset: usize,
}

impl PdfTrailer {
    /// Wrap a trailer dictionary read at `xref_offset`
    pub fn from_dict(dict: PdfDictionary, xref_offset: usize) -> Self {
        let prev = dict
            .get("Prev")
            .and_then(PdfObject::as_integer)
            .and_then(|offset| usize::try_from(offset).ok());

        PdfTrailer {
            dict,
            prev,
            xref_offset,
        }
    }

    /// Combine the trailers of an update chain, given newest first.
    ///
    /// The newest trailer's entries win; entries it lacks are taken from the
    /// oldest one. The result no longer links to a previous section.
    pub fn merge(chain: &[PdfTrailer]) -> Option<Self> {
        let newest = chain.first()?;
        let mut merged = newest.clone();
        if let Some(oldest) = chain.last().filter(|_| chain.len() > 1) {
            for (key, value) in oldest.dict.iter() {
                if key.as_str() != "Prev" && !merged.dict.contains_key(key.as_str()) {
                    merged.dict.insert(key.as_str(), value.clone());
                }
            }
        }
        merged.dict.remove("Prev");
        merged.prev = None;
        Some(merged)
    }

    /// Get the size (number of entries in xref table)
    pub fn size(&self) -> Option<u32> {
        self.dict
            .get("Size")
            .and_then(PdfObject::as_integer)
            .and_then(|size| u32::try_from(size).ok())
    }

    /// Get the root object reference (document catalog)
    pub fn root(&self) -> Option<ObjectId> {
        self.dict.get("Root").and_then(PdfObject::as_reference)
    }

    /// Get the info object reference
    pub fn info(&self) -> Option<ObjectId> {
        self.dict.get("Info").and_then(PdfObject::as_reference)
    }

    /// Get the file identifier array
    pub fn id(&self) -> Option<&PdfObject> {
        self.dict.get("ID")
    }

    /// `/Version` written as a name or a number
    pub fn version(&self) -> Option<PdfVersion> {
        match self.dict.get("Version")? {
            PdfObject::Name(name) => PdfVersion::parse(name.as_str()),
            PdfObject::Real(value) => PdfVersion::parse(&format!("{value:.1}")),
            PdfObject::String(text) => text.as_str().ok().and_then(PdfVersion::parse),
            _ => None,
        }
    }

    /// The top-level document dictionary: Root, Info and ID, as present
    pub fn document_dict(&self) -> PdfDictionary {
        let mut dict = PdfDictionary::new();
        for key in ["Root", "Info", "ID"] {
            if let Some(value) = self.dict.get(key) {
                dict.insert(key, value.clone());
            }
        }
        dict
    }

    pub fn dict(&self) -> &PdfDictionary {
        &self.dict
    }
}
