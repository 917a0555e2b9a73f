//! Cross-reference stream support for PDF 1.5+
//!
//! This module implements cross-reference streams according to
//! ISO 32000-1:2008 Section 7.5.8 (Cross-Reference Streams).
//!
//! A cross-reference stream replaces the classic table with a binary table of
//! fixed-width records. Field widths come from `/W`, and the object numbers
//! the records describe come from `/Index`.

use super::objects::{PdfDictionary, PdfObject};
use super::{ParseError, ParseResult};

/// Cross-reference entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free object entry
    Free {
        /// Next free object number
        next_free_object: u64,
        /// Generation number
        generation: u64,
    },
    /// In-use object entry
    InUse {
        /// Byte offset in the file
        offset: u64,
        /// Generation number
        generation: u64,
    },
    /// Compressed object entry (PDF 1.5+)
    Compressed {
        /// Object number of the object stream containing this object
        stream_object_number: u64,
        /// Index of this object within the object stream
        index_within_stream: u64,
    },
    /// Types other than 0, 1 and 2 are treated as references to null
    Unknown(u64),
}

/// Decoded cross-reference stream table
#[derive(Debug, Clone)]
pub struct XRefStream {
    /// Decoded stream data
    pub data: Vec<u8>,
    /// Field widths from the W array
    pub widths: [usize; 3],
    /// Index array (pairs of [first_object_number, count])
    pub index: Vec<(u64, u64)>,
}

impl XRefStream {
    /// Read the table shape from `dict` over already decoded `data`.
    ///
    /// `position` is the offset of the stream object and is only used for errors.
    pub fn parse(dict: &PdfDictionary, data: Vec<u8>, position: usize) -> ParseResult<Self> {
        let invalid = |message: String| ParseError::InvalidXRef { position, message };

        let widths = dict
            .get("W")
            .and_then(PdfObject::as_array)
            .ok_or_else(|| invalid("W array missing from xref stream".to_string()))?
            .iter()
            .map(|width| match width.as_integer() {
                Some(width @ 0..=8) => Ok(width as usize),
                _ => Err(invalid(format!("Invalid field width {width:?} in W array"))),
            })
            .collect::<ParseResult<Vec<_>>>()?;
        let widths: [usize; 3] = widths.as_slice().try_into().map_err(|_| {
            invalid(format!(
                "W array must have 3 elements, found {len}",
                len = widths.len()
            ))
        })?;

        let index = match dict.get("Index").and_then(PdfObject::as_array) {
            Some(array) => {
                let numbers = array
                    .iter()
                    .map(|value| {
                        value
                            .as_integer()
                            .and_then(|n| u64::try_from(n).ok())
                            .ok_or_else(|| invalid(format!("Invalid Index entry {value:?}")))
                    })
                    .collect::<ParseResult<Vec<_>>>()?;
                numbers
                    .chunks_exact(2)
                    .map(|pair| (pair[0], pair[1]))
                    .collect()
            }
            None => {
                let size = dict
                    .get("Size")
                    .and_then(PdfObject::as_integer)
                    .and_then(|n| u64::try_from(n).ok())
                    .ok_or_else(|| invalid("Size missing from xref stream".to_string()))?;
                vec![(0, size)]
            }
        };

        Ok(Self {
            data,
            widths,
            index,
        })
    }

    /// Bytes per record
    pub fn entry_size(&self) -> usize {
        self.widths.iter().sum()
    }

    /// Number of bytes the Index array says the table should hold
    pub fn expected_len(&self) -> u64 {
        let records: u64 = self.index.iter().map(|&(_, count)| count).sum();
        records.saturating_mul(self.entry_size() as u64)
    }

    pub fn is_truncated(&self) -> bool {
        (self.data.len() as u64) < self.expected_len()
    }

    /// Decode every complete record, paired with its object number.
    ///
    /// Decoding stops at the end of the data; a short table yields the records
    /// that are fully present.
    pub fn to_xref_entries(&self) -> Vec<(u64, XRefEntry)> {
        let entry_size = self.entry_size();
        let mut entries = Vec::new();
        if entry_size == 0 {
            return entries;
        }

        let mut records = self.data.chunks_exact(entry_size);
        'subsections: for &(first, count) in &self.index {
            for number in (0..count).map(|i| first.saturating_add(i)) {
                let Some(record) = records.next() else {
                    break 'subsections;
                };
                entries.push((number, self.decode_record(record)));
            }
        }
        entries
    }

    fn decode_record(&self, record: &[u8]) -> XRefEntry {
        let [w0, w1, w2] = self.widths;
        let (type_field, rest) = record.split_at(w0);
        let (field1, field2) = rest.split_at(w1);

        // A zero-width type field means every record is in use
        let entry_type = if w0 == 0 { 1 } else { read_field(type_field) };
        let field1 = read_field(field1);
        let field2 = if w2 == 0 { 0 } else { read_field(field2) };

        match entry_type {
            0 => XRefEntry::Free {
                next_free_object: field1,
                generation: field2,
            },
            1 => XRefEntry::InUse {
                offset: field1,
                generation: field2,
            },
            2 => XRefEntry::Compressed {
                stream_object_number: field1,
                index_within_stream: field2,
            },
            other => XRefEntry::Unknown(other),
        }
    }
}

/// Read a big-endian unsigned integer of at most 8 bytes
fn read_field(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte))
}
