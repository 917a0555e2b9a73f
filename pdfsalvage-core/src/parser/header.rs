//! PDF File Framing
//!
//! Locates the `%PDF-` header, the `%%EOF` footer and the final `startxref`
//! pointer (ISO 32000-1 Sections 7.5.2 and 7.5.5). Header and trailing-garbage
//! problems are tolerated with a warning; a missing footer is fatal.

use super::diagnostics::Diagnostics;
use super::lexer::{find_bytes, is_whitespace, rfind_bytes, Lexer, Token};
use super::{ParseError, ParseResult};
use bytes::Bytes;

const HEADER_MARKER: &[u8] = b"%PDF-";

/// PDF Version information
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PdfVersion {
    pub major: u8,
    pub minor: u8,
}

impl PdfVersion {
    /// Create a new PDF version
    pub fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Parse a `major.minor` string such as `1.7`
    pub fn parse(text: &str) -> Option<Self> {
        let (major, minor) = text.trim().split_once('.')?;
        Some(Self::new(major.parse().ok()?, minor.parse().ok()?))
    }
}

impl std::fmt::Display for PdfVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// PDF Header information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfHeader {
    /// Offset of the `%PDF-` marker, normally 0
    pub offset: usize,
    /// The three version bytes that follow the marker, e.g. `1.4`
    pub version: String,
}

impl PdfHeader {
    /// Find the header marker, warning if it is not at the start of the file
    pub fn locate(data: &[u8], diagnostics: &mut Diagnostics) -> ParseResult<Self> {
        let offset = if data.starts_with(HEADER_MARKER) {
            0
        } else {
            match find_bytes(data, HEADER_MARKER, 0) {
                Some(offset) => {
                    diagnostics.warn(Some(offset), "PDF header not at beginning of file");
                    offset
                }
                None => {
                    let first_line = data
                        .split(|&b| b == b'\n' || b == b'\r')
                        .find(|line| line.iter().any(|&b| !is_whitespace(b)));
                    return Err(match first_line {
                        None => ParseError::EmptyFile,
                        Some(line) => ParseError::InvalidHeader {
                            found: String::from_utf8_lossy(&line[..line.len().min(40)])
                                .trim()
                                .to_string(),
                        },
                    });
                }
            }
        };

        let start = offset + HEADER_MARKER.len();
        let end = (start + 3).min(data.len());
        Ok(Self {
            offset,
            version: String::from_utf8_lossy(&data[start..end]).into_owned(),
        })
    }

    pub fn pdf_version(&self) -> Option<PdfVersion> {
        PdfVersion::parse(&self.version)
    }
}

/// Length the buffer should be cut to: just past the last `%EOF` and one EOL.
///
/// Anything after that other than NUL or whitespace is reported as junk.
pub fn footer_end(data: &[u8], diagnostics: &mut Diagnostics) -> ParseResult<usize> {
    let marker = rfind_bytes(data, b"%EOF").ok_or(ParseError::MissingEofMarker)?;
    let mut end = marker + 4;
    if data.get(end) == Some(&b'\r') {
        end += 1;
    }
    if data.get(end) == Some(&b'\n') {
        end += 1;
    }

    if data[end..].iter().any(|&b| !is_whitespace(b)) {
        diagnostics.warn(Some(end), "Extra data at end of file");
    }
    Ok(end)
}

/// Offset recorded after the last `startxref` keyword
pub fn find_startxref(data: &Bytes) -> ParseResult<usize> {
    let position = rfind_bytes(data, b"startxref").ok_or_else(|| ParseError::InvalidStartXref {
        position: data.len(),
        message: "startxref not found".to_string(),
    })?;
    let invalid = |message: &str| ParseError::InvalidStartXref {
        position,
        message: message.to_string(),
    };

    let mut lexer = Lexer::at(data.clone(), position);
    if lexer.next_token().ok() != Some(Token::StartXRef) {
        return Err(invalid("startxref not found"));
    }
    let offset = match lexer.next_significant() {
        Ok(token) => token.as_unsigned(),
        Err(_) => None,
    }
    .ok_or_else(|| invalid("Expected xref offset after startxref"))?;

    match lexer.next_token() {
        Ok(Token::Comment(comment)) if comment.trim_end().trim_start_matches('%') == "EOF" => {}
        _ => return Err(invalid("Expected %%EOF after startxref offset")),
    }

    usize::try_from(offset).map_err(|_| invalid("xref offset out of range"))
}
