//! Stream data extraction
//!
//! Cuts the raw bytes of a stream out of the file buffer. `/Length` is trusted
//! first; when the bytes after it are not `endstream endobj`, the real
//! `endstream` keyword is searched for and the mismatch is classified and
//! reported. Every outcome still yields a best-effort payload.

use super::diagnostics::Diagnostics;
use super::lexer::{find_bytes, is_whitespace, Lexer, Token};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};

/// Set once the lone-CR warning has been emitted by any load in this process
static WARNED_LONE_CR: AtomicBool = AtomicBool::new(false);

const LONE_CR_WARNING: &str = "stream keyword terminated by \\r without \\n";

fn warn_lone_cr(diagnostics: &mut Diagnostics, position: usize) {
    if !WARNED_LONE_CR.swap(true, Ordering::Relaxed) {
        diagnostics.warn(Some(position), LONE_CR_WARNING);
    }
}

/// How the end-of-line after the `stream` keyword was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordTerminator {
    CrLf,
    Lf,
    LoneCr,
    Missing,
}

/// Where stream data begins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamStart {
    pub offset: usize,
    pub terminator: KeywordTerminator,
}

/// How well `/Length` matched the bytes on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFraming {
    /// `endstream endobj` followed the declared length
    Exact,
    /// Data started one byte before the computed start, after a lone CR
    LoneCarriageReturn,
    /// `/Length` ran past `endstream`; clamped to the keyword
    LengthTooLarge,
    /// Non-whitespace between the declared end and `endstream`
    LengthTooSmall,
    /// No usable `/Length`; data taken up to `endstream`
    MissingLength,
    /// No `endstream` anywhere after the data
    EndstreamNotFound,
    /// `endstream` found but no `endobj` after it
    EndobjNotFound,
    /// Something other than whitespace between `endstream` and `endobj`
    DataBeforeEndobj,
    /// Length matched but the terminating keywords did not parse cleanly
    IllegalTerminator,
}

impl StreamFraming {
    pub fn is_exact(self) -> bool {
        self == StreamFraming::Exact
    }
}

/// Raw stream payload plus what it took to find it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedStream {
    pub data: Vec<u8>,
    pub framing: StreamFraming,
    /// Offset just past the closing keywords, as far as they could be found
    pub end: usize,
}

/// Locate the first data byte after a `stream` keyword ending at `keyword_end`.
///
/// One optional CR is skipped, then a LF is expected.
pub fn data_start(data: &[u8], keyword_end: usize, diagnostics: &mut Diagnostics) -> StreamStart {
    let mut offset = keyword_end;
    let got_cr = data.get(offset) == Some(&b'\r');
    if got_cr {
        offset += 1;
    }
    let got_lf = data.get(offset) == Some(&b'\n');
    if got_lf {
        offset += 1;
    }

    let terminator = match (got_cr, got_lf) {
        (true, true) => KeywordTerminator::CrLf,
        (false, true) => KeywordTerminator::Lf,
        (true, false) => {
            warn_lone_cr(diagnostics, keyword_end);
            KeywordTerminator::LoneCr
        }
        (false, false) => {
            diagnostics.error(Some(keyword_end), "stream keyword not followed by \\n");
            KeywordTerminator::Missing
        }
    };
    StreamStart { offset, terminator }
}

/// Extract stream bytes starting at `start` with declared `length`
pub fn extract(
    data: &Bytes,
    start: usize,
    length: Option<usize>,
    diagnostics: &mut Diagnostics,
) -> ExtractedStream {
    let total = data.len();
    let start = start.min(total);

    let length = match length {
        Some(length) => length,
        None => return extract_without_length(data, start, diagnostics),
    };
    let declared_end = start.saturating_add(length);

    if declared_end <= total {
        let mut lexer = Lexer::at(data.clone(), declared_end);
        if let Ok(tokens) = lexer.next_tokens(2) {
            if tokens == [Token::EndStream, Token::EndObj] {
                return ExtractedStream {
                    data: data[start..declared_end].to_vec(),
                    framing: StreamFraming::Exact,
                    end: lexer.position(),
                };
            }
        }
    }

    let clamped_end = declared_end.min(total);
    let endstream = match find_bytes(data, b"endstream", start) {
        Some(endstream) => endstream,
        None => {
            diagnostics.error(Some(start), "Could not find endstream");
            return ExtractedStream {
                data: data[start..clamped_end].to_vec(),
                framing: StreamFraming::EndstreamNotFound,
                end: clamped_end,
            };
        }
    };
    let room = endstream - start;
    let end = keywords_end(data, endstream);

    if length == room + 1 && start >= 2 && &data[start - 2..start] == b"\r\n" {
        warn_lone_cr(diagnostics, start - 2);
        return ExtractedStream {
            data: data[start - 1..declared_end - 1].to_vec(),
            framing: StreamFraming::LoneCarriageReturn,
            end,
        };
    }

    if length > room {
        diagnostics.error(
            Some(start),
            format!(
                "stream /Length attribute ({length}) appears to be too big (size {room}) -- adjusting"
            ),
        );
        return ExtractedStream {
            data: strip_trailing_eol(&data[start..endstream]).to_vec(),
            framing: StreamFraming::LengthTooLarge,
            end,
        };
    }

    let payload = data[start..declared_end].to_vec();
    if data[declared_end..endstream].iter().any(|&b| !is_whitespace(b)) {
        diagnostics.error(
            Some(declared_end),
            format!("stream /Length attribute ({length}) might be smaller than data size ({room})"),
        );
        return ExtractedStream {
            data: payload,
            framing: StreamFraming::LengthTooSmall,
            end,
        };
    }

    let after_endstream = endstream + b"endstream".len();
    let framing = match find_bytes(data, b"endobj", after_endstream) {
        None => {
            diagnostics.error(Some(after_endstream), "Could not find endobj after endstream");
            StreamFraming::EndobjNotFound
        }
        Some(endobj) if data[after_endstream..endobj].iter().any(|&b| !is_whitespace(b)) => {
            diagnostics.error(
                Some(after_endstream),
                "Unexpected data between endstream and endobj",
            );
            StreamFraming::DataBeforeEndobj
        }
        Some(_) => {
            diagnostics.error(Some(endstream), "Illegal endstream/endobj combination");
            StreamFraming::IllegalTerminator
        }
    };
    ExtractedStream {
        data: payload,
        framing,
        end,
    }
}

fn extract_without_length(
    data: &Bytes,
    start: usize,
    diagnostics: &mut Diagnostics,
) -> ExtractedStream {
    diagnostics.error(
        Some(start),
        "stream /Length missing or invalid -- using endstream position",
    );
    match find_bytes(data, b"endstream", start) {
        Some(endstream) => ExtractedStream {
            data: strip_trailing_eol(&data[start..endstream]).to_vec(),
            framing: StreamFraming::MissingLength,
            end: keywords_end(data, endstream),
        },
        None => {
            diagnostics.error(Some(start), "Could not find endstream");
            ExtractedStream {
                data: data[start..].to_vec(),
                framing: StreamFraming::EndstreamNotFound,
                end: data.len(),
            }
        }
    }
}

/// Offset past `endobj` following `endstream`, or past `endstream` alone
fn keywords_end(data: &[u8], endstream: usize) -> usize {
    let after_endstream = endstream + b"endstream".len();
    match find_bytes(data, b"endobj", after_endstream) {
        Some(endobj) if data[after_endstream..endobj].iter().all(|&b| is_whitespace(b)) => {
            endobj + b"endobj".len()
        }
        _ => after_endstream,
    }
}

/// Drop the single end-of-line that belongs to the `endstream` keyword
fn strip_trailing_eol(data: &[u8]) -> &[u8] {
    if let Some(rest) = data.strip_suffix(b"\r\n") {
        rest
    } else if let Some(rest) = data
        .strip_suffix(b"\n")
        .or_else(|| data.strip_suffix(b"\r"))
    {
        rest
    } else {
        data
    }
}
