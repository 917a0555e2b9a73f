//! PDF Stream Filters
//!
//! Handles decompression and decoding of PDF streams according to ISO 32000-1 Section 7.4

use super::objects::{ObjectId, PdfDictionary, PdfObject};
use super::registry::IndirectObject;
use super::{ParseError, ParseResult};

#[cfg(feature = "compression")]
use flate2::read::ZlibDecoder;
#[cfg(feature = "compression")]
use std::io::Read;

/// Supported PDF filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// ASCII hex decode
    ASCIIHexDecode,

    /// ASCII 85 decode
    ASCII85Decode,

    /// LZW decode
    LZWDecode,

    /// Flate decode (zlib/deflate compression)
    FlateDecode,

    /// Run length decode
    RunLengthDecode,

    /// CCITT fax decode
    CCITTFaxDecode,

    /// JBIG2 decode
    JBIG2Decode,

    /// DCT decode (JPEG)
    DCTDecode,

    /// JPX decode (JPEG 2000)
    JPXDecode,

    /// Crypt filter
    Crypt,
}

impl Filter {
    /// Parse filter from name, accepting the standard abbreviations
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ASCIIHexDecode" | "AHx" => Some(Filter::ASCIIHexDecode),
            "ASCII85Decode" | "A85" => Some(Filter::ASCII85Decode),
            "LZWDecode" | "LZW" => Some(Filter::LZWDecode),
            "FlateDecode" | "Fl" => Some(Filter::FlateDecode),
            "RunLengthDecode" | "RL" => Some(Filter::RunLengthDecode),
            "CCITTFaxDecode" | "CCF" => Some(Filter::CCITTFaxDecode),
            "JBIG2Decode" => Some(Filter::JBIG2Decode),
            "DCTDecode" | "DCT" => Some(Filter::DCTDecode),
            "JPXDecode" => Some(Filter::JPXDecode),
            "Crypt" => Some(Filter::Crypt),
            _ => None,
        }
    }

    /// Image codecs whose output is the encoded image itself
    pub fn is_image_codec(self) -> bool {
        matches!(
            self,
            Filter::CCITTFaxDecode | Filter::JBIG2Decode | Filter::DCTDecode | Filter::JPXDecode
        )
    }
}

/// Decode stream data according to the filters named in its dictionary.
///
/// Decoding stops in front of an image codec, leaving the image payload as is.
pub fn decode_stream(data: &[u8], dict: &PdfDictionary) -> ParseResult<Vec<u8>> {
    let filters = match dict.get("Filter") {
        Some(PdfObject::Name(name)) => vec![name.as_str()],
        Some(PdfObject::Array(array)) => {
            let mut filter_names = Vec::new();
            for obj in array.iter() {
                match obj {
                    PdfObject::Name(name) => filter_names.push(name.as_str()),
                    _ => {
                        return Err(ParseError::StreamDecodeError(
                            "Invalid filter in array".to_string(),
                        ))
                    }
                }
            }
            filter_names
        }
        None | Some(PdfObject::Null) => return Ok(data.to_vec()),
        Some(_) => {
            return Err(ParseError::StreamDecodeError(
                "Invalid Filter type".to_string(),
            ))
        }
    };

    let mut result = data.to_vec();
    for (index, filter_name) in filters.into_iter().enumerate() {
        let filter = Filter::from_name(filter_name).ok_or_else(|| {
            ParseError::StreamDecodeError(format!("Unknown filter: {filter_name}"))
        })?;
        if filter.is_image_codec() {
            break;
        }
        result = apply_filter(&result, filter)?;
        if let Some(params) = decode_params(dict, index) {
            result = apply_predictor(result, params)?;
        }
    }

    Ok(result)
}

/// Decode every stream in `objects` that has not been decoded yet.
///
/// Non-stream objects are left alone. A stream that fails to decode keeps its
/// raw bytes; the failure is returned alongside its identity and the rest of
/// the batch carries on.
pub fn decode_all<'a>(
    objects: impl IntoIterator<Item = &'a mut IndirectObject>,
) -> Vec<(ObjectId, ParseError)> {
    let mut failures = Vec::new();
    for indirect in objects {
        if let PdfObject::Stream(stream) = &mut indirect.object {
            if stream.decoded.is_some() {
                continue;
            }
            match stream.decode() {
                Ok(decoded) => stream.decoded = Some(decoded),
                Err(err) => failures.push((indirect.id, err)),
            }
        }
    }
    failures
}

/// Apply a single filter to data
fn apply_filter(data: &[u8], filter: Filter) -> ParseResult<Vec<u8>> {
    match filter {
        Filter::FlateDecode => decode_flate(data),
        Filter::ASCIIHexDecode => decode_ascii_hex(data),
        Filter::ASCII85Decode => decode_ascii85(data),
        Filter::RunLengthDecode => decode_run_length(data),
        _ => Err(ParseError::StreamDecodeError(format!(
            "Filter {filter:?} not supported"
        ))),
    }
}

/// Decode FlateDecode (zlib/deflate) compressed data
#[cfg(feature = "compression")]
fn decode_flate(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut result = Vec::new();
    match decoder.read_to_end(&mut result) {
        Ok(_) => Ok(result),
        // Truncated streams are common; keep whatever inflated cleanly
        Err(_) if !result.is_empty() => Ok(result),
        Err(e) => Err(ParseError::StreamDecodeError(format!(
            "Flate decode error: {e}"
        ))),
    }
}

#[cfg(not(feature = "compression"))]
fn decode_flate(_data: &[u8]) -> ParseResult<Vec<u8>> {
    Err(ParseError::StreamDecodeError(
        "FlateDecode requires 'compression' feature".to_string(),
    ))
}

/// Decode ASCIIHexDecode data
fn decode_ascii_hex(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut result = Vec::new();
    let mut chars = data.iter().filter(|&&b| !b.is_ascii_whitespace());

    loop {
        let high = match chars.next() {
            Some(&b'>') | None => break,
            Some(&ch) => ch,
        };
        let low = match chars.next() {
            Some(&b'>') | None => b'0',
            Some(&ch) => ch,
        };

        let high_val = hex_digit_value(high).ok_or_else(|| {
            ParseError::StreamDecodeError(format!("Invalid hex digit: {}", high as char))
        })?;
        let low_val = hex_digit_value(low).ok_or_else(|| {
            ParseError::StreamDecodeError(format!("Invalid hex digit: {}", low as char))
        })?;

        result.push((high_val << 4) | low_val);
    }

    Ok(result)
}

fn hex_digit_value(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        _ => None,
    }
}

/// Decode ASCII85Decode data
fn decode_ascii85(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut result = Vec::new();
    let mut group: Vec<u8> = Vec::with_capacity(5);
    let mut chars = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .peekable();

    // Optional <~ prefix
    if chars.peek() == Some(&b'<') {
        chars.next();
        if chars.next() != Some(b'~') {
            return Err(ParseError::StreamDecodeError(
                "Invalid ASCII85 start marker".to_string(),
            ));
        }
    }

    while let Some(c) = chars.next() {
        match c {
            b'~' => {
                if chars.next() == Some(b'>') {
                    break;
                }
                return Err(ParseError::StreamDecodeError(
                    "Invalid ASCII85 end marker".to_string(),
                ));
            }
            b'z' if group.is_empty() => result.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group.push(c);
                if group.len() == 5 {
                    result.extend_from_slice(&ascii85_group_value(&group).to_be_bytes());
                    group.clear();
                }
            }
            _ => {
                return Err(ParseError::StreamDecodeError(format!(
                    "Invalid ASCII85 character: {}",
                    c as char
                )))
            }
        }
    }

    // Incomplete final group: pad with 'u', emit one byte fewer than read
    if !group.is_empty() {
        let original_len = group.len();
        group.resize(5, b'u');
        let bytes = ascii85_group_value(&group).to_be_bytes();
        result.extend_from_slice(&bytes[..original_len - 1]);
    }

    Ok(result)
}

fn ascii85_group_value(group: &[u8]) -> u32 {
    group
        .iter()
        .fold(0u32, |acc, &ch| acc.wrapping_mul(85).wrapping_add(u32::from(ch - b'!')))
}

/// Decode RunLengthDecode data
fn decode_run_length(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut result = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let length = data[i];
        if length == 128 {
            break;
        }
        if length < 128 {
            let count = usize::from(length) + 1;
            let literal = data.get(i + 1..i + 1 + count).ok_or_else(|| {
                ParseError::StreamDecodeError("RunLength data truncated".to_string())
            })?;
            result.extend_from_slice(literal);
            i += 1 + count;
        } else {
            let count = 257 - usize::from(length);
            let byte = *data.get(i + 1).ok_or_else(|| {
                ParseError::StreamDecodeError("RunLength data truncated".to_string())
            })?;
            result.resize(result.len() + count, byte);
            i += 2;
        }
    }

    Ok(result)
}

/// Predictor parameters from `/DecodeParms`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PredictorParams {
    predictor: i64,
    colors: usize,
    bits_per_component: usize,
    columns: usize,
}

fn decode_params(dict: &PdfDictionary, index: usize) -> Option<PredictorParams> {
    let params = match dict.get("DecodeParms").or_else(|| dict.get("DP"))? {
        PdfObject::Dictionary(params) => params,
        PdfObject::Array(array) => array.get(index)?.as_dict()?,
        _ => return None,
    };
    let field = |key: &str, default: i64| {
        params
            .get(key)
            .and_then(|value| value.as_integer())
            .unwrap_or(default)
    };

    let predictor = field("Predictor", 1);
    if predictor <= 1 {
        return None;
    }
    Some(PredictorParams {
        predictor,
        colors: field("Colors", 1).clamp(1, 32) as usize,
        bits_per_component: field("BitsPerComponent", 8).clamp(1, 16) as usize,
        columns: field("Columns", 1).max(1) as usize,
    })
}

fn apply_predictor(data: Vec<u8>, params: PredictorParams) -> ParseResult<Vec<u8>> {
    match params.predictor {
        10..=15 => decode_png_predictor(&data, params),
        2 => Err(ParseError::StreamDecodeError(
            "TIFF predictor not supported".to_string(),
        )),
        _ => Ok(data),
    }
}

/// Undo PNG row filters; every row starts with its own filter-type byte
fn decode_png_predictor(data: &[u8], params: PredictorParams) -> ParseResult<Vec<u8>> {
    let bits_per_pixel = params.colors * params.bits_per_component;
    let bytes_per_pixel = bits_per_pixel.div_ceil(8);
    let bytes_per_row = (params.columns * bits_per_pixel).div_ceil(8);
    let row_length = bytes_per_row + 1;

    let mut result = Vec::with_capacity(data.len());
    let mut previous = vec![0u8; bytes_per_row];

    // A short final row is decoded as far as it goes
    for chunk in data.chunks(row_length) {
        let filter_type = chunk[0];
        let row = &chunk[1..];
        let mut decoded = vec![0u8; row.len()];

        for i in 0..row.len() {
            let left = if i >= bytes_per_pixel {
                decoded[i - bytes_per_pixel]
            } else {
                0
            };
            let up = previous[i];
            let up_left = if i >= bytes_per_pixel {
                previous[i - bytes_per_pixel]
            } else {
                0
            };
            let prediction = match filter_type {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
                4 => paeth(left, up, up_left),
                other => {
                    return Err(ParseError::StreamDecodeError(format!(
                        "Unknown PNG predictor type: {other}"
                    )))
                }
            };
            decoded[i] = row[i].wrapping_add(prediction);
        }

        result.extend_from_slice(&decoded);
        previous[..decoded.len()].copy_from_slice(&decoded);
    }

    Ok(result)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
