//! Damaged files the loader is expected to repair
//!
//! Each case corrupts an otherwise valid file in one specific way and checks
//! that the load succeeds, that the repaired data is right and that the
//! problem shows up in the diagnostics.

mod common;

use common::{simple_document, PdfBuilder};
use pdfsalvage::parser::{load, load_with_options, ObjectId, ParseError, ParseOptions, Severity};
use pretty_assertions::assert_eq;

fn id(number: u32) -> ObjectId {
    ObjectId::new(number, 0)
}

/// Catalog and one page, with the page's recorded offset moved by `shift`
fn misplaced_page(shift: usize) -> Vec<u8> {
    one_page("", shift)
}

fn one_page(prefix: &str, shift: usize) -> Vec<u8> {
    let mut pdf = format!("{prefix}%PDF-1.4\n");
    let catalog = pdf.len();
    pdf.push_str("1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
    let pages = pdf.len();
    pdf.push_str("2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n");
    let page = pdf.len();
    pdf.push_str("3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 100 200] >>\nendobj\n");
    let xref = pdf.len();
    pdf.push_str(&format!(
        "xref\n0 4\n0000000000 65535 f \n{catalog:010} 00000 n \n{pages:010} 00000 n \n{:010} 00000 n \n\
         trailer\n<< /Size 4 /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
        page + shift
    ));
    pdf.into_bytes()
}

#[test]
fn test_wrong_offset_is_relocated() {
    let document = load(misplaced_page(12), false).unwrap();
    assert_eq!(document.page_count(), 1);
    assert_eq!(document.pages()[0].height(), 200.0);
    assert!(document.diagnostics().contains("found at incorrect offset"));
}

#[test]
fn test_wrong_offset_without_relocation_drops_object() {
    let options = ParseOptions {
        relocate_objects: false,
        ..ParseOptions::default()
    };
    let document = load_with_options(misplaced_page(12), options).unwrap();
    assert_eq!(document.page_count(), 0);
    assert!(document.diagnostics().contains("Expected indirect object"));
}

#[test]
fn test_missing_object_resolves_to_null() {
    let mut builder = PdfBuilder::new();
    builder.object(1, "<< /Type /Catalog /Pages 2 0 R /Metadata 40 0 R >>");
    builder.object(2, "<< /Type /Pages /Kids [] /Count 0 >>");
    builder.classic_xref(None, "/Root 1 0 R");

    let mut document = load(builder.finish(), false).unwrap();
    assert!(document.get_object(id(40)).unwrap().is_null());
    assert!(document.diagnostics().contains("Did not find PDF object"));
    assert_eq!(document.deferred_count(), 0);
}

#[test]
fn test_length_too_large_is_clamped() {
    let mut builder = PdfBuilder::new();
    builder.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    builder.object(2, "<< /Type /Pages /Kids [] /Count 0 >>");
    builder.stream_with_length(3, "500", b"\n", b"short payload", b"\n");
    builder.classic_xref(None, "/Root 1 0 R");

    let mut document = load(builder.finish(), false).unwrap();
    let stream = document.get_object(id(3)).unwrap().as_stream().cloned().unwrap();
    assert_eq!(stream.raw_data(), b"short payload");
    assert!(document.diagnostics().contains("appears to be too big"));
}

#[test]
fn test_length_too_small_keeps_declared_bytes() {
    let mut builder = PdfBuilder::new();
    builder.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    builder.object(2, "<< /Type /Pages /Kids [] /Count 0 >>");
    builder.stream_with_length(3, "5", b"\n", b"0123456789", b"\n");
    builder.classic_xref(None, "/Root 1 0 R");

    let mut document = load(builder.finish(), false).unwrap();
    let stream = document.get_object(id(3)).unwrap().as_stream().cloned().unwrap();
    assert_eq!(stream.raw_data(), b"01234");
    assert!(document.diagnostics().contains("might be smaller than data size"));
}

#[test]
fn test_indirect_length() {
    let mut builder = PdfBuilder::new();
    builder.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    builder.object(2, "<< /Type /Pages /Kids [] /Count 0 >>");
    builder.stream_with_length(3, "4 0 R", b"\n", b"abcdef", b"\n");
    builder.object(4, "6");
    builder.classic_xref(None, "/Root 1 0 R");

    let mut document = load(builder.finish(), false).unwrap();
    let stream = document.get_object(id(3)).unwrap().as_stream().cloned().unwrap();
    assert_eq!(stream.raw_data(), b"abcdef");
    assert!(document.diagnostics().is_empty());
}

#[test]
fn test_junk_after_eof_is_tolerated() {
    let mut bytes = simple_document(1);
    bytes.extend_from_slice(b"\0\0\n  ");
    let clean = load(bytes.clone(), false).unwrap();
    assert!(clean.diagnostics().is_empty());

    bytes.extend_from_slice(b"garbage appended by a mail client");
    let document = load(bytes, false).unwrap();
    assert_eq!(document.page_count(), 1);
    assert!(document.diagnostics().contains("Extra data at end of file"));
}

#[test]
fn test_header_not_at_start() {
    let document = load(one_page("MIME preamble\r\n", 0), false).unwrap();
    assert_eq!(document.page_count(), 1);
    assert_eq!(document.version().to_string(), "1.4");
    assert!(document
        .diagnostics()
        .contains("PDF header not at beginning of file"));
}

#[test]
fn test_fatal_conditions() {
    assert!(matches!(load(Vec::new(), false), Err(ParseError::EmptyFile)));
    assert!(matches!(
        load(b"   \n\t\n".to_vec(), false),
        Err(ParseError::EmptyFile)
    ));

    let mut no_eof = simple_document(1);
    let cut = no_eof.len() - b"%%EOF\n".len();
    no_eof.truncate(cut);
    assert!(matches!(load(no_eof, false), Err(ParseError::MissingEofMarker)));

    let no_startxref = b"%PDF-1.4\n1 0 obj\n<< >>\nendobj\n%%EOF\n".to_vec();
    assert!(matches!(
        load(no_startxref, false),
        Err(ParseError::InvalidStartXref { .. })
    ));

    let mut builder = PdfBuilder::new();
    builder.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    builder.object(2, "<< /Type /Pages /Kids [] 7 /Count >>");
    builder.classic_xref(None, "/Root 1 0 R");
    assert!(matches!(
        load(builder.finish(), false),
        Err(ParseError::SyntaxError { .. })
    ));
}

#[test]
fn test_prev_cycle_ends_chain() {
    let mut builder = PdfBuilder::new();
    builder.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    builder.object(2, "<< /Type /Pages /Kids [] /Count 0 >>");
    let xref = builder.offset();
    builder.classic_xref(Some(xref), "/Root 1 0 R");

    let document = load(builder.finish(), false).unwrap();
    assert_eq!(document.root(), Some(id(1)));
    assert!(document
        .diagnostics()
        .iter()
        .any(|d| d.severity == Severity::Warning && d.message.contains("loops back")));
}

#[test]
fn test_object_stream_members_resolve() {
    let mut builder = PdfBuilder::new();
    let catalog = builder.object(1, "<< /Type /Catalog /Pages 2 0 R /Extra 6 0 R >>");
    let container = builder.object_stream(
        5,
        &[
            (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
            (3, "<< /Type /Page /Parent 2 0 R >>"),
            (6, "42"),
        ],
    );
    builder.xref_stream(
        7,
        [1, 4, 2],
        &[1, 6],
        &[
            (1, catalog as u64, 0),
            (2, 5, 0),
            (2, 5, 1),
            (0, 0, 0),
            (1, container as u64, 0),
            (2, 5, 2),
        ],
        "/Root 1 0 R",
    );

    let mut document = load(builder.finish(), false).unwrap();
    assert_eq!(document.page_count(), 1);
    assert_eq!(
        document.get_object(id(6)).unwrap().as_integer(),
        Some(42)
    );
    assert_eq!(document.object_stream_groups().members(5).len(), 3);
}

#[test]
fn test_loads_are_independent() {
    let first = load(misplaced_page(12), false).unwrap();
    let second = load(simple_document(2), false).unwrap();
    assert!(!first.diagnostics().is_empty());
    assert!(second.diagnostics().is_empty());
    assert_eq!(second.page_count(), 2);
}
