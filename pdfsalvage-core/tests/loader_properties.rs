//! End-to-end properties of the loader
//!
//! Every test builds a complete file with real offsets, loads it through the
//! public API and checks what the document exposes.

mod common;

use common::{simple_document, PdfBuilder};
use pdfsalvage::parser::{load, load_with_options, ObjectId, ParseOptions, PdfObject};
use pretty_assertions::assert_eq;

fn id(number: u32) -> ObjectId {
    ObjectId::new(number, 0)
}

#[test]
fn test_force_all_drains_deferred_set() {
    let mut builder = PdfBuilder::new();
    builder.object(1, "<< /Type /Catalog /Pages 2 0 R /Names 6 0 R >>");
    builder.object(2, "<< /Type /Pages /Kids [3 0 R 4 0 R 5 0 R] /Count 3 >>");
    builder.object(3, "<< /Type /Page /Parent 2 0 R >>");
    builder.object(4, "<< /Type /Page /Parent 2 0 R >>");
    builder.object(5, "<< /Type /Page /Parent 2 0 R /Annots [7 0 R] >>");
    builder.object(6, "<< /Dests 7 0 R >>");
    builder.object(7, "<< /Kind /Shared /Next 8 0 R >>");
    builder.object(8, "[1 2 3]");
    builder.classic_xref(None, "/Root 1 0 R");

    let mut document = load(builder.finish(), false).unwrap();
    assert!(document.deferred_count() > 0);

    let resolved = document.force_all().unwrap();
    assert!(resolved > 0);
    assert_eq!(document.deferred_count(), 0);
    assert_eq!(document.resolved_count(), 8);
    assert!(document.diagnostics().is_empty());
}

#[test]
fn test_newer_revision_wins_in_merged_offsets() {
    let mut builder = PdfBuilder::new();
    builder.object(1, "<< /Type /Catalog /Pages 2 0 R /Extra 5 0 R >>");
    builder.object(2, "<< /Type /Pages /Kids [] /Count 0 >>");
    let old_offset = builder.object(5, "(first revision)");
    let first = builder.classic_xref(None, "/Root 1 0 R");
    let new_offset = builder.object(5, "(second revision)");
    builder.classic_xref(Some(first), "/Root 1 0 R");

    let mut document = load(builder.finish(), false).unwrap();
    assert_ne!(old_offset, new_offset);
    assert_eq!(document.offsets().get(id(5)), Some(new_offset));
    assert_eq!(document.reader().section_count(), 2);

    let value = document.get_object(id(5)).unwrap();
    assert_eq!(
        value.as_string().map(|s| s.as_bytes().to_vec()),
        Some(b"second revision".to_vec())
    );
}

#[test]
fn test_xref_stream_records_fill_tables() {
    let mut builder = PdfBuilder::new();
    let catalog = builder.object(0, "<< /Type /Catalog /Pages 2 0 R >>");
    let container = builder.object_stream(1, &[(2, "<< /Type /Pages /Kids [] /Count 0 >>")]);
    builder.xref_stream(
        3,
        [1, 2, 1],
        &[0, 3],
        &[(1, catalog as u64, 0), (1, container as u64, 0), (2, 1, 0)],
        "/Root 0 0 R",
    );

    let document = load(builder.finish(), false).unwrap();

    let offsets = document.offsets();
    assert_eq!(offsets.len(), 2);
    assert_eq!(offsets.get(id(0)), Some(catalog));
    assert_eq!(offsets.get(id(1)), Some(container));

    let groups = document.object_stream_groups();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups.members(1), &[(2, 0)]);
    assert_eq!(groups.container_of(2), Some(1));

    // The compressed page tree node was reachable from the catalog
    assert_eq!(document.page_count(), 0);
    assert!(!document.diagnostics().contains("Invalid page tree"));
}

#[test]
fn test_lone_cr_stream_matches_crlf_stream() {
    let build = |between: &[u8], payload: &[u8], after: &[u8]| {
        let mut builder = PdfBuilder::new();
        builder.object(1, "<< /Type /Catalog /Pages 2 0 R /Data 3 0 R >>");
        builder.object(2, "<< /Type /Pages /Kids [] /Count 0 >>");
        builder.stream_with_length(3, "4", between, payload, after);
        builder.classic_xref(None, "/Root 1 0 R");
        builder.finish()
    };

    // Written with a bare CR after `stream`, so the declared length is one
    // byte more than what sits between the CRLF and `endstream`
    let short = build(b"\r\n", b"ABC", b"");
    let proper = build(b"\r\n", b"\nABC", b"\n");

    let mut payloads = Vec::new();
    for bytes in [short, proper] {
        let mut document = load(bytes, false).unwrap();
        let stream = document.get_object(id(3)).unwrap().as_stream().cloned().unwrap();
        payloads.push(stream.raw_data().to_vec());
    }
    assert_eq!(payloads[0], b"\nABC".to_vec());
    assert_eq!(payloads[0], payloads[1]);
}

#[test]
fn test_nested_page_tree_order() {
    let mut builder = PdfBuilder::new();
    builder.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    builder.object(2, "<< /Type /Pages /Kids [3 0 R 6 0 R] /Count 3 >>");
    builder.object(3, "<< /Type /Pages /Parent 2 0 R /Kids [4 0 R 5 0 R] /Count 2 >>");
    builder.object(4, "<< /Type /Page /Parent 3 0 R /Label (a) >>");
    builder.object(5, "<< /Type /Page /Parent 3 0 R /Label (b) >>");
    builder.object(6, "<< /Type /Page /Parent 2 0 R /Label (c) >>");
    builder.classic_xref(None, "/Root 1 0 R");

    let document = load(builder.finish(), false).unwrap();
    let order: Vec<Option<ObjectId>> = document.pages().iter().map(|page| page.id).collect();
    assert_eq!(order, vec![Some(id(4)), Some(id(5)), Some(id(6))]);
}

#[test]
fn test_table_without_flags_is_rescanned() {
    let mut builder = PdfBuilder::new();
    let catalog = builder.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    let pages = builder.object(2, "<< /Type /Pages /Kids [] /Count 0 >>");
    let xref = builder.offset();
    let table = format!(
        "xref\n0 4\n0000000000 65535 f \n{catalog:010} 00000 n \n{pages:010} 00000 n \n\
         {pages:010} 00000\ntrailer\n<< /Size 4 /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n"
    );
    builder.raw(table.as_bytes());

    let mut document = load(builder.finish(), false).unwrap();
    assert!(document.diagnostics().contains("Badly formatted xref table"));

    let root = document.root().unwrap();
    let catalog = document.get_object(root).unwrap();
    assert_eq!(catalog.as_dict().and_then(|d| d.get_type()), Some("Catalog"));
}

#[test]
fn test_table_without_flags_is_fatal_when_strict() {
    let mut builder = PdfBuilder::new();
    let catalog = builder.object(1, "<< /Type /Catalog >>");
    let xref = builder.offset();
    let table = format!(
        "xref\n0 2\n0000000000 65535 f \n{catalog:010} 00000\ntrailer\n<< /Size 2 /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n"
    );
    builder.raw(table.as_bytes());

    assert!(load_with_options(builder.finish(), ParseOptions::strict()).is_err());
}

#[test]
fn test_repeated_resolution_is_identical() {
    let mut builder = PdfBuilder::new();
    builder.object(1, "<< /Type /Catalog /Pages 2 0 R /List [4 0 R 4 0 R] >>");
    builder.object(2, "<< /Type /Pages /Kids [] /Count 0 >>");
    builder.object(4, "<< /Shared true /Values [1 2.5 (x)] >>");
    builder.classic_xref(None, "/Root 1 0 R");

    let mut document = load(builder.finish(), false).unwrap();
    let list = document
        .get_object(id(1))
        .unwrap()
        .as_dict()
        .and_then(|d| d.get("List"))
        .and_then(PdfObject::as_array)
        .cloned()
        .unwrap();

    let via_array = document.resolve(&list.0[0]).unwrap().clone();
    let direct = document.get_object(id(4)).unwrap().clone();
    let again = document.resolve(&list.0[1]).unwrap().clone();
    assert_eq!(via_array, direct);
    assert_eq!(again, direct);
    assert_eq!(
        direct.as_dict().and_then(|d| d.get("Shared")),
        Some(&PdfObject::Boolean(true))
    );
}

#[test]
fn test_simple_document_pages() {
    let document = load(simple_document(5), false).unwrap();
    assert_eq!(document.page_count(), 5);
    assert!(document
        .pages()
        .iter()
        .all(|page| page.media_box == Some([0.0, 0.0, 612.0, 792.0])));
}
