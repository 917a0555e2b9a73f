//! Property tests: arbitrary and mutated input never panics

mod common;

use common::simple_document;
use pdfsalvage::parser::{load, Lexer};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn loader_never_panics_on_arbitrary_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let _ = load(bytes, false);
    }

    #[test]
    fn loader_never_panics_on_framed_garbage(body in proptest::collection::vec(any::<u8>(), 0..1024)) {
        let mut bytes = b"%PDF-1.7\n".to_vec();
        bytes.extend_from_slice(&body);
        bytes.extend_from_slice(b"\nstartxref\n9\n%%EOF\n");
        if let Ok(mut document) = load(bytes, false) {
            let _ = document.force_all();
        }
    }

    #[test]
    fn loader_never_panics_on_mutated_document(
        edits in proptest::collection::vec((any::<prop::sample::Index>(), any::<u8>()), 1..16)
    ) {
        let mut bytes = simple_document(3);
        for (index, byte) in edits {
            let at = index.index(bytes.len());
            bytes[at] = byte;
        }
        if let Ok(mut document) = load(bytes, false) {
            let _ = document.decompress_all();
        }
    }

    #[test]
    fn lexer_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..1024)) {
        let mut lexer = Lexer::new(bytes);
        for _ in 0..512 {
            if lexer.next_token().is_err() {
                break;
            }
        }
    }
}

#[test]
fn truncated_documents_never_panic() {
    let bytes = simple_document(2);
    for end in 0..bytes.len() {
        let _ = load(bytes[..end].to_vec(), false);
    }
}
