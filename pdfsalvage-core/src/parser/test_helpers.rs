//! Helper for creating test PDFs with correct offsets

use std::fmt::Write as _;

/// Writes objects and cross-reference sections, keeping track of offsets
pub struct PdfBuilder {
    data: Vec<u8>,
    /// Objects written since the last cross-reference section
    pending: Vec<(u32, u16, usize)>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::with_version("1.4")
    }

    pub fn with_version(version: &str) -> Self {
        let mut data = format!("%PDF-{version}\n").into_bytes();
        data.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");
        Self {
            data,
            pending: Vec::new(),
        }
    }

    /// Current end of the buffer
    pub fn offset(&self) -> usize {
        self.data.len()
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    /// Write `number 0 obj body endobj`, returning its offset
    pub fn object(&mut self, number: u32, body: &str) -> usize {
        self.object_with_generation(number, 0, body)
    }

    pub fn object_with_generation(&mut self, number: u32, generation: u16, body: &str) -> usize {
        let offset = self.offset();
        self.data
            .extend_from_slice(format!("{number} {generation} obj\n{body}\nendobj\n").as_bytes());
        self.pending.push((number, generation, offset));
        offset
    }

    /// Write a stream object with an exact `/Length`
    pub fn stream_object(&mut self, number: u32, dict_entries: &str, payload: &[u8]) -> usize {
        let offset = self.offset();
        self.data.extend_from_slice(
            format!(
                "{number} 0 obj\n<< {dict_entries} /Length {} >>\nstream\n",
                payload.len()
            )
            .as_bytes(),
        );
        self.data.extend_from_slice(payload);
        self.data.extend_from_slice(b"\nendstream\nendobj\n");
        self.pending.push((number, 0, offset));
        offset
    }

    /// Write an uncompressed object stream holding `members`
    pub fn object_stream(&mut self, number: u32, members: &[(u32, &str)]) -> usize {
        let mut header = String::new();
        let mut body = String::new();
        for (member, value) in members {
            write!(header, "{member} {} ", body.len()).ok();
            body.push_str(value);
            body.push(' ');
        }
        let entries = format!(
            "/Type /ObjStm /N {} /First {}",
            members.len(),
            header.len()
        );
        self.stream_object(number, &entries, format!("{header}{body}").as_bytes())
    }

    /// Write a classic table for the pending objects, then the footer
    pub fn classic_xref(&mut self, trailer: &[(&str, &str)]) -> usize {
        self.write_classic_xref(None, trailer)
    }

    /// Same as [`classic_xref`](Self::classic_xref), linking back to `prev`
    pub fn classic_xref_update(&mut self, prev: usize, trailer: &[(&str, &str)]) -> usize {
        self.write_classic_xref(Some(prev), trailer)
    }

    fn write_classic_xref(&mut self, prev: Option<usize>, trailer: &[(&str, &str)]) -> usize {
        let offset = self.offset();
        let mut table = String::from("xref\n0 1\n0000000000 65535 f \n");
        let mut size = 1;
        for (number, generation, at) in self.pending.drain(..) {
            write!(table, "{number} 1\n{at:010} {generation:05} n \n").ok();
            size = size.max(number + 1);
        }
        write!(table, "trailer\n<< /Size {size}").ok();
        if let Some(prev) = prev {
            write!(table, " /Prev {prev}").ok();
        }
        for (key, value) in trailer {
            write!(table, " /{key} {value}").ok();
        }
        write!(table, " >>\nstartxref\n{offset}\n%%EOF\n").ok();
        self.data.extend_from_slice(table.as_bytes());
        offset
    }

    /// Write an uncompressed cross-reference stream as object `number`.
    ///
    /// Each record is `(type, field1, field2)`, encoded with `widths`.
    pub fn xref_stream(
        &mut self,
        number: u32,
        widths: &[usize],
        index: &[u64],
        records: &[(u8, u64, u64)],
        trailer: &[(&str, &str)],
    ) -> usize {
        let offset = self.offset();
        let mut payload = Vec::new();
        for &(kind, field1, field2) in records {
            for (value, &width) in [u64::from(kind), field1, field2].iter().zip(widths) {
                payload.extend_from_slice(&value.to_be_bytes()[8 - width..]);
            }
        }

        let size = index
            .chunks(2)
            .map(|pair| pair[0] + pair.get(1).copied().unwrap_or(0))
            .max()
            .unwrap_or(0);
        let mut dict = format!(
            "<< /Type /XRef /Size {size} /W [{}] /Index [{}] /Length {}",
            join(widths),
            join(index),
            payload.len()
        );
        for (key, value) in trailer {
            write!(dict, " /{key} {value}").ok();
        }
        dict.push_str(" >>");

        self.data
            .extend_from_slice(format!("{number} 0 obj\n{dict}\nstream\n").as_bytes());
        self.data.extend_from_slice(&payload);
        self.data.extend_from_slice(
            format!("\nendstream\nendobj\nstartxref\n{offset}\n%%EOF\n").as_bytes(),
        );
        self.pending.clear();
        offset
    }

    pub fn finish(&self) -> Vec<u8> {
        self.data.clone()
    }

    /// Offset written after the last `startxref`
    pub fn startxref_of(data: &[u8]) -> usize {
        let text = String::from_utf8_lossy(data);
        let at = text.rfind("startxref").expect("startxref present");
        text[at + "startxref".len()..]
            .split_whitespace()
            .next()
            .and_then(|offset| offset.parse().ok())
            .expect("startxref offset")
    }
}

fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Catalog, page tree with `pages` leaves, classic table
pub fn simple_document(pages: usize) -> Vec<u8> {
    let mut builder = PdfBuilder::new();
    let first_page = 3;
    let kids: Vec<String> = (0..pages)
        .map(|i| format!("{} 0 R", first_page + i))
        .collect();
    builder.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    builder.object(
        2,
        &format!(
            "<< /Type /Pages /Kids [{}] /Count {pages} >>",
            kids.join(" ")
        ),
    );
    for i in 0..pages {
        builder.object(
            (first_page + i) as u32,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>",
        );
    }
    builder.classic_xref(&[("Root", "1 0 R")]);
    builder.finish()
}
