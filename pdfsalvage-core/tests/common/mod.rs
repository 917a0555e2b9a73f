//! Shared helpers for building test PDFs with real byte offsets

#![allow(dead_code)]

use std::fmt::Write as _;

/// Appends objects and cross-reference sections to a buffer
pub struct PdfBuilder {
    data: Vec<u8>,
    pending: Vec<(u32, u16, usize)>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::with_version("1.4")
    }

    pub fn with_version(version: &str) -> Self {
        Self {
            data: format!("%PDF-{version}\n%\u{e2}\u{e3}\n").into_bytes(),
            pending: Vec::new(),
        }
    }

    pub fn offset(&self) -> usize {
        self.data.len()
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    /// `number 0 obj body endobj`; returns the offset of the header
    pub fn object(&mut self, number: u32, body: &str) -> usize {
        let offset = self.offset();
        write!(self, "{number} 0 obj\n{body}\nendobj\n");
        self.pending.push((number, 0, offset));
        offset
    }

    /// Stream object with the given raw `/Length` text and body bytes
    pub fn stream_with_length(
        &mut self,
        number: u32,
        length: &str,
        between: &[u8],
        payload: &[u8],
        after: &[u8],
    ) -> usize {
        let offset = self.offset();
        write!(self, "{number} 0 obj\n<< /Length {length} >>\nstream");
        self.data.extend_from_slice(between);
        self.data.extend_from_slice(payload);
        self.data.extend_from_slice(after);
        self.data.extend_from_slice(b"endstream\nendobj\n");
        self.pending.push((number, 0, offset));
        offset
    }

    /// Uncompressed `/Type /ObjStm` container
    pub fn object_stream(&mut self, number: u32, members: &[(u32, &str)]) -> usize {
        let mut header = String::new();
        let mut body = String::new();
        for (member, value) in members {
            write!(header, "{member} {} ", body.len()).ok();
            body.push_str(value);
            body.push(' ');
        }
        let payload = format!("{header}{body}");
        let offset = self.offset();
        write!(
            self,
            "{number} 0 obj\n<< /Type /ObjStm /N {} /First {} /Length {} >>\nstream\n{payload}\nendstream\nendobj\n",
            members.len(),
            header.len(),
            payload.len()
        );
        self.pending.push((number, 0, offset));
        offset
    }

    /// Classic table for every object written since the last section.
    ///
    /// Returns the table offset; the footer points at it.
    pub fn classic_xref(&mut self, prev: Option<usize>, trailer: &str) -> usize {
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
        write!(table, " {trailer} >>\nstartxref\n{offset}\n%%EOF\n").ok();
        self.data.extend_from_slice(table.as_bytes());
        offset
    }

    /// Uncompressed cross-reference stream object `number`, then the footer
    pub fn xref_stream(
        &mut self,
        number: u32,
        widths: [usize; 3],
        index: &[u64],
        records: &[(u64, u64, u64)],
        trailer: &str,
    ) -> usize {
        let offset = self.offset();
        let mut payload = Vec::new();
        for &(kind, field1, field2) in records {
            for (value, width) in [kind, field1, field2].into_iter().zip(widths) {
                payload.extend_from_slice(&value.to_be_bytes()[8 - width..]);
            }
        }
        let index_text: Vec<String> = index.iter().map(u64::to_string).collect();
        let size = index
            .chunks(2)
            .map(|pair| pair[0] + pair.get(1).copied().unwrap_or(0))
            .max()
            .unwrap_or(0);
        write!(
            self,
            "{number} 0 obj\n<< /Type /XRef /Size {size} /W [{} {} {}] /Index [{}] /Length {} {trailer} >>\nstream\n",
            widths[0],
            widths[1],
            widths[2],
            index_text.join(" "),
            payload.len()
        );
        self.data.extend_from_slice(&payload);
        write!(self, "\nendstream\nendobj\nstartxref\n{offset}\n%%EOF\n");
        self.pending.clear();
        offset
    }

    pub fn finish(&self) -> Vec<u8> {
        self.data.clone()
    }

    fn write_fmt(&mut self, args: std::fmt::Arguments<'_>) {
        self.data.extend_from_slice(args.to_string().as_bytes());
    }
}

/// Catalog 1, Pages 2, then `pages` leaves numbered from 3
pub fn simple_document(pages: u32) -> Vec<u8> {
    let mut builder = PdfBuilder::new();
    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", i + 3)).collect();
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
            i + 3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>",
        );
    }
    builder.classic_xref(None, "/Root 1 0 R");
    builder.finish()
}
