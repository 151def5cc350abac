//! Line/column lookup for a source string.
//!
//! Input byte offsets are clamped down to a UTF-8 char boundary.
//! The column is a Rust `char` count (Unicode scalar values), not bytes or UTF-16.
//! Lines are split on `\n`, so a CRLF sequence counts as a single line break.

pub struct SourceMap<'a> {
    src: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> SourceMap<'a> {
    pub fn new(src: &'a str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in src.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { src, line_starts }
    }

    /// Return `(line, col)`, both 1-based.
    /// `byte` is a UTF-8 byte offset into `src`.
    pub fn line_col(&self, byte: u32) -> (u32, u32) {
        let b = clamp_to_char_boundary(self.src, byte as usize);
        let line_idx = match self.line_starts.binary_search(&b) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let line_start = self.line_starts[line_idx];
        let col = self.src[line_start..b].chars().count();
        (line_idx as u32 + 1, col as u32 + 1)
    }

    /// Byte offset of the start of a 1-based line, clamped to the last line.
    pub fn line_start(&self, line: u32) -> u32 {
        let idx = (line.saturating_sub(1) as usize).min(self.line_starts.len() - 1);
        self.line_starts[idx] as u32
    }

    pub fn line_count(&self) -> u32 {
        self.line_starts.len() as u32
    }
}

fn clamp_to_char_boundary(source: &str, mut byte: usize) -> usize {
    if byte > source.len() {
        byte = source.len();
    }
    while !source.is_char_boundary(byte) {
        byte = byte.saturating_sub(1);
    }
    byte
}
