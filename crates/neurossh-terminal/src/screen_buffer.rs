use std::sync::Arc;

use vt100::Parser;

/// Cell color as reported by the emulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Default,
    Indexed(u8),
    Rgb(u8, u8, u8),
}

impl From<vt100::Color> for Color {
    fn from(color: vt100::Color) -> Self {
        match color {
            vt100::Color::Default => Color::Default,
            vt100::Color::Idx(idx) => Color::Indexed(idx),
            vt100::Color::Rgb(r, g, b) => Color::Rgb(r, g, b),
        }
    }
}

/// Text attributes shared by a run of cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellStyle {
    pub fg: Color,
    pub bg: Color,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub inverse: bool,
}

impl CellStyle {
    fn of(cell: &vt100::Cell) -> Self {
        Self {
            fg: cell.fgcolor().into(),
            bg: cell.bgcolor().into(),
            bold: cell.bold(),
            italic: cell.italic(),
            underline: cell.underline(),
            inverse: cell.inverse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledSpan {
    pub text: String,
    pub style: CellStyle,
}

/// One screen row as consecutive spans of equal style
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StyledRow {
    pub spans: Vec<StyledSpan>,
}

impl StyledRow {
    /// Plain text of the row without trailing blanks
    pub fn text(&self) -> String {
        let mut text: String = self.spans.iter().map(|span| span.text.as_str()).collect();
        text.truncate(text.trim_end().len());
        text
    }
}

/// Immutable picture of the screen at one point in the byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenSnapshot {
    pub rows: Vec<StyledRow>,
    /// (row, col)
    pub cursor: (u16, u16),
    pub cursor_visible: bool,
    pub title: String,
    /// (rows, cols)
    pub size: (u16, u16),
}

impl ScreenSnapshot {
    pub fn row_text(&self, row: usize) -> Option<String> {
        self.rows.get(row).map(StyledRow::text)
    }

    /// Plain text of the whole screen; trailing empty rows are dropped
    pub fn text(&self) -> String {
        let mut lines: Vec<String> = self.rows.iter().map(StyledRow::text).collect();
        while lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
        lines.join("\n")
    }
}

/// Terminal screen state buffer
pub struct ScreenBuffer {
    parser: Parser,
    cols: u16,
    rows: u16,
    bytes_processed: u64,
    cached: Option<Arc<ScreenSnapshot>>,
}

impl std::fmt::Debug for ScreenBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenBuffer")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("bytes_processed", &self.bytes_processed)
            .finish()
    }
}

impl ScreenBuffer {
    /// Create a new screen buffer. Content scrolled off the top is discarded.
    pub fn new(rows: u16, cols: u16) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        Self {
            parser: Parser::new(rows, cols, 0),
            cols,
            rows,
            bytes_processed: 0,
            cached: None,
        }
    }

    /// Feed raw bytes from the connection to the VT100 parser.
    ///
    /// Sequences split across calls are completed by later calls; malformed
    /// sequences are discarded by the parser.
    pub fn process_output(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.parser.process(data);
        self.bytes_processed += data.len() as u64;
        self.cached = None;
    }

    /// Current screen, rebuilt only when bytes arrived since the last call
    pub fn snapshot(&mut self) -> Arc<ScreenSnapshot> {
        if let Some(cached) = &self.cached {
            return Arc::clone(cached);
        }
        let snapshot = Arc::new(self.build_snapshot());
        self.cached = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// Get cursor position (row, col)
    pub fn cursor_position(&self) -> (u16, u16) {
        self.parser.screen().cursor_position()
    }

    /// Get terminal size (rows, cols)
    pub fn size(&self) -> (u16, u16) {
        (self.rows, self.cols)
    }

    pub fn bytes_processed(&self) -> u64 {
        self.bytes_processed
    }

    fn build_snapshot(&self) -> ScreenSnapshot {
        let screen = self.parser.screen();
        let mut rows = Vec::with_capacity(self.rows as usize);

        for row in 0..self.rows {
            let mut spans: Vec<StyledSpan> = Vec::new();
            for col in 0..self.cols {
                let (text, style) = match screen.cell(row, col) {
                    // Wide character continuations are skipped
                    Some(cell) if cell.is_wide_continuation() => continue,
                    Some(cell) if cell.has_contents() => (cell.contents().to_string(), CellStyle::of(cell)),
                    Some(cell) => (" ".to_string(), CellStyle::of(cell)),
                    None => (" ".to_string(), CellStyle::default()),
                };
                match spans.last_mut() {
                    Some(last) if last.style == style => last.text.push_str(&text),
                    _ => spans.push(StyledSpan { text, style }),
                }
            }
            rows.push(StyledRow { spans });
        }

        ScreenSnapshot {
            rows,
            cursor: screen.cursor_position(),
            cursor_visible: !screen.hide_cursor(),
            title: screen.title().to_string(),
            size: (self.rows, self.cols),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hello_line_moves_cursor() {
        let mut buffer = ScreenBuffer::new(40, 120);
        buffer.process_output(b"Hello\r\n");
        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.row_text(0).as_deref(), Some("Hello"));
        assert_eq!(snapshot.cursor, (1, 0));
        assert_eq!(snapshot.rows.len(), 40);
    }

    #[test]
    fn test_snapshot_is_stable_without_new_data() {
        let mut buffer = ScreenBuffer::new(24, 80);
        buffer.process_output(b"\x1b[1;31mred\x1b[0m plain");
        let first = buffer.snapshot();
        let second = buffer.snapshot();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, *second);

        buffer.process_output(b"");
        assert!(Arc::ptr_eq(&first, &buffer.snapshot()));

        buffer.process_output(b"!");
        assert_eq!(buffer.snapshot().row_text(0).as_deref(), Some("red plain!"));
    }

    #[test]
    fn test_styles_are_batched_into_spans() {
        let mut buffer = ScreenBuffer::new(2, 20);
        buffer.process_output(b"\x1b[1;32mok\x1b[0m done");
        let snapshot = buffer.snapshot();
        let row = &snapshot.rows[0];
        assert_eq!(row.spans[0].text, "ok");
        assert!(row.spans[0].style.bold);
        assert_eq!(row.spans[0].style.fg, Color::Indexed(2));
        assert!(!row.spans[1].style.bold);
        assert!(row.spans[1].text.starts_with(" done"));
    }

    #[test]
    fn test_split_sequences_are_reassembled() {
        let mut buffer = ScreenBuffer::new(4, 20);
        buffer.process_output(b"ab\x1b[");
        buffer.process_output(b"2Jcd");
        buffer.process_output(&"é".as_bytes()[..1]);
        buffer.process_output(&"é".as_bytes()[1..]);
        let text = buffer.snapshot().text();
        assert!(text.contains("cdé"), "unexpected screen: {:?}", text);
        assert!(!text.contains('['));
    }

    #[test]
    fn test_malformed_input_does_not_halt_processing() {
        let mut buffer = ScreenBuffer::new(4, 20);
        buffer.process_output(b"\x1b[999;;;;zq\xff\xfe\x1b]0;unterminated");
        buffer.process_output(b"\x07still here");
        let snapshot = buffer.snapshot();
        assert!(snapshot.text().contains("still here"));
        assert_eq!(snapshot.rows.len(), 4);
    }

    #[test]
    fn test_scrolled_content_is_discarded() {
        let mut buffer = ScreenBuffer::new(3, 10);
        buffer.process_output(b"one\r\ntwo\r\nthree\r\nfour");
        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.text(), "two\nthree\nfour");
        assert_eq!(snapshot.cursor, (2, 4));
    }

    #[test]
    fn test_title_is_captured() {
        let mut buffer = ScreenBuffer::new(2, 10);
        buffer.process_output(b"\x1b]2;remote-host\x07");
        assert_eq!(buffer.snapshot().title, "remote-host");
    }
}
