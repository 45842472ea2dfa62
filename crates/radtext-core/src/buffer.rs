//! The document under edit: a string plus a caret offset.
//!
//! Offsets are character (Unicode scalar) indices, never bytes, so accented
//! report text can be edited without landing inside a code point.

use serde::{Deserialize, Serialize};
use std::ops::Range;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
    cursor: usize,
}

/// Word and character counts plus a rough completion gauge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportStats {
    pub words: usize,
    pub characters: usize,
    /// 0..=100, one point per word
    pub progress: u8,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer holding `text` with the cursor at its end
    pub fn from_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            cursor: text.chars().count(),
        }
    }

    /// Buffer holding `text` with the cursor clamped into bounds
    pub fn with_cursor(text: &str, cursor: usize) -> Self {
        let mut buffer = Self::from_text(text);
        buffer.set_cursor(cursor);
        buffer
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len_chars(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor.min(self.len_chars());
    }

    /// Replace the whole document
    pub fn set_content(&mut self, text: &str, cursor: usize) {
        self.text = text.to_string();
        self.set_cursor(cursor);
    }

    /// Convert char offset to byte offset
    fn char_to_byte(&self, char_offset: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_offset)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }

    pub fn text_before_cursor(&self) -> &str {
        &self.text[..self.char_to_byte(self.cursor)]
    }

    pub fn text_after_cursor(&self) -> &str {
        &self.text[self.char_to_byte(self.cursor)..]
    }

    pub fn char_before_cursor(&self) -> Option<char> {
        self.text_before_cursor().chars().next_back()
    }

    /// Insert at the cursor and move the cursor past the inserted text
    pub fn insert_str(&mut self, text: &str) {
        let byte_offset = self.char_to_byte(self.cursor);
        self.text.insert_str(byte_offset, text);
        self.cursor += text.chars().count();
    }

    pub fn insert_char(&mut self, ch: char) {
        let byte_offset = self.char_to_byte(self.cursor);
        self.text.insert(byte_offset, ch);
        self.cursor += 1;
    }

    /// Replace a char range and place the cursor at `cursor`
    pub fn replace_range(&mut self, range: Range<usize>, replacement: &str, cursor: usize) {
        let start = self.char_to_byte(range.start);
        let end = self.char_to_byte(range.end.max(range.start));
        self.text.replace_range(start..end, replacement);
        self.set_cursor(cursor);
    }

    /// Append at the end of the document, leaving the cursor at the new end
    pub fn append(&mut self, text: &str) {
        self.text.push_str(text);
        self.cursor = self.len_chars();
    }

    /// Remove the char before the cursor; false at the start of the document
    pub fn delete_backward(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let start = self.char_to_byte(self.cursor - 1);
        let end = self.char_to_byte(self.cursor);
        self.text.replace_range(start..end, "");
        self.cursor -= 1;
        true
    }

    /// Remove the char after the cursor; false at the end of the document
    pub fn delete_forward(&mut self) -> bool {
        if self.cursor >= self.len_chars() {
            return false;
        }
        let start = self.char_to_byte(self.cursor);
        let end = self.char_to_byte(self.cursor + 1);
        self.text.replace_range(start..end, "");
        true
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.set_cursor(self.cursor + 1);
    }

    /// Move to the start of the current line
    pub fn move_line_start(&mut self) {
        let before = self.text_before_cursor();
        let line_len = before.rsplit('\n').next().unwrap_or("").chars().count();
        self.cursor -= line_len;
    }

    /// Move to the end of the current line
    pub fn move_line_end(&mut self) {
        let after = self.text_after_cursor();
        let line_len = after.split('\n').next().unwrap_or("").chars().count();
        self.cursor += line_len;
    }

    /// Move to the same column on the previous line, or to the start of the document
    pub fn move_up(&mut self) {
        let (line, column) = self.cursor_position();
        if line == 0 {
            self.cursor = 0;
        } else {
            self.move_to(line - 1, column);
        }
    }

    /// Move to the same column on the next line, or to the end of the document
    pub fn move_down(&mut self) {
        let (line, column) = self.cursor_position();
        if line >= self.text.matches('\n').count() {
            self.cursor = self.len_chars();
        } else {
            self.move_to(line + 1, column);
        }
    }

    /// Place the cursor at `column` of `line`, clamped to the line length
    fn move_to(&mut self, line: usize, column: usize) {
        let mut offset = 0;
        for (index, content) in self.text.split('\n').enumerate() {
            let len = content.chars().count();
            if index == line {
                self.cursor = offset + column.min(len);
                return;
            }
            offset += len + 1;
        }
    }

    /// Zero-based (line, column) of the cursor, column in chars
    pub fn cursor_position(&self) -> (usize, usize) {
        let before = self.text_before_cursor();
        let line = before.matches('\n').count();
        let column = before.rsplit('\n').next().unwrap_or("").chars().count();
        (line, column)
    }

    pub fn stats(&self) -> ReportStats {
        let words = self.text.split_whitespace().count();
        ReportStats {
            words,
            characters: self.len_chars(),
            progress: words.min(100) as u8,
        }
    }
}
