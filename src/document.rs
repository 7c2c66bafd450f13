// Copyright (C) 2025  Tom Waddington
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Editor interfaces driven by typing sessions
//!
//! Positions are counted in chars, not bytes.

/// The text the animation mutates. Only ever appended to or truncated at the end.
pub trait Document {
    fn insert_at_end(&mut self, text: &str);
    fn delete_range(&mut self, from: usize, to: usize);
    fn len(&self) -> usize;
    fn text(&self) -> String;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self) {
        let len = self.len();
        if len > 0 {
            self.delete_range(0, len);
        }
    }

    fn delete_last(&mut self) {
        let len = self.len();
        if len > 0 {
            self.delete_range(len - 1, len);
        }
    }

    /// Zero-based index of the last line, which is where typing happens.
    fn last_line(&self) -> usize {
        self.text().matches('\n').count()
    }
}

/// Visual-only markers for the active line and cursor.
pub trait Decorations {
    fn set_active_line(&mut self, line: usize);
    fn set_cursor_marker(&mut self, position: usize);
}

/// In-memory document. Used for export frames, tests, and as the model behind the terminal view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buffer {
    text: String,
    chars: usize,
    active_line: usize,
    cursor: usize,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn active_line(&self) -> usize {
        self.active_line
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.split('\n')
    }

    fn byte_offset(&self, pos: usize) -> usize {
        self.text
            .char_indices()
            .nth(pos)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }
}

impl Document for Buffer {
    fn insert_at_end(&mut self, text: &str) {
        self.text.push_str(text);
        self.chars += text.chars().count();
    }

    fn delete_range(&mut self, from: usize, to: usize) {
        let to = to.min(self.chars);
        if from >= to {
            return;
        }
        let start = self.byte_offset(from);
        let end = self.byte_offset(to);
        self.text.replace_range(start..end, "");
        self.chars -= to - from;
    }

    fn len(&self) -> usize {
        self.chars
    }

    fn text(&self) -> String {
        self.text.clone()
    }

    fn last_line(&self) -> usize {
        self.text.matches('\n').count()
    }
}

impl Decorations for Buffer {
    fn set_active_line(&mut self, line: usize) {
        self.active_line = line;
    }

    fn set_cursor_marker(&mut self, position: usize) {
        self.cursor = position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_delete_last() {
        let mut buf = Buffer::new();
        buf.insert_at_end("ab");
        buf.insert_at_end("X");
        assert_eq!(buf.len(), 3);
        buf.delete_last();
        assert_eq!(buf.as_str(), "ab");
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_delete_range_is_char_based() {
        let mut buf = Buffer::new();
        buf.insert_at_end("a→é");
        buf.delete_range(1, 2);
        assert_eq!(buf.as_str(), "aé");
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_delete_range_out_of_bounds_is_clamped() {
        let mut buf = Buffer::new();
        buf.insert_at_end("abc");
        buf.delete_range(2, 10);
        assert_eq!(buf.as_str(), "ab");
        buf.delete_range(5, 9);
        assert_eq!(buf.as_str(), "ab");
    }

    #[test]
    fn test_clear_and_delete_last_on_empty() {
        let mut buf = Buffer::new();
        buf.delete_last();
        buf.insert_at_end("x\ny");
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.as_str(), "");
    }

    #[test]
    fn test_last_line() {
        let mut buf = Buffer::new();
        assert_eq!(buf.last_line(), 0);
        buf.insert_at_end("a\nb\n");
        assert_eq!(buf.last_line(), 2);
        assert_eq!(buf.lines().collect::<Vec<_>>(), vec!["a", "b", ""]);
    }
}
