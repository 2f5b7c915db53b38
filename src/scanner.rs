/// Line access and character classification shared by the block and inline parsers
use std::borrow::Cow;

/// Tabs advance to the next multiple of this many columns.
pub const TAB_STOP: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct Scanner<'a> {
    text: &'a str,
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Scanner { text }
    }

    /// Lines of the input with their terminators stripped.
    ///
    /// `\n`, `\r\n` and a lone `\r` all end a line. A terminator at the very
    /// end of the input does not produce a trailing empty line.
    pub fn lines(&self) -> Lines<'a> {
        Lines {
            text: self.text,
            offset: 0,
            number: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// Zero-based line index.
    pub number: usize,
    /// Byte offset of the first character of the line in the input.
    pub start: usize,
    pub text: &'a str,
}

#[derive(Debug, Clone)]
pub struct Lines<'a> {
    text: &'a str,
    offset: usize,
    number: usize,
}

impl<'a> Iterator for Lines<'a> {
    type Item = Line<'a>;

    fn next(&mut self) -> Option<Line<'a>> {
        if self.offset >= self.text.len() {
            return None;
        }
        let rest = &self.text[self.offset..];
        let (len, terminator) = match rest.find(['\n', '\r']) {
            Some(pos) if rest[pos..].starts_with("\r\n") => (pos, 2),
            Some(pos) => (pos, 1),
            None => (rest.len(), 0),
        };
        let line = Line {
            number: self.number,
            start: self.offset,
            text: &rest[..len],
        };
        self.offset += len + terminator;
        self.number += 1;
        Some(line)
    }
}

/// A column-aware position inside one line.
///
/// Tabs may be consumed partially: stripping two columns of list-item indent
/// from a tab leaves the remaining columns as virtual spaces.
#[derive(Debug, Clone)]
pub struct LineCursor<'a> {
    text: &'a str,
    offset: usize,
    column: usize,
    partial_tab: usize,
}

impl<'a> LineCursor<'a> {
    pub fn new(text: &'a str) -> Self {
        LineCursor {
            text,
            offset: 0,
            column: 0,
            partial_tab: 0,
        }
    }

    pub fn column(&self) -> usize {
        self.column
    }

    fn after_partial(&self) -> &'a str {
        if self.partial_tab > 0 {
            &self.text[self.offset + 1..]
        } else {
            &self.text[self.offset..]
        }
    }

    /// Columns of whitespace between the cursor and the next other character.
    pub fn indent(&self) -> usize {
        let mut width = self.partial_tab;
        let mut column = self.column + self.partial_tab;
        for ch in self.after_partial().chars() {
            match ch {
                ' ' => {
                    width += 1;
                    column += 1;
                }
                '\t' => {
                    let step = TAB_STOP - column % TAB_STOP;
                    width += step;
                    column += step;
                }
                _ => break,
            }
        }
        width
    }

    pub fn peek(&self) -> Option<char> {
        if self.partial_tab > 0 {
            Some(' ')
        } else {
            self.text[self.offset..].chars().next()
        }
    }

    /// First character after the indentation.
    pub fn peek_nonspace(&self) -> Option<char> {
        self.after_partial()
            .trim_start_matches(is_space_or_tab)
            .chars()
            .next()
    }

    pub fn is_blank(&self) -> bool {
        self.after_partial().chars().all(is_space_or_tab)
    }

    /// Consume up to `count` columns of spaces and tabs.
    pub fn advance_columns(&mut self, mut count: usize) {
        while count > 0 {
            if self.partial_tab > 0 {
                let take = count.min(self.partial_tab);
                self.partial_tab -= take;
                self.column += take;
                count -= take;
                if self.partial_tab == 0 {
                    self.offset += 1;
                }
                continue;
            }
            match self.text[self.offset..].chars().next() {
                Some(' ') => {
                    self.offset += 1;
                    self.column += 1;
                    count -= 1;
                }
                Some('\t') => {
                    let step = TAB_STOP - self.column % TAB_STOP;
                    if step <= count {
                        self.offset += 1;
                        self.column += step;
                        count -= step;
                    } else {
                        self.partial_tab = step - count;
                        self.column += count;
                        count = 0;
                    }
                }
                _ => break,
            }
        }
    }

    pub fn skip_indent(&mut self) {
        let indent = self.indent();
        self.advance_columns(indent);
    }

    /// Step over one character that is not a partially consumed tab.
    pub fn advance_char(&mut self) {
        if self.partial_tab > 0 {
            self.advance_columns(1);
            return;
        }
        if let Some(ch) = self.text[self.offset..].chars().next() {
            self.offset += ch.len_utf8();
            self.column += 1;
        }
    }

    /// Everything from the cursor to the end of the line.
    pub fn rest(&self) -> Cow<'a, str> {
        if self.partial_tab > 0 {
            Cow::Owned(format!(
                "{}{}",
                " ".repeat(self.partial_tab),
                &self.text[self.offset + 1..]
            ))
        } else {
            Cow::Borrowed(&self.text[self.offset..])
        }
    }
}

pub fn is_space_or_tab(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Characters that can be backslash-escaped.
pub fn is_ascii_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
}

/// Punctuation for emphasis flanking: ASCII punctuation plus the common
/// Unicode punctuation and symbol blocks.
pub fn is_punctuation(c: char) -> bool {
    if c.is_ascii() {
        return c.is_ascii_punctuation();
    }
    matches!(c as u32,
        // Latin-1 punctuation and symbols, multiplication and division signs
        0x00A1..=0x00BF | 0x00D7 | 0x00F7 |
        // General Punctuation, currency symbols
        0x2000..=0x206F | 0x20A0..=0x20CF |
        // Arrows, mathematical operators, technical symbols
        0x2190..=0x23FF |
        // Box drawing through dingbats and math symbol blocks
        0x2500..=0x27FF | 0x2900..=0x29FF | 0x2B00..=0x2BFF |
        // Supplemental punctuation, CJK symbols and punctuation
        0x2E00..=0x2E7F | 0x3000..=0x303F |
        // Fullwidth ASCII punctuation
        0xFF01..=0xFF0F | 0xFF1A..=0xFF20 | 0xFF3B..=0xFF40 | 0xFF5B..=0xFF65
    )
}
