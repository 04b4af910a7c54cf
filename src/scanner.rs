//! Placeholder scanning over logical paragraph text.
//!
//! Grammar: `«` key `»`, where the key is one or more characters that are
//! neither delimiter nor line break. The scan is a single left-to-right pass
//! that closes on the first `»`. A `«` seen while a candidate is open
//! abandons that candidate and starts a new one; a line break or the end of
//! the text abandons it too. Abandoned candidates stay literal text.

use crate::xml::NodeId;
use std::str::CharIndices;

pub const OPEN: char = '«';
pub const CLOSE: char = '»';

/// A placeholder found in one paragraph. Offsets are character indices into
/// the paragraph's logical text; `end` is exclusive and includes `»`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderMatch {
    pub paragraph: NodeId,
    pub start: usize,
    pub end: usize,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScanEvent {
    Match(PlaceholderMatch),
    /// An opening delimiter that never closed, at this character index.
    Unterminated(usize),
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    char_index: usize,
    byte_index: usize,
}

/// Lazy scan over one paragraph's text. Clone it to restart from the same
/// point.
#[derive(Debug, Clone)]
pub struct Placeholders<'a> {
    paragraph: NodeId,
    text: &'a str,
    chars: CharIndices<'a>,
    index: usize,
    open: Option<Candidate>,
}

/// Scan `text` (the logical text of `paragraph`) for placeholders.
pub fn scan(paragraph: NodeId, text: &str) -> Placeholders<'_> {
    Placeholders {
        paragraph,
        text,
        chars: text.char_indices(),
        index: 0,
        open: None,
    }
}

impl<'a> Placeholders<'a> {
    fn next_event(&mut self) -> Option<ScanEvent> {
        while let Some((byte, ch)) = self.chars.next() {
            let index = self.index;
            self.index += 1;
            match ch {
                OPEN => {
                    let abandoned = self.open.replace(Candidate {
                        char_index: index,
                        byte_index: byte,
                    });
                    if let Some(prev) = abandoned {
                        return Some(ScanEvent::Unterminated(prev.char_index));
                    }
                }
                CLOSE => {
                    if let Some(open) = self.open.take() {
                        let key = &self.text[open.byte_index + OPEN.len_utf8()..byte];
                        // «» has no key and stays literal
                        if !key.is_empty() {
                            return Some(ScanEvent::Match(PlaceholderMatch {
                                paragraph: self.paragraph,
                                start: open.char_index,
                                end: index + 1,
                                key: key.to_string(),
                            }));
                        }
                    }
                }
                '\n' | '\r' => {
                    if let Some(open) = self.open.take() {
                        return Some(ScanEvent::Unterminated(open.char_index));
                    }
                }
                _ => {}
            }
        }
        self.open
            .take()
            .map(|open| ScanEvent::Unterminated(open.char_index))
    }

    /// Character indices of opening delimiters that never closed, consuming
    /// the scan.
    pub fn unterminated(mut self) -> Vec<usize> {
        let mut starts = Vec::new();
        while let Some(event) = self.next_event() {
            if let ScanEvent::Unterminated(start) = event {
                starts.push(start);
            }
        }
        starts
    }
}

impl Iterator for Placeholders<'_> {
    type Item = PlaceholderMatch;

    fn next(&mut self) -> Option<PlaceholderMatch> {
        loop {
            match self.next_event()? {
                ScanEvent::Match(m) => return Some(m),
                ScanEvent::Unterminated(_) => continue,
            }
        }
    }
}
