//! # Line/Caret Model
//!
//! Character-offset utilities for editable text regions. Offsets count
//! `char`s from the start of the buffer and are always clamped to
//! `[0, length]`, so none of these functions fail.
//!
//! UI toolkits plug in through [`EditableSurface`]. [`TextSurface`] is the
//! in-crate implementation: its buffer may be split across any number of
//! segments (the way rich text is split across mark-up nodes) and caret
//! placement walks those segments in order.

/// Capability exposed by an editable region
pub trait EditableSurface {
    fn get_text(&self) -> String;

    fn get_caret_offset(&self) -> usize;

    /// Place the caret, clamping to the buffer length
    fn set_caret_offset(&mut self, offset: usize);

    /// Splice `text` in at the caret and move the caret just after it
    fn insert_at_caret(&mut self, text: &str);

    /// Re-render the whole buffer. The caret keeps its offset, clamped.
    fn set_text(&mut self, text: &str);
}

/// Boundaries of the line containing a caret
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// Offset of the first character of the line
    pub start: usize,
    /// Offset of the line break ending the line, or the buffer length
    pub end: usize,
    pub text: &'a str,
}

impl Line<'_> {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Caret position relative to the line start
    pub fn column(&self, caret: usize) -> usize {
        caret.saturating_sub(self.start).min(self.end - self.start)
    }
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

pub fn clamp_offset(text: &str, offset: usize) -> usize {
    offset.min(char_len(text))
}

/// Byte index of a char offset (clamped)
pub fn byte_index(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map(|(index, _)| index)
        .unwrap_or(text.len())
}

/// Slice by char offsets
pub fn slice(text: &str, start: usize, end: usize) -> &str {
    let start = byte_index(text, start);
    let end = byte_index(text, end).max(start);
    &text[start..end]
}

/// The line containing `caret`
pub fn current_line(text: &str, caret: usize) -> Line<'_> {
    let caret_byte = byte_index(text, caret);

    let start_byte = text[..caret_byte].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let end_byte = text[caret_byte..]
        .find('\n')
        .map(|i| caret_byte + i)
        .unwrap_or(text.len());

    let start = char_len(&text[..start_byte]);
    let end = start + char_len(&text[start_byte..end_byte]);

    Line {
        start,
        end,
        text: &text[start_byte..end_byte],
    }
}

/// Index (0-based) of the line containing `caret`
pub fn line_index(text: &str, caret: usize) -> usize {
    let caret_byte = byte_index(text, caret);
    text[..caret_byte].matches('\n').count()
}

/// Insert `insert` at `offset`, returning the new buffer and the caret after it
pub fn insert_at(text: &str, offset: usize, insert: &str) -> (String, usize) {
    let offset = clamp_offset(text, offset);
    let at = byte_index(text, offset);

    let mut out = String::with_capacity(text.len() + insert.len());
    out.push_str(&text[..at]);
    out.push_str(insert);
    out.push_str(&text[at..]);

    (out, offset + char_len(insert))
}

/// Remove the chars in `[start, end)`
pub fn remove_range(text: &str, start: usize, end: usize) -> String {
    let start_byte = byte_index(text, start);
    let end_byte = byte_index(text, end).max(start_byte);

    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..start_byte]);
    out.push_str(&text[end_byte..]);
    out
}

/// Editable buffer split into segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSurface {
    segments: Vec<String>,
    /// (segment index, char offset inside that segment)
    caret: (usize, usize),
}

impl TextSurface {
    pub fn new(text: impl Into<String>) -> Self {
        Self::from_segments([text.into()])
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            segments.push(String::new());
        }

        Self {
            segments,
            caret: (0, 0),
        }
    }

    pub fn with_caret(mut self, offset: usize) -> Self {
        self.set_caret_offset(offset);
        self
    }

    /// Caret at the end of the buffer
    pub fn at_end(text: impl Into<String>) -> Self {
        let mut surface = Self::new(text);
        let len = char_len(&surface.get_text());
        surface.set_caret_offset(len);
        surface
    }

    #[cfg(test)]
    fn segment_count(&self) -> usize {
        self.segments.len()
    }
}

impl EditableSurface for TextSurface {
    fn get_text(&self) -> String {
        self.segments.concat()
    }

    fn get_caret_offset(&self) -> usize {
        let (segment, offset) = self.caret;
        self.segments[..segment]
            .iter()
            .map(|s| char_len(s))
            .sum::<usize>()
            + offset
    }

    fn set_caret_offset(&mut self, offset: usize) {
        let mut remaining = offset;

        for (index, segment) in self.segments.iter().enumerate() {
            let len = char_len(segment);
            if remaining <= len {
                self.caret = (index, remaining);
                return;
            }
            remaining -= len;
        }

        let last = self.segments.len() - 1;
        self.caret = (last, char_len(&self.segments[last]));
    }

    fn insert_at_caret(&mut self, text: &str) {
        let (segment, offset) = self.caret;
        let target = &mut self.segments[segment];
        let at = byte_index(target, offset);
        target.insert_str(at, text);
        self.caret = (segment, offset + char_len(text));
    }

    fn set_text(&mut self, text: &str) {
        let caret = self.get_caret_offset();
        self.segments = vec![text.to_string()];
        self.set_caret_offset(caret);
    }
}
