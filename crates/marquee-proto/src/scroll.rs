//! Circular, code-point-aware text windows.
//!
//! A [`ScrollSource`] carries the text together with its code-point length, so
//! the two are always computed from the same string. [`advance_window`] cuts a
//! fixed-width window out of the source at a cursor, wrapping from the tail
//! back to the head when the window runs past the end.
//!
//! Byte offsets are only ever taken from `char_indices`, so a window can never
//! end in the middle of a multi-byte code point.

/// Text to scroll over plus its length in code points.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrollSource {
    text: String,
    len: usize,
}

impl ScrollSource {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let len = text.chars().count();
        Self { text, len }
    }

    /// `label` followed by `separator`: the source used while a label scrolls,
    /// so the tail and the next lap are visibly apart.
    pub fn padded(label: &str, separator: &str) -> Self {
        let mut text = String::with_capacity(label.len() + separator.len());
        text.push_str(label);
        text.push_str(separator);
        Self::new(text)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in code points (not bytes).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// One rendered window and the cursor to use on the following tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub text: String,
    pub next_cursor: usize,
}

/// Window of `width` code points starting at `cursor`, then step the cursor.
///
/// The cursor is reduced modulo the source length before use, and
/// `next_cursor` is that reduced value plus `step`. Reduction of the returned
/// cursor is left to the next call.
pub fn advance_window(source: &ScrollSource, cursor: usize, width: usize, step: usize) -> Window {
    let cursor = if source.is_empty() {
        cursor
    } else {
        cursor % source.len()
    };
    Window {
        text: window_at(source, cursor, width),
        next_cursor: cursor.saturating_add(step),
    }
}

/// Window of `width` code points starting at `cursor`, without stepping.
///
/// A source that already fits in `width` is returned whole and never wraps.
pub fn window_at(source: &ScrollSource, cursor: usize, width: usize) -> String {
    debug_assert!(width > 0, "scroll window width must be positive");
    debug_assert!(!source.is_empty(), "scroll source must not be empty");
    let len = source.len();
    if len == 0 || width == 0 {
        return String::new();
    }
    if len <= width {
        return source.text.clone();
    }

    let text = source.as_str();
    let cursor = cursor % len;
    let start = byte_offset(text, cursor);

    if cursor + width > len {
        // Tail of the source, then enough of the head to fill the window.
        let head = byte_offset(text, width - (len - cursor));
        let mut window = String::with_capacity(text.len() - start + head);
        window.push_str(&text[start..]);
        window.push_str(&text[..head]);
        window
    } else {
        let end = start + byte_offset(&text[start..], width);
        text[start..end].to_string()
    }
}

/// Byte index of the `n`th code point of `text`, or `text.len()` past the end.
fn byte_offset(text: &str, n: usize) -> usize {
    text.char_indices().nth(n).map_or(text.len(), |(idx, _)| idx)
}
