//! Label templates: `{title}`, `{artist}` and `{album}` placeholders
//! substituted from the current track's tags.

use std::borrow::Cow;

use crate::protocol::{Identity, TrackFields};

pub const PLACEHOLDERS: [&str; 3] = ["title", "artist", "album"];
pub const DEFAULT_TEMPLATE: &str = "{title} - {artist}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTemplate {
    raw: String,
}

impl LabelTemplate {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Substitute every known placeholder in one left-to-right pass.
    ///
    /// Substituted values are never scanned again, so a title containing
    /// `{artist}` stays literal.  Unknown `{names}` are copied verbatim.
    pub fn render(&self, fields: &TrackFields) -> String {
        let mut out = String::with_capacity(self.raw.len() + 32);
        let mut rest = self.raw.as_str();
        loop {
            let Some(open) = rest.find('{') else {
                out.push_str(rest);
                break;
            };
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let value = after
                .find('}')
                .and_then(|close| fields.get(&after[..close]).map(|v| (close, v)));
            match value {
                Some((close, v)) => {
                    out.push_str(v);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out
    }

    /// `{name}` tokens that are not known placeholders.  They render
    /// verbatim; callers may surface them as a diagnostic.
    pub fn unknown_placeholders(&self) -> Vec<&str> {
        let mut unknown = Vec::new();
        let mut rest = self.raw.as_str();
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            match after.find(['{', '}']) {
                Some(close) if after[close..].starts_with('}') => {
                    let name = &after[..close];
                    if !PLACEHOLDERS.contains(&name) {
                        unknown.push(name);
                    }
                    rest = &after[close + 1..];
                }
                _ => rest = after,
            }
        }
        unknown
    }
}

impl Default for LabelTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

/// Produce the full label for `new`, reusing `current` when the identity
/// has not changed since `previous`.
///
/// Returns the label and whether it was rebuilt.  The stopped sentinel
/// always maps to an empty label.
pub fn build<'a>(
    template: &LabelTemplate,
    fields: &TrackFields,
    previous: &Identity,
    new: &Identity,
    current: &'a str,
) -> (Cow<'a, str>, bool) {
    if previous == new {
        return (Cow::Borrowed(current), false);
    }
    let label = match new {
        Identity::Stopped => String::new(),
        Identity::Track { .. } => template.render(fields),
    };
    (Cow::Owned(label), true)
}
