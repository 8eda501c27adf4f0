use tracing::debug;

use crate::config::DisplayConfig;
use crate::label::{self, LabelTemplate};
use crate::protocol::{Identity, TrackFields};
use crate::scroll::{advance_window, window_at, ScrollSource};

/// How the current label is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollMode {
    /// Nothing playing; the window is empty.
    Stopped,
    /// Label fits in the display width and is shown as is.
    Static,
    /// Label is wider than the display and scrolls every tick.
    Scrolling,
}

/// Label and scroll position for whatever is currently playing.
///
/// Owned by the core loop.  `padded` exists exactly when the full label is
/// wider than `width`; it is rebuilt together with the label, so its cached
/// code-point length always matches its text.
#[derive(Debug, Clone)]
pub struct LabelState {
    template: LabelTemplate,
    separator: String,
    width: usize,
    step: usize,
    identity: Identity,
    full_label: String,
    padded: Option<ScrollSource>,
    cursor: usize,
}

impl LabelState {
    pub fn new(template: LabelTemplate, separator: impl Into<String>, width: usize, step: usize) -> Self {
        debug_assert!(width > 0, "display width must be positive");
        Self {
            template,
            separator: separator.into(),
            width,
            step,
            identity: Identity::Stopped,
            full_label: String::new(),
            padded: None,
            cursor: 0,
        }
    }

    pub fn from_config(display: &DisplayConfig) -> Self {
        Self::new(
            LabelTemplate::new(display.template.clone()),
            display.separator.clone(),
            display.width,
            display.step,
        )
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn full_label(&self) -> &str {
        &self.full_label
    }

    pub fn padded_label(&self) -> Option<&str> {
        self.padded.as_ref().map(ScrollSource::as_str)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn mode(&self) -> ScrollMode {
        match (self.identity, &self.padded) {
            (Identity::Stopped, _) => ScrollMode::Stopped,
            (_, Some(_)) => ScrollMode::Scrolling,
            (_, None) => ScrollMode::Static,
        }
    }

    /// True when `identity` differs from the one the label was built for.
    /// When false, [`observe`](Self::observe) would leave everything as is.
    pub fn needs_rebuild(&self, identity: Identity) -> bool {
        self.identity != identity
    }

    /// Record the identity seen on this refresh.  On a change the label and
    /// padded label are rebuilt from `fields` and the cursor goes back to 0.
    /// Returns whether anything changed.
    pub fn observe(&mut self, identity: Identity, fields: &TrackFields) -> bool {
        let (label, changed) = label::build(
            &self.template,
            fields,
            &self.identity,
            &identity,
            &self.full_label,
        );
        if !changed {
            return false;
        }
        let label = label.into_owned();

        let before = (self.mode(), self.identity);
        self.padded = (label.chars().count() > self.width)
            .then(|| ScrollSource::padded(&label, &self.separator));
        self.full_label = label;
        self.identity = identity;
        self.cursor = 0;
        debug!(
            "label: {:?} {:?} -> {:?} {:?}: {:?}",
            before.1,
            before.0,
            self.identity,
            self.mode(),
            self.full_label
        );
        true
    }

    /// Window for a ticker tick.  Advances the cursor while scrolling.
    pub fn tick(&mut self) -> String {
        match &self.padded {
            Some(source) => {
                let window = advance_window(source, self.cursor, self.width, self.step);
                self.cursor = window.next_cursor;
                window.text
            }
            None => self.full_label.clone(),
        }
    }

    /// Window at the current cursor, leaving it where it is.  Used for
    /// refreshes triggered by commands.
    pub fn peek(&self) -> String {
        match &self.padded {
            Some(source) => window_at(source, self.cursor, self.width),
            None => self.full_label.clone(),
        }
    }
}
