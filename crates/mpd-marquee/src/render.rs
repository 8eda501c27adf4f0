//! Status line formatting.

use marquee_proto::config::{IconConfig, OutputFormat};
use marquee_proto::protocol::{PlaybackState, Status};
use serde::Serialize;

/// Everything one status line is made of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine<'a> {
    pub play_icon: &'a str,
    pub state_markers: String,
    pub window_text: &'a str,
    pub remaining_minutes: u64,
    pub remaining_seconds: u64,
    /// One-based.
    pub queue_position: u32,
    pub queue_length: u32,
}

impl<'a> StatusLine<'a> {
    pub fn new(status: &Status, window_text: &'a str, icons: &'a IconConfig) -> Self {
        let play_icon = match status.playback_state {
            PlaybackState::Playing => icons.play.as_str(),
            PlaybackState::Paused => icons.pause.as_str(),
            PlaybackState::Stopped => icons.stop.as_str(),
        };

        let mut state_markers = String::new();
        if status.repeat {
            state_markers.push_str(&icons.repeat);
        }
        if status.shuffle {
            state_markers.push_str(&icons.random);
        }

        let remaining = status.remaining().as_secs();
        Self {
            play_icon,
            state_markers,
            window_text,
            remaining_minutes: remaining / 60,
            remaining_seconds: remaining % 60,
            queue_position: status.queue_position.map_or(0, |p| p + 1),
            queue_length: status.queue_length,
        }
    }

    pub fn plain(&self) -> String {
        format!(
            "{}{} {} (-{}:{:02}) [{}/{}]",
            self.play_icon,
            self.state_markers,
            self.window_text,
            self.remaining_minutes,
            self.remaining_seconds,
            self.queue_position,
            self.queue_length
        )
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    text: &'a str,
    tooltip: &'a str,
    class: &'a str,
}

/// Turns core output into lines in the configured format.
pub struct Renderer {
    format: OutputFormat,
    icons: IconConfig,
}

impl Renderer {
    pub fn new(format: OutputFormat, icons: IconConfig) -> Self {
        Self { format, icons }
    }

    /// Line for a playing or paused track.
    pub fn status(&self, status: &Status, window: &str, full_label: &str) -> String {
        let line = StatusLine::new(status, window, &self.icons).plain();
        match self.format {
            OutputFormat::Plain => line,
            OutputFormat::Json => json_line(&line, full_label, status.playback_state.as_str()),
        }
    }

    /// Line while nothing is playing.
    pub fn stopped(&self) -> String {
        self.blank(PlaybackState::Stopped.as_str())
    }

    /// Line for a tick where the player could not be reached.
    pub fn unavailable(&self) -> String {
        self.blank("unavailable")
    }

    fn blank(&self, class: &str) -> String {
        match self.format {
            OutputFormat::Plain => String::new(),
            OutputFormat::Json => json_line("", "", class),
        }
    }
}

fn json_line(text: &str, tooltip: &str, class: &str) -> String {
    serde_json::to_string(&JsonLine {
        text,
        tooltip,
        class,
    })
    .unwrap_or_default()
}
