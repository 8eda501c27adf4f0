use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

/// MPD's per-queue-entry song id.
pub type SongId = u32;

/// What is currently shown.  Compared tick to tick to decide whether the
/// label must be rebuilt and the scroll reset.
///
/// A track's identity covers its tags as well as its song id: a stream
/// keeps one song id while its title changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Identity {
    /// Nothing loaded, or playback stopped.
    #[default]
    Stopped,
    Track { id: SongId, tags: u64 },
}

impl Identity {
    pub fn track(id: SongId, fields: &TrackFields) -> Self {
        let mut hasher = DefaultHasher::new();
        fields.hash(&mut hasher);
        Identity::Track {
            id,
            tags: hasher.finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
    #[default]
    Stopped,
}

impl PlaybackState {
    /// Parse the `state:` value of an MPD status response.  Anything other
    /// than `play` or `pause` counts as stopped.
    pub fn from_mpd(value: &str) -> Self {
        match value {
            "play" => PlaybackState::Playing,
            "pause" => PlaybackState::Paused,
            _ => PlaybackState::Stopped,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Stopped => "stopped",
        }
    }
}

/// Snapshot of the player as reported by one status request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Status {
    pub playback_state: PlaybackState,
    /// Song id while playing or paused, `None` when stopped.
    pub track_identity: Option<SongId>,
    pub elapsed: Duration,
    pub total_duration: Duration,
    /// Zero-based position in the queue, if a song is selected.
    pub queue_position: Option<u32>,
    pub queue_length: u32,
    pub repeat: bool,
    pub shuffle: bool,
}

impl Status {
    /// Build from the `key: value` pairs of an MPD `status` response.
    ///
    /// `elapsed`/`duration` take precedence over the legacy integer
    /// `time: <elapsed>:<total>` field.  The song id is only kept while
    /// playing or paused; MPD still reports `songid` for a stopped player.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut status = Status::default();
        let mut song_id: Option<SongId> = None;
        let mut elapsed: Option<Duration> = None;
        let mut duration: Option<Duration> = None;
        let mut legacy_time: Option<(Duration, Duration)> = None;

        for (key, value) in pairs {
            match key {
                "state" => status.playback_state = PlaybackState::from_mpd(value),
                "songid" => song_id = value.parse().ok(),
                "song" => status.queue_position = value.parse().ok(),
                "playlistlength" => status.queue_length = value.parse().unwrap_or(0),
                "repeat" => status.repeat = value == "1",
                "random" => status.shuffle = value == "1",
                "elapsed" => elapsed = parse_seconds(value),
                "duration" => duration = parse_seconds(value),
                "time" => {
                    legacy_time = value.split_once(':').and_then(|(e, t)| {
                        Some((parse_seconds(e)?, parse_seconds(t)?))
                    })
                }
                _ => {}
            }
        }

        status.elapsed = elapsed
            .or(legacy_time.map(|(e, _)| e))
            .unwrap_or_default();
        status.total_duration = duration
            .or(legacy_time.map(|(_, t)| t))
            .unwrap_or_default();
        status.track_identity = match status.playback_state {
            PlaybackState::Stopped => None,
            _ => song_id,
        };
        status
    }

    pub fn remaining(&self) -> Duration {
        self.total_duration.saturating_sub(self.elapsed)
    }
}

fn parse_seconds(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

/// Tag values substituted into the label template.  Absent tags are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TrackFields {
    pub title: String,
    pub artist: String,
    pub album: String,
}

impl TrackFields {
    /// Build from the `key: value` pairs of an MPD song response.  Only the
    /// first value of a repeated tag is kept.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut fields = TrackFields::default();
        for (key, value) in pairs {
            let slot = match key {
                "Title" => &mut fields.title,
                "Artist" => &mut fields.artist,
                "Album" => &mut fields.album,
                _ => continue,
            };
            if slot.is_empty() {
                slot.push_str(value);
            }
        }
        fields
    }

    /// Value for a template placeholder name, `None` if the name is unknown.
    pub fn get(&self, name: &str) -> Option<&str> {
        match name {
            "title" => Some(&self.title),
            "artist" => Some(&self.artist),
            "album" => Some(&self.album),
            _ => None,
        }
    }
}

/// Playback commands accepted on stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Previous,
    Next,
    TogglePause,
    SeekForward(u32),
    SeekBackward(u32),
}

impl PlayerCommand {
    /// Parse one input line.  Accepts the bar button numbers `1`..`5` and
    /// their word aliases; anything else yields `None`.
    pub fn parse_input(line: &str, seek_seconds: u32) -> Option<Self> {
        match line.trim() {
            "1" | "prev" | "previous" => Some(PlayerCommand::Previous),
            "2" | "toggle" => Some(PlayerCommand::TogglePause),
            "3" | "next" => Some(PlayerCommand::Next),
            "4" | "ff" => Some(PlayerCommand::SeekForward(seek_seconds)),
            "5" | "rew" => Some(PlayerCommand::SeekBackward(seek_seconds)),
            _ => None,
        }
    }
}
