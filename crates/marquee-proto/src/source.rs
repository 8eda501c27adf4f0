use crate::error::MarqueeError;
use crate::protocol::{PlayerCommand, SongId, Status, TrackFields};

/// The player the status line is about.
///
/// Every call may fail with [`MarqueeError::SourceUnavailable`]; the caller
/// skips that tick and tries again on the next one.
#[allow(async_fn_in_trait)]
pub trait MetadataSource {
    async fn fetch_status(&mut self) -> Result<Status, MarqueeError>;

    async fn fetch_metadata(&mut self, id: SongId) -> Result<TrackFields, MarqueeError>;

    async fn send_command(&mut self, command: PlayerCommand) -> Result<(), MarqueeError>;
}
