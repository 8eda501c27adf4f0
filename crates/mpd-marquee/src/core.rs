/// MarqueeCore: single-owner loop for the label state and the player link.
///
/// The core owns `LabelState`, the `MetadataSource` and the output writer;
/// nothing else touches them.  Ticks come from a deadline inside the loop,
/// commands and shutdown arrive as `MarqueeEvent`s over an mpsc channel, so a
/// command refresh and a tick can never interleave.
///
/// Tick cadence is `interval` minus the time the tick itself took.  The
/// cursor only moves on ticks; a refresh after a command redraws the current
/// window in place.
use std::time::Duration;

use marquee_proto::config::Config;
use marquee_proto::error::MarqueeError;
use marquee_proto::protocol::{Identity, PlayerCommand, TrackFields};
use marquee_proto::source::MetadataSource;
use marquee_proto::state::{LabelState, ScrollMode};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::render::Renderer;

// ── MarqueeEvent ──────────────────────────────────────────────────────────────

/// Inputs into the core loop other than the ticker.
#[derive(Debug)]
pub enum MarqueeEvent {
    /// A playback command from stdin.
    Command(PlayerCommand),
    /// Finish the current tick, then exit.
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Refresh {
    Tick,
    Command,
}

/// Sleep before the next tick so ticks start `interval` apart.
pub fn tick_delay(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

// ── MarqueeCore ───────────────────────────────────────────────────────────────

pub struct MarqueeCore<S, W> {
    source: S,
    out: W,
    state: LabelState,
    renderer: Renderer,
    interval: Duration,
    /// Consecutive polls that failed; only the first one is logged loudly.
    failures: u32,
}

impl<S, W> MarqueeCore<S, W>
where
    S: MetadataSource,
    W: AsyncWrite + Unpin,
{
    pub fn new(config: &Config, source: S, out: W) -> Self {
        Self {
            source,
            out,
            state: LabelState::from_config(&config.display),
            renderer: Renderer::new(config.display.format, config.icons.clone()),
            interval: config.display.interval(),
            failures: 0,
        }
    }

    /// Run until `Shutdown` arrives or every event sender is gone.  Errors
    /// only when stdout can no longer be written.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<MarqueeEvent>) -> anyhow::Result<()> {
        info!("core: starting tick loop, interval {:?}", self.interval);
        let mut next_tick = Instant::now();

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(next_tick) => {
                    let started = Instant::now();
                    self.refresh(Refresh::Tick).await?;
                    let delay = tick_delay(self.interval, started.elapsed());
                    if delay.is_zero() {
                        debug!("core: tick took longer than the interval");
                    }
                    next_tick = Instant::now() + delay;
                }

                evt = event_rx.recv() => match evt {
                    Some(MarqueeEvent::Command(cmd)) => self.handle_command(cmd).await?,
                    Some(MarqueeEvent::Shutdown) => {
                        info!("core: shutdown requested");
                        break;
                    }
                    None => {
                        info!("core: event channel closed, shutting down");
                        break;
                    }
                },
            }
        }

        self.out.flush().await?;
        Ok(())
    }

    async fn handle_command(&mut self, cmd: PlayerCommand) -> anyhow::Result<()> {
        info!("core: command {:?}", cmd);
        if let Err(e) = self.source.send_command(cmd).await {
            warn!("core: command {:?} failed: {}", cmd, e);
        }
        self.refresh(Refresh::Command).await
    }

    /// Poll the player and write one line.  A failed poll writes a blank
    /// line and leaves the label state as it was.
    async fn refresh(&mut self, kind: Refresh) -> anyhow::Result<()> {
        let line = match self.poll(kind).await {
            Ok(line) => {
                if self.failures > 0 {
                    info!("core: player reachable again after {} failed polls", self.failures);
                    self.failures = 0;
                }
                line
            }
            Err(e) => {
                self.failures += 1;
                if self.failures == 1 {
                    warn!("core: {}", e);
                } else {
                    debug!("core: {} (failure #{})", e, self.failures);
                }
                self.renderer.unavailable()
            }
        };
        self.emit(&line).await
    }

    async fn poll(&mut self, kind: Refresh) -> Result<String, MarqueeError> {
        let status = self.source.fetch_status().await?;

        // Tags are read every time: a stream changes its title without
        // changing its song id.
        let (identity, fields) = match status.track_identity {
            Some(id) => {
                let fields = self.source.fetch_metadata(id).await?;
                (Identity::track(id, &fields), fields)
            }
            None => (Identity::Stopped, TrackFields::default()),
        };
        if self.state.needs_rebuild(identity) {
            self.state.observe(identity, &fields);
        }

        let window = match kind {
            Refresh::Tick => self.state.tick(),
            Refresh::Command => self.state.peek(),
        };

        Ok(match self.state.mode() {
            ScrollMode::Stopped => self.renderer.stopped(),
            ScrollMode::Static | ScrollMode::Scrolling => {
                self.renderer
                    .status(&status, &window, self.state.full_label())
            }
        })
    }

    async fn emit(&mut self, line: &str) -> anyhow::Result<()> {
        let mut raw = String::with_capacity(line.len() + 1);
        raw.push_str(line);
        raw.push('\n');
        self.out.write_all(raw.as_bytes()).await?;
        self.out.flush().await?;
        Ok(())
    }
}
