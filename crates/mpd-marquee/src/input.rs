//! Playback commands read line by line from stdin.
//!
//! Reading runs on a plain OS thread: a blocking stdin read must not hold the
//! runtime open at shutdown.

use std::io::BufRead;

use marquee_proto::protocol::PlayerCommand;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::MarqueeEvent;

pub fn spawn_stdin_reader(seek_seconds: u32, event_tx: mpsc::Sender<MarqueeEvent>) {
    let spawned = std::thread::Builder::new()
        .name("stdin-commands".into())
        .spawn(move || read_commands(std::io::stdin().lock(), seek_seconds, &event_tx));
    if let Err(e) = spawned {
        warn!("input: could not start stdin reader, commands disabled: {}", e);
    }
}

/// Forward every recognised line as a command.  Lines that are not UTF-8
/// are unrecognised like any other.  Returns at end of input, on a read
/// error, or once the core has gone away.
pub fn read_commands<R: BufRead>(mut reader: R, seek_seconds: u32, event_tx: &mpsc::Sender<MarqueeEvent>) {
    let mut raw = Vec::new();
    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("input: read error: {}", e);
                return;
            }
        }
        let line = String::from_utf8_lossy(&raw);
        match PlayerCommand::parse_input(&line, seek_seconds) {
            Some(cmd) => {
                if event_tx.blocking_send(MarqueeEvent::Command(cmd)).is_err() {
                    debug!("input: core gone, stopping");
                    return;
                }
            }
            None => debug!("input: ignoring {:?}", line),
        }
    }
    info!("input: stdin closed, no more commands");
}
