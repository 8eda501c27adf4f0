mod core;
mod input;
mod mpd;
mod render;

use std::path::PathBuf;

use clap::Parser;
use marquee_proto::config::{Config, OutputFormat};
use marquee_proto::label::LabelTemplate;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::core::{MarqueeCore, MarqueeEvent};
use crate::mpd::MpdClient;

/// Scrolling "now playing" line for status bars, fed by MPD.
///
/// Writes one line per tick to stdout and reads playback commands
/// (1 prev, 2 toggle, 3 next, 4 seek forward, 5 seek back) from stdin.
/// Flags override the config file.
#[derive(Parser, Debug)]
#[command(name = "mpd-marquee", version)]
struct Args {
    /// Config file (default: ~/.config/mpd-marquee/config.toml).
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// MPD host, `password@host` or unix socket path.
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    password: Option<String>,
    /// Request timeout in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Tick interval in milliseconds.
    #[arg(long, short)]
    interval_ms: Option<u64>,
    /// Window width in characters.
    #[arg(long, short)]
    width: Option<usize>,
    /// Characters scrolled per tick.
    #[arg(long)]
    step: Option<usize>,
    /// Appended to a scrolling label before it wraps.
    #[arg(long)]
    separator: Option<String>,
    /// Label template, e.g. "{artist} - {title}".
    #[arg(long, short)]
    template: Option<String>,
    /// Seconds moved by the seek commands.
    #[arg(long)]
    seek_seconds: Option<u32>,
    /// Output format: plain or json.
    #[arg(long, short)]
    format: Option<OutputFormat>,
    /// Log file (default: ~/.local/share/mpd-marquee/marquee.log).
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.mpd.host = Some(host.clone());
        }
        if let Some(port) = self.port {
            config.mpd.port = Some(port);
        }
        if let Some(password) = &self.password {
            config.mpd.password = Some(password.clone());
        }
        if let Some(ms) = self.timeout_ms {
            config.mpd.timeout_ms = ms;
        }
        if let Some(ms) = self.interval_ms {
            config.display.interval_ms = ms;
        }
        if let Some(width) = self.width {
            config.display.width = width;
        }
        if let Some(step) = self.step {
            config.display.step = step;
        }
        if let Some(separator) = &self.separator {
            config.display.separator = separator.clone();
        }
        if let Some(template) = &self.template {
            config.display.template = template.clone();
        }
        if let Some(secs) = self.seek_seconds {
            config.display.seek_seconds = secs;
        }
        if let Some(format) = self.format {
            config.display.format = format;
        }
    }
}

/// stdout carries the status lines, so logs go to a file.
fn init_logging(log_path: PathBuf) -> anyhow::Result<PathBuf> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,mpd_marquee=debug")),
        )
        .init();

    Ok(log_path)
}

/// Non-fatal template problems, reported once at startup.
fn template_warnings(raw: &str) -> Vec<String> {
    LabelTemplate::new(raw)
        .unknown_placeholders()
        .into_iter()
        .map(|name| format!("template: unknown placeholder {{{}}} is shown verbatim", name))
        .collect()
}

/// Turn Ctrl-C / SIGTERM into a `Shutdown` event for the core.
fn spawn_signal_watcher(event_tx: mpsc::Sender<MarqueeEvent>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => info!("signal: SIGINT"),
                        _ = term.recv() => info!("signal: SIGTERM"),
                    }
                }
                Err(e) => {
                    warn!("signal: cannot watch SIGTERM: {}", e);
                    let _ = tokio::signal::ctrl_c().await;
                    info!("signal: SIGINT");
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            info!("signal: Ctrl-C");
        }
        let _ = event_tx.send(MarqueeEvent::Shutdown).await;
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_path = init_logging(
        args.log_file
            .clone()
            .unwrap_or_else(marquee_proto::platform::log_path),
    )?;
    info!("Log file: {:?}", log_path);

    let mut config = match &args.config {
        Some(path) => {
            let config = Config::load_from(path)?;
            info!("Config loaded from: {:?}", path);
            config
        }
        None => {
            let config = Config::load()?;
            info!("Config loaded from: {:?}", Config::config_path());
            config
        }
    };
    args.apply(&mut config);
    config.validate()?;

    for warning in template_warnings(&config.display.template) {
        warn!("{}", warning);
    }

    let endpoint = config.mpd.endpoint();
    info!("MPD at {}", endpoint.address);
    let client = MpdClient::new(endpoint, config.mpd.timeout());

    // Event channel: stdin commands and shutdown funnel into MarqueeCore
    let (event_tx, event_rx) = mpsc::channel::<MarqueeEvent>(32);
    input::spawn_stdin_reader(config.display.seek_seconds, event_tx.clone());
    spawn_signal_watcher(event_tx);

    MarqueeCore::new(&config, client, tokio::io::stdout())
        .run(event_rx)
        .await?;

    info!("Exiting");
    Ok(())
}
