/// MPD client speaking the plain-text line protocol.
///
/// Architecture:
///
/// ```text
///   MpdClient (owned by MarqueeCore)
///         │
///         ├── dial()        ← TCP or unix socket, reads "OK MPD <version>",
///         │                   sends `password` when one is configured
///         └── request(cmd)  ← one command line out, `key: value` lines in
///                               until "OK" (success) or "ACK ..." (error)
/// ```
///
/// Every round trip, dialing included, runs under the configured timeout.
/// Any failure other than an `ACK` drops the connection; the next request
/// dials again.  Nothing is held across an error.
use marquee_proto::config::{MpdAddress, MpdEndpoint};
use marquee_proto::error::MarqueeError;
use marquee_proto::protocol::{PlayerCommand, SongId, Status, TrackFields};
use marquee_proto::source::MetadataSource;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

#[cfg(unix)]
use tokio::net::UnixStream;

#[derive(Debug, Error)]
pub enum MpdError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    #[error("connection closed by server")]
    Closed,
    /// MPD rejected the command; the connection itself is still usable.
    #[error("mpd: {0}")]
    Ack(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<MpdError> for MarqueeError {
    fn from(e: MpdError) -> Self {
        MarqueeError::SourceUnavailable(e.to_string())
    }
}

type Pairs = Vec<(String, String)>;

// ── connection ────────────────────────────────────────────────────────────────

struct MpdConnection {
    reader: BufReader<Box<dyn AsyncRead + Unpin + Send>>,
    writer: Box<dyn AsyncWrite + Unpin + Send>,
    version: String,
}

impl MpdConnection {
    async fn open(address: &MpdAddress) -> Result<Self, MpdError> {
        let (read_half, write_half): (
            Box<dyn AsyncRead + Unpin + Send>,
            Box<dyn AsyncWrite + Unpin + Send>,
        ) = match address {
            MpdAddress::Tcp { host, port } => {
                let stream = TcpStream::connect((host.as_str(), *port)).await?;
                let (r, w) = stream.into_split();
                (Box::new(r), Box::new(w))
            }
            #[cfg(unix)]
            MpdAddress::Unix(path) => {
                let stream = UnixStream::connect(path).await?;
                let (r, w) = stream.into_split();
                (Box::new(r), Box::new(w))
            }
            #[cfg(not(unix))]
            MpdAddress::Unix(path) => {
                return Err(MpdError::Protocol(format!(
                    "unix sockets are not supported here: {}",
                    path.display()
                )))
            }
        };

        let mut conn = Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            version: String::new(),
        };
        let greeting = conn.read_line().await?;
        conn.version = greeting
            .strip_prefix("OK MPD ")
            .ok_or_else(|| MpdError::Protocol(format!("unexpected greeting {:?}", greeting)))?
            .to_string();
        Ok(conn)
    }

    /// One reply line.  Bytes that are not UTF-8 become U+FFFD instead of
    /// failing the request.
    async fn read_line(&mut self) -> Result<String, MpdError> {
        let mut raw = Vec::new();
        if self.reader.read_until(b'\n', &mut raw).await? == 0 {
            return Err(MpdError::Closed);
        }
        let line = String::from_utf8_lossy(&raw);
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn request(&mut self, command: &str) -> Result<Pairs, MpdError> {
        let mut raw = String::with_capacity(command.len() + 1);
        raw.push_str(command);
        raw.push('\n');
        self.writer.write_all(raw.as_bytes()).await?;
        self.writer.flush().await?;

        let mut pairs = Vec::new();
        loop {
            let line = self.read_line().await?;
            if line == "OK" {
                return Ok(pairs);
            }
            if let Some(err) = line.strip_prefix("ACK ") {
                return Err(MpdError::Ack(err.to_string()));
            }
            match line.split_once(": ") {
                Some((key, value)) => pairs.push((key.to_string(), value.to_string())),
                None => return Err(MpdError::Protocol(format!("malformed line {:?}", line))),
            }
        }
    }
}

// ── client ────────────────────────────────────────────────────────────────────

/// Lazily connected MPD client.  Cheap to construct; the first request dials.
pub struct MpdClient {
    endpoint: MpdEndpoint,
    timeout: Duration,
    conn: Option<MpdConnection>,
}

impl MpdClient {
    pub fn new(endpoint: MpdEndpoint, timeout: Duration) -> Self {
        Self {
            endpoint,
            timeout,
            conn: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    async fn dial(&self) -> Result<MpdConnection, MpdError> {
        debug!("mpd: dialing {}", self.endpoint.address);
        let mut conn = MpdConnection::open(&self.endpoint.address).await?;
        if let Some(password) = &self.endpoint.password {
            conn.request(&format!("password {}", quote(password))).await?;
        }
        info!(
            "mpd: connected to {} (protocol {})",
            self.endpoint.address, conn.version
        );
        Ok(conn)
    }

    /// Send one command and collect its `key: value` reply.
    pub async fn request(&mut self, command: &str) -> Result<Pairs, MpdError> {
        let timeout = self.timeout;
        let result = tokio::time::timeout(timeout, async {
            let conn = match self.conn.take() {
                Some(conn) => conn,
                None => self.dial().await?,
            };
            let conn = self.conn.insert(conn);
            let pairs = conn.request(command).await?;
            Ok::<Pairs, MpdError>(pairs)
        })
        .await
        .unwrap_or_else(|_| Err(MpdError::Timeout(timeout)));

        match &result {
            Ok(_) => debug!("mpd: {} ok", command_name(command)),
            Err(MpdError::Ack(msg)) => debug!("mpd: {} rejected: {}", command_name(command), msg),
            Err(e) => {
                if self.conn.take().is_some() {
                    warn!("mpd: dropping connection after {}: {}", command_name(command), e);
                }
            }
        }
        result
    }
}

impl MetadataSource for MpdClient {
    async fn fetch_status(&mut self) -> Result<Status, MarqueeError> {
        let pairs = self.request("status").await?;
        Ok(Status::from_pairs(
            pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        ))
    }

    async fn fetch_metadata(&mut self, id: SongId) -> Result<TrackFields, MarqueeError> {
        let pairs = self.request(&format!("playlistid {}", id)).await?;
        Ok(TrackFields::from_pairs(
            pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        ))
    }

    async fn send_command(&mut self, command: PlayerCommand) -> Result<(), MarqueeError> {
        self.request(&command_line(command)).await?;
        Ok(())
    }
}

/// Wire form of a playback command.  A bare `pause` toggles.
pub fn command_line(command: PlayerCommand) -> String {
    match command {
        PlayerCommand::Previous => "previous".to_string(),
        PlayerCommand::Next => "next".to_string(),
        PlayerCommand::TogglePause => "pause".to_string(),
        PlayerCommand::SeekForward(secs) => format!("seekcur +{}", secs),
        PlayerCommand::SeekBackward(secs) => format!("seekcur -{}", secs),
    }
}

/// Double-quote an argument, escaping `"` and `\`.
fn quote(arg: &str) -> String {
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    for c in arg.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// First word of a command, so passwords never reach the log.
fn command_name(command: &str) -> &str {
    command.split_whitespace().next().unwrap_or(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_proto::protocol::PlaybackState;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    /// What the fake server does with one command.
    enum Reply {
        Send(String),
        SendBytes(Vec<u8>),
        /// Read the command but never answer.
        Hang,
        /// Close the connection without answering.
        Close,
    }

    struct FakeMpd {
        endpoint: MpdEndpoint,
        commands: Arc<Mutex<Vec<String>>>,
        connections: Arc<Mutex<usize>>,
    }

    /// In-process MPD stand-in.  Accepts connections one after another and
    /// answers each command line through `respond`.
    async fn spawn_fake_mpd<F>(respond: F) -> FakeMpd
    where
        F: Fn(&str) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(Mutex::new(0usize));

        let (cmds, conns) = (commands.clone(), connections.clone());
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                *conns.lock().unwrap() += 1;
                let (read_half, mut write_half) = stream.into_split();
                let mut lines = BufReader::new(read_half).lines();
                if write_half.write_all(b"OK MPD 0.23.5\n").await.is_err() {
                    continue;
                }
                while let Ok(Some(line)) = lines.next_line().await {
                    cmds.lock().unwrap().push(line.clone());
                    match respond(&line) {
                        Reply::Send(text) => {
                            if write_half.write_all(text.as_bytes()).await.is_err() {
                                break;
                            }
                        }
                        Reply::SendBytes(raw) => {
                            if write_half.write_all(&raw).await.is_err() {
                                break;
                            }
                        }
                        Reply::Hang => {}
                        Reply::Close => break,
                    }
                }
            }
        });

        FakeMpd {
            endpoint: MpdEndpoint {
                address: MpdAddress::Tcp {
                    host: "127.0.0.1".into(),
                    port,
                },
                password: None,
            },
            commands,
            connections,
        }
    }

    fn ok(body: &str) -> Reply {
        Reply::Send(format!("{}OK\n", body))
    }

    #[tokio::test]
    async fn test_fetch_status() {
        let fake = spawn_fake_mpd(|cmd| match cmd {
            "status" => ok("repeat: 0\nrandom: 1\nplaylistlength: 5\nstate: play\nsong: 1\nsongid: 17\nelapsed: 30.5\nduration: 95.0\n"),
            _ => Reply::Send("ACK [5@0] {} unknown command\n".into()),
        })
        .await;

        let mut client = MpdClient::new(fake.endpoint.clone(), Duration::from_secs(2));
        let status = client.fetch_status().await.unwrap();
        assert_eq!(status.playback_state, PlaybackState::Playing);
        assert_eq!(status.track_identity, Some(17));
        assert_eq!(status.queue_position, Some(1));
        assert_eq!(status.queue_length, 5);
        assert!(status.shuffle);
        assert_eq!(status.remaining().as_secs(), 64);
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_fetch_metadata_by_song_id() {
        let fake = spawn_fake_mpd(|cmd| match cmd {
            "playlistid 17" => ok("file: x.flac\nArtist: Löwe\nTitle: Über\nAlbum: Ä\nId: 17\n"),
            _ => Reply::Send("ACK [50@0] {playlistid} No such song\n".into()),
        })
        .await;

        let mut client = MpdClient::new(fake.endpoint.clone(), Duration::from_secs(2));
        let fields = client.fetch_metadata(17).await.unwrap();
        assert_eq!(fields.title, "Über");
        assert_eq!(fields.artist, "Löwe");
        assert_eq!(fields.album, "Ä");
    }

    #[tokio::test]
    async fn test_invalid_utf8_tag_is_replaced_not_fatal() {
        let fake = spawn_fake_mpd(|cmd| match cmd {
            "playlistid 3" => Reply::SendBytes(b"Artist: Caf\xe9 Tacvba\nTitle: Ojal\xe1\nOK\n".to_vec()),
            _ => ok(""),
        })
        .await;

        let mut client = MpdClient::new(fake.endpoint.clone(), Duration::from_secs(2));
        let fields = client.fetch_metadata(3).await.unwrap();
        assert_eq!(fields.artist, "Caf\u{FFFD} Tacvba");
        assert_eq!(fields.title, "Ojal\u{FFFD}");
        assert!(client.is_connected());

        client.fetch_metadata(3).await.unwrap();
        assert_eq!(*fake.connections.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_password_is_sent_first() {
        let mut fake = spawn_fake_mpd(|_| ok("")).await;
        fake.endpoint.password = Some(r#"pa"ss"#.into());

        let mut client = MpdClient::new(fake.endpoint.clone(), Duration::from_secs(2));
        client.send_command(PlayerCommand::Next).await.unwrap();

        let cmds = fake.commands.lock().unwrap().clone();
        assert_eq!(cmds, vec![r#"password "pa\"ss""#.to_string(), "next".to_string()]);
    }

    #[tokio::test]
    async fn test_ack_keeps_connection() {
        let fake = spawn_fake_mpd(|cmd| match cmd {
            "status" => ok("state: stop\n"),
            _ => Reply::Send("ACK [50@0] {playlistid} No such song\n".into()),
        })
        .await;

        let mut client = MpdClient::new(fake.endpoint.clone(), Duration::from_secs(2));
        let err = client.fetch_metadata(99).await.unwrap_err();
        assert!(matches!(err, MarqueeError::SourceUnavailable(_)));
        assert!(client.is_connected());

        client.fetch_status().await.unwrap();
        assert_eq!(*fake.connections.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_timeout_drops_connection_and_redials() {
        let fake = spawn_fake_mpd(|cmd| match cmd {
            "status" => Reply::Hang,
            _ => ok(""),
        })
        .await;

        let mut client = MpdClient::new(fake.endpoint.clone(), Duration::from_millis(100));
        let err = client.request("status").await.unwrap_err();
        assert!(matches!(err, MpdError::Timeout(_)));
        assert!(!client.is_connected());

        client.request("next").await.unwrap();
        assert_eq!(*fake.connections.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_closed_connection_is_redialed() {
        let fake = spawn_fake_mpd(|cmd| match cmd {
            "previous" => Reply::Close,
            _ => ok(""),
        })
        .await;

        let mut client = MpdClient::new(fake.endpoint.clone(), Duration::from_secs(2));
        let err = client.request("previous").await.unwrap_err();
        assert!(matches!(err, MpdError::Closed));
        assert!(!client.is_connected());

        client.request("next").await.unwrap();
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_source_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let endpoint = MpdEndpoint {
            address: MpdAddress::Tcp {
                host: "127.0.0.1".into(),
                port,
            },
            password: None,
        };
        let mut client = MpdClient::new(endpoint, Duration::from_secs(2));
        let err = client.fetch_status().await.unwrap_err();
        assert!(matches!(err, MarqueeError::SourceUnavailable(_)));
        assert!(!client.is_connected());
    }

    #[test]
    fn test_command_lines() {
        assert_eq!(command_line(PlayerCommand::Previous), "previous");
        assert_eq!(command_line(PlayerCommand::TogglePause), "pause");
        assert_eq!(command_line(PlayerCommand::SeekForward(3)), "seekcur +3");
        assert_eq!(command_line(PlayerCommand::SeekBackward(10)), "seekcur -10");
    }
}
