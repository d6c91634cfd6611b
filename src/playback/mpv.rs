use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::engine::{AudioTrack, MediaEngine, MediaHandle};
use super::source::MediaSource;
use crate::errors::{PlayerError, PlayerResult};

/// How long to wait for mpv to create its IPC socket
const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);
const STARTUP_POLL: Duration = Duration::from_millis(100);
/// Upper bound for a single IPC round trip
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Media engine backed by an external `mpv` process controlled over its
/// JSON IPC socket
#[derive(Debug, Clone)]
pub struct MpvEngine {
    command: String,
}

impl MpvEngine {
    pub fn new<S: Into<String>>(command: S) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl MediaEngine for MpvEngine {
    async fn open(&self, source: &MediaSource) -> PlayerResult<Box<dyn MediaHandle>> {
        let socket_path =
            std::env::temp_dir().join(format!("davplay-mpv-{}.sock", Uuid::new_v4()));

        info!("▶️ Starting {} for '{}'", self.command, source.display_name());
        let child = Command::new(&self.command)
            .arg(format!("--input-ipc-server={}", socket_path.display()))
            .arg("--idle=yes")
            .arg("--force-window=yes")
            .arg("--keep-open=yes")
            .arg(format!("--title={}", source.display_name()))
            .arg(source.url())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlayerError::playback(format!("cannot start '{}': {}", self.command, e)))?;

        let stream = connect_with_retry(&socket_path).await?;

        Ok(Box::new(MpvHandle {
            child,
            socket_path,
            ipc: IpcChannel::new(stream),
            url: source.url().to_string(),
            idle: false,
        }))
    }
}

async fn connect_with_retry(socket_path: &Path) -> PlayerResult<UnixStream> {
    let deadline = tokio::time::Instant::now() + STARTUP_TIMEOUT;
    loop {
        match UnixStream::connect(socket_path).await {
            Ok(stream) => return Ok(stream),
            Err(e) if tokio::time::Instant::now() < deadline => {
                debug!("Waiting for mpv IPC socket: {}", e);
                sleep(STARTUP_POLL).await;
            }
            Err(e) => {
                return Err(PlayerError::playback(format!(
                    "mpv IPC socket did not come up: {}",
                    e
                )))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct IpcReply {
    request_id: Option<u64>,
    error: Option<String>,
    #[serde(default)]
    data: Value,
    event: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MpvTrack {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
    title: Option<String>,
    lang: Option<String>,
    codec: Option<String>,
}

impl MpvTrack {
    fn label(&self) -> String {
        let description = self
            .title
            .as_deref()
            .or(self.lang.as_deref())
            .or(self.codec.as_deref())
            .unwrap_or("unknown");
        format!("Track {} - {}", self.id, description)
    }
}

/// Request/reply channel over mpv's IPC socket.
///
/// Bytes of a line that was only partly read when a reply timed out stay in
/// `pending`, so the next read resumes at the same position.
struct IpcChannel {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    pending: Vec<u8>,
    next_request_id: u64,
}

impl IpcChannel {
    fn new(stream: UnixStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            pending: Vec::new(),
            next_request_id: 1,
        }
    }

    /// Sends one command and waits for the reply with the same request id,
    /// skipping asynchronous event lines
    async fn command(&mut self, args: Value) -> PlayerResult<Value> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let mut line = json!({ "command": args, "request_id": request_id }).to_string();
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| PlayerError::engine_exited(format!("mpv IPC write failed: {}", e)))?;

        let reply = timeout(REPLY_TIMEOUT, self.read_reply(request_id))
            .await
            .map_err(|_| PlayerError::playback("mpv did not answer in time"))??;

        match reply.error.as_deref() {
            Some("success") | None => Ok(reply.data),
            Some(err) => Err(PlayerError::playback(format!("mpv: {}", err))),
        }
    }

    async fn read_reply(&mut self, request_id: u64) -> PlayerResult<IpcReply> {
        loop {
            let read = self
                .reader
                .read_until(b'\n', &mut self.pending)
                .await
                .map_err(|e| PlayerError::engine_exited(format!("mpv IPC read failed: {}", e)))?;
            if read == 0 {
                return Err(PlayerError::engine_exited("mpv closed the IPC connection"));
            }
            if !self.pending.ends_with(b"\n") {
                continue;
            }

            let parsed = serde_json::from_slice::<IpcReply>(self.pending.trim_ascii());
            self.pending.clear();
            let reply = match parsed {
                Ok(reply) => reply,
                Err(e) => {
                    warn!("Ignoring unparsable mpv message: {}", e);
                    continue;
                }
            };
            if let Some(ref event) = reply.event {
                debug!("mpv event: {}", event);
                continue;
            }
            if reply.request_id == Some(request_id) {
                return Ok(reply);
            }
        }
    }
}

pub struct MpvHandle {
    child: Child,
    socket_path: PathBuf,
    ipc: IpcChannel,
    url: String,
    /// mpv went idle after `stop`; playing again needs a reload
    idle: bool,
}

impl MpvHandle {
    /// Sends a command; once the process has exited every failure is final
    async fn command(&mut self, args: Value) -> PlayerResult<Value> {
        let result = self.ipc.command(args).await;
        if result.is_err() {
            if let Ok(Some(status)) = self.child.try_wait() {
                return Err(PlayerError::engine_exited(format!("mpv exited with {}", status)));
            }
        }
        result
    }

    async fn set_property(&mut self, name: &str, value: Value) -> PlayerResult<()> {
        self.command(json!(["set_property", name, value])).await.map(|_| ())
    }

    /// Reads a numeric property; "property unavailable" (nothing loaded,
    /// duration not known yet) reads as `None`
    async fn number_property(&mut self, name: &str) -> PlayerResult<Option<f64>> {
        match self.command(json!(["get_property", name])).await {
            Ok(value) => Ok(value.as_f64()),
            Err(PlayerError::PlaybackFailure { details })
                if details.contains("property unavailable") =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl MediaHandle for MpvHandle {
    async fn play(&mut self) -> PlayerResult<()> {
        if self.idle {
            let url = self.url.clone();
            self.command(json!(["loadfile", url, "replace"])).await?;
            self.idle = false;
        }
        self.set_property("pause", json!(false)).await
    }

    async fn pause(&mut self) -> PlayerResult<()> {
        self.set_property("pause", json!(true)).await
    }

    async fn stop(&mut self) -> PlayerResult<()> {
        self.command(json!(["stop"])).await?;
        self.idle = true;
        Ok(())
    }

    async fn set_position(&mut self, fraction: f64) -> PlayerResult<()> {
        self.command(json!(["seek", fraction * 100.0, "absolute-percent"]))
            .await
            .map(|_| ())
    }

    async fn position(&mut self) -> PlayerResult<f64> {
        Ok(self.number_property("percent-pos").await?.unwrap_or(0.0) / 100.0)
    }

    async fn time_ms(&mut self) -> PlayerResult<i64> {
        Ok((self.number_property("time-pos").await?.unwrap_or(0.0) * 1000.0) as i64)
    }

    async fn length_ms(&mut self) -> PlayerResult<i64> {
        Ok((self.number_property("duration").await?.unwrap_or(0.0) * 1000.0) as i64)
    }

    async fn set_volume(&mut self, volume: u8) -> PlayerResult<()> {
        self.set_property("volume", json!(volume)).await
    }

    async fn audio_tracks(&mut self) -> PlayerResult<Vec<AudioTrack>> {
        let value = self.command(json!(["get_property", "track-list"])).await?;
        let tracks: Vec<MpvTrack> = serde_json::from_value(value)
            .map_err(|e| PlayerError::playback(format!("unexpected track-list: {}", e)))?;

        Ok(tracks
            .into_iter()
            .filter(|track| track.kind == "audio")
            .map(|track| AudioTrack {
                id: track.id,
                label: track.label(),
            })
            .collect())
    }

    async fn audio_track(&mut self) -> PlayerResult<i64> {
        let value = self.command(json!(["get_property", "aid"])).await?;
        Ok(value.as_i64().unwrap_or(-1))
    }

    async fn set_audio_track(&mut self, track_id: i64) -> PlayerResult<()> {
        let value = if track_id < 0 { json!("no") } else { json!(track_id) };
        self.set_property("aid", value).await
    }

    async fn shutdown(&mut self) -> PlayerResult<()> {
        if let Err(e) = self.command(json!(["quit"])).await {
            debug!("mpv quit command failed: {}", e);
        }
        if timeout(STARTUP_TIMEOUT, self.child.wait()).await.is_err() {
            warn!("mpv did not exit, killing it");
            self.child
                .kill()
                .await
                .map_err(|e| PlayerError::playback(format!("cannot kill mpv: {}", e)))?;
        }
        if let Err(e) = tokio::fs::remove_file(&self.socket_path).await {
            debug!("Could not remove IPC socket {}: {}", self.socket_path.display(), e);
        }
        Ok(())
    }
}
