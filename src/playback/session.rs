use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::engine::{AudioTrack, MediaEngine, MediaHandle};
use super::source::MediaSource;
use super::ticker::{Ticker, TICK_INTERVAL};
use crate::errors::{AppError, PlayerError, PlayerResult};

/// Volume applied when a session opens
pub const DEFAULT_VOLUME: u8 = 50;
pub const MAX_VOLUME: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
    Closed,
}

/// Snapshot produced by each refresh tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub elapsed_ms: i64,
    pub total_ms: i64,
    /// Slider position, 0..=100
    pub slider: u8,
    /// "MM:SS / MM:SS"
    pub label: String,
    pub tracks: Vec<AudioTrack>,
    pub current_track: i64,
}

/// One open media stream with its transport controls
pub struct PlaybackSession {
    handle: Option<Box<dyn MediaHandle>>,
    source: MediaSource,
    state: PlaybackState,
    volume: u8,
    position: f64,
    selected_track: Option<i64>,
    ticker: Ticker,
    /// The last tick failed; further failures are not logged again
    tick_failing: bool,
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("source", &self.source)
            .field("state", &self.state)
            .field("volume", &self.volume)
            .field("position", &self.position)
            .field("selected_track", &self.selected_track)
            .finish()
    }
}

impl PlaybackSession {
    /// Opens the source in the engine and starts playing right away
    pub async fn open(engine: &dyn MediaEngine, source: MediaSource) -> PlayerResult<Self> {
        let mut handle = engine.open(&source).await?;

        if let Err(e) = start(handle.as_mut()).await {
            if let Err(shutdown_err) = handle.shutdown().await {
                debug!("Engine shutdown after failed start: {}", shutdown_err);
            }
            return Err(e);
        }

        info!("Playing video: {}", source.relative_path());
        Ok(Self {
            handle: Some(handle),
            source,
            state: PlaybackState::Playing,
            volume: DEFAULT_VOLUME,
            position: 0.0,
            selected_track: None,
            ticker: Ticker::start(TICK_INTERVAL),
            tick_failing: false,
        })
    }

    pub fn source(&self) -> &MediaSource {
        &self.source
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == PlaybackState::Closed
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Last known position as a fraction of the duration
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn selected_track(&self) -> Option<i64> {
        self.selected_track
    }

    pub async fn play(&mut self) -> PlayerResult<()> {
        let result = self.handle()?.play().await;
        self.record(result)?;
        self.state = PlaybackState::Playing;
        Ok(())
    }

    pub async fn pause(&mut self) -> PlayerResult<()> {
        let result = self.handle()?.pause().await;
        self.record(result)?;
        self.state = PlaybackState::Paused;
        Ok(())
    }

    pub async fn stop(&mut self) -> PlayerResult<()> {
        let result = self.handle()?.stop().await;
        self.record(result)?;
        self.state = PlaybackState::Stopped;
        self.position = 0.0;
        Ok(())
    }

    /// Jumps to a fraction of the total duration; the fraction must be in `[0, 1]`
    pub async fn seek(&mut self, fraction: f64) -> PlayerResult<()> {
        if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
            return Err(PlayerError::invalid_argument(format!(
                "Seek position must be between 0 and 1, got {}",
                fraction
            )));
        }

        let result = self.handle()?.set_position(fraction).await;
        self.record(result)?;
        self.position = fraction;
        Ok(())
    }

    /// Sets the volume, clamping to `0..=100` before it reaches the engine.
    /// Returns the applied value.
    pub async fn set_volume(&mut self, percent: i64) -> PlayerResult<u8> {
        let volume = percent.clamp(0, MAX_VOLUME as i64) as u8;
        if volume as i64 != percent {
            debug!("Volume {} clamped to {}", percent, volume);
        }

        let result = self.handle()?.set_volume(volume).await;
        self.record(result)?;
        self.volume = volume;
        Ok(volume)
    }

    /// Audio tracks in engine order
    pub async fn audio_tracks(&mut self) -> PlayerResult<Vec<AudioTrack>> {
        let result = self.handle()?.audio_tracks().await;
        self.record(result)
    }

    /// Switches to one of the tracks reported by [`Self::audio_tracks`]
    pub async fn select_audio_track(&mut self, track_id: i64) -> PlayerResult<()> {
        let tracks = self.audio_tracks().await?;
        if !tracks.iter().any(|t| t.id == track_id) {
            return Err(PlayerError::invalid_argument(format!(
                "Unknown audio track {}",
                track_id
            )));
        }

        let result = self.handle()?.set_audio_track(track_id).await;
        self.record(result)?;
        self.selected_track = Some(track_id);
        Ok(())
    }

    /// Waits for the next refresh tick. Never completes once closed.
    pub async fn wait_tick(&mut self) {
        self.ticker.tick().await
    }

    /// Re-reads position, time and audio tracks from the engine.
    ///
    /// A failure is logged once until a tick succeeds again. When the engine
    /// is gone the ticker stops and the caller is expected to close the session.
    pub async fn tick(&mut self) -> PlayerResult<PlaybackStatus> {
        let handle = self.handle()?;
        let snapshot = async {
            Ok::<_, PlayerError>((
                handle.position().await?,
                handle.time_ms().await?,
                handle.length_ms().await?,
                handle.audio_tracks().await?,
                handle.audio_track().await?,
            ))
        }
        .await;

        let (position, elapsed_ms, total_ms, tracks, current_track) = match snapshot {
            Ok(snapshot) => snapshot,
            Err(e) if self.tick_failing && !matches!(e, PlayerError::EngineExited { .. }) => {
                self.state = PlaybackState::Stopped;
                return Err(e);
            }
            Err(e) => {
                self.tick_failing = true;
                return self.record(Err(e));
            }
        };
        if self.tick_failing {
            info!("Player status readable again");
            self.tick_failing = false;
        }

        self.position = position.clamp(0.0, 1.0);
        self.selected_track = Some(current_track);

        Ok(PlaybackStatus {
            state: self.state,
            elapsed_ms,
            total_ms,
            slider: (self.position * 100.0).round() as u8,
            label: format!("{} / {}", format_time(elapsed_ms), format_time(total_ms)),
            tracks,
            current_track,
        })
    }

    /// Stops playback and the refresh tick, then releases the engine handle.
    /// Every later control call fails with `SessionClosed`.
    pub async fn close(&mut self) -> PlayerResult<()> {
        let Some(mut handle) = self.handle.take() else {
            return Err(PlayerError::SessionClosed);
        };

        self.ticker.stop();
        if let Err(e) = handle.stop().await {
            error!("Failed to stop playback on close: {}", e);
        }
        self.state = PlaybackState::Closed;
        let result = handle.shutdown().await;

        info!("Video player closed");
        result
    }

    fn handle(&mut self) -> PlayerResult<&mut (dyn MediaHandle + 'static)> {
        self.handle.as_deref_mut().ok_or(PlayerError::SessionClosed)
    }

    /// Logs an engine failure and marks playback as stopped. The session
    /// stays open; an exited engine also stops the refresh tick.
    fn record<T>(&mut self, result: PlayerResult<T>) -> PlayerResult<T> {
        match result {
            Err(PlayerError::EngineExited { details }) => {
                warn!("Player for '{}' exited: {}", self.source.relative_path(), details);
                self.state = PlaybackState::Stopped;
                self.ticker.stop();
                Err(PlayerError::EngineExited { details })
            }
            Err(e) => {
                error!(
                    "Playback error on '{}' [{}]: {}",
                    self.source.relative_path(),
                    e.error_code(),
                    e
                );
                self.state = PlaybackState::Stopped;
                Err(e)
            }
            ok => ok,
        }
    }
}

async fn start(handle: &mut dyn MediaHandle) -> PlayerResult<()> {
    handle.set_volume(DEFAULT_VOLUME).await?;
    handle.play().await
}

/// Formats milliseconds as "MM:SS"; minutes are not wrapped into hours
pub fn format_time(ms: i64) -> String {
    let seconds = ms.max(0) / 1000;
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
