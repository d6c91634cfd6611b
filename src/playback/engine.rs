use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::source::MediaSource;
use crate::errors::PlayerResult;

/// An audio track as reported by the media engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub id: i64,
    pub label: String,
}

/// One open stream inside the media engine.
///
/// Positions are fractions of the total duration in `[0, 1]`; volume is a
/// percentage in `[0, 100]`. Implementations report engine problems as
/// `PlayerError::PlaybackFailure`.
#[async_trait]
pub trait MediaHandle: Send {
    async fn play(&mut self) -> PlayerResult<()>;

    async fn pause(&mut self) -> PlayerResult<()>;

    async fn stop(&mut self) -> PlayerResult<()>;

    async fn set_position(&mut self, fraction: f64) -> PlayerResult<()>;

    async fn position(&mut self) -> PlayerResult<f64>;

    /// Elapsed time in milliseconds
    async fn time_ms(&mut self) -> PlayerResult<i64>;

    /// Total duration in milliseconds, 0 while unknown
    async fn length_ms(&mut self) -> PlayerResult<i64>;

    async fn set_volume(&mut self, volume: u8) -> PlayerResult<()>;

    async fn audio_tracks(&mut self) -> PlayerResult<Vec<AudioTrack>>;

    /// Id of the selected audio track, -1 when audio is disabled
    async fn audio_track(&mut self) -> PlayerResult<i64>;

    async fn set_audio_track(&mut self, track_id: i64) -> PlayerResult<()>;

    /// Releases engine resources; the handle is unusable afterwards
    async fn shutdown(&mut self) -> PlayerResult<()>;
}

/// Factory for media handles
#[async_trait]
pub trait MediaEngine: Send + Sync {
    async fn open(&self, source: &MediaSource) -> PlayerResult<Box<dyn MediaHandle>>;
}
