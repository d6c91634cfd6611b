//! Test doubles shared by unit and integration tests
//!
//! Provides a recording notifier, an in-memory directory lister and a fake
//! media engine so tree and playback logic can be exercised without a
//! server or a player process.

#[cfg(any(test, feature = "test-utils"))]
pub use doubles::*;

#[cfg(any(test, feature = "test-utils"))]
mod doubles {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::errors::{PlayerError, PlayerResult};
    use crate::models::RemoteEntry;
    use crate::notify::{Notice, Notifier};
    use crate::playback::{AudioTrack, MediaEngine, MediaHandle, MediaSource};
    use crate::services::webdav::DirectoryLister;

    /// Keeps every notice it receives
    #[derive(Debug, Default, Clone)]
    pub struct RecordingNotifier {
        notices: Arc<Mutex<Vec<Notice>>>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn notices(&self) -> Vec<Notice> {
            self.notices.lock().unwrap().clone()
        }

        pub fn count(&self) -> usize {
            self.notices.lock().unwrap().len()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notice: Notice) {
            self.notices.lock().unwrap().push(notice);
        }
    }

    /// Directory lister backed by a map of path -> listing. Paths missing
    /// from the map answer 404; a path can be switched to fail with 401.
    #[derive(Debug, Default, Clone)]
    pub struct StaticLister {
        listings: Arc<Mutex<HashMap<String, Vec<RemoteEntry>>>>,
        unauthorized: Arc<Mutex<Vec<String>>>,
        calls: Arc<AtomicUsize>,
    }

    impl StaticLister {
        pub fn new() -> Self {
            Self::default()
        }

        /// Registers a listing given as relative paths; a trailing `/` marks directories
        pub fn with_listing(self, path: &str, children: &[&str]) -> Self {
            let entries = children
                .iter()
                .map(|child| RemoteEntry::from_relative_path(child, child.ends_with('/')))
                .collect();
            self.listings.lock().unwrap().insert(path.to_string(), entries);
            self
        }

        pub fn fail_with_unauthorized(&self, path: &str) {
            self.unauthorized.lock().unwrap().push(path.to_string());
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DirectoryLister for StaticLister {
        async fn list(&self, relative_path: &str) -> PlayerResult<Vec<RemoteEntry>> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if self.unauthorized.lock().unwrap().iter().any(|p| p == relative_path) {
                return Err(PlayerError::AuthRejected {
                    path: relative_path.to_string(),
                    status: 401,
                    reason: "Unauthorized".to_string(),
                });
            }

            self.listings
                .lock()
                .unwrap()
                .get(relative_path)
                .cloned()
                .ok_or_else(|| PlayerError::AuthRejected {
                    path: relative_path.to_string(),
                    status: 404,
                    reason: "Not Found".to_string(),
                })
        }
    }

    /// Observable state of a [`FakeHandle`]
    #[derive(Debug, Clone, PartialEq)]
    pub struct FakeHandleState {
        pub url: String,
        pub playing: bool,
        pub stopped: bool,
        pub position: f64,
        pub length_ms: i64,
        pub volume: u8,
        pub audio_track: i64,
        pub volume_calls: Vec<u8>,
        pub fail_next: bool,
        /// The player went away; every call fails from now on
        pub exited: bool,
    }

    /// In-memory media handle with a fixed duration
    #[derive(Debug, Clone)]
    pub struct FakeHandle {
        state: Arc<Mutex<FakeHandleState>>,
        tracks: Vec<AudioTrack>,
    }

    impl FakeHandle {
        fn alive(&self) -> PlayerResult<()> {
            if self.state.lock().unwrap().exited {
                return Err(PlayerError::engine_exited("player window closed"));
            }
            Ok(())
        }

        fn check(&self) -> PlayerResult<()> {
            self.alive()?;
            let mut state = self.state.lock().unwrap();
            if state.fail_next {
                state.fail_next = false;
                state.playing = false;
                return Err(PlayerError::playback("engine reported an error"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MediaHandle for FakeHandle {
        async fn play(&mut self) -> PlayerResult<()> {
            self.check()?;
            let mut state = self.state.lock().unwrap();
            state.playing = true;
            state.stopped = false;
            Ok(())
        }

        async fn pause(&mut self) -> PlayerResult<()> {
            self.check()?;
            self.state.lock().unwrap().playing = false;
            Ok(())
        }

        async fn stop(&mut self) -> PlayerResult<()> {
            self.alive()?;
            let mut state = self.state.lock().unwrap();
            state.playing = false;
            state.stopped = true;
            state.position = 0.0;
            Ok(())
        }

        async fn set_position(&mut self, fraction: f64) -> PlayerResult<()> {
            self.check()?;
            self.state.lock().unwrap().position = fraction;
            Ok(())
        }

        async fn position(&mut self) -> PlayerResult<f64> {
            self.alive()?;
            Ok(self.state.lock().unwrap().position)
        }

        async fn time_ms(&mut self) -> PlayerResult<i64> {
            self.alive()?;
            let state = self.state.lock().unwrap();
            Ok((state.position * state.length_ms as f64) as i64)
        }

        async fn length_ms(&mut self) -> PlayerResult<i64> {
            self.alive()?;
            Ok(self.state.lock().unwrap().length_ms)
        }

        async fn set_volume(&mut self, volume: u8) -> PlayerResult<()> {
            self.check()?;
            let mut state = self.state.lock().unwrap();
            state.volume = volume;
            state.volume_calls.push(volume);
            Ok(())
        }

        async fn audio_tracks(&mut self) -> PlayerResult<Vec<AudioTrack>> {
            self.alive()?;
            Ok(self.tracks.clone())
        }

        async fn audio_track(&mut self) -> PlayerResult<i64> {
            self.alive()?;
            Ok(self.state.lock().unwrap().audio_track)
        }

        async fn set_audio_track(&mut self, track_id: i64) -> PlayerResult<()> {
            self.check()?;
            self.state.lock().unwrap().audio_track = track_id;
            Ok(())
        }

        async fn shutdown(&mut self) -> PlayerResult<()> {
            if self.alive().is_err() {
                return Ok(());
            }
            self.stop().await
        }
    }

    /// Engine that hands out [`FakeHandle`]s and keeps their state observable
    #[derive(Debug, Clone)]
    pub struct FakeEngine {
        pub length_ms: i64,
        pub tracks: Vec<AudioTrack>,
        pub fail_open: bool,
        opened: Arc<Mutex<Vec<Arc<Mutex<FakeHandleState>>>>>,
    }

    impl Default for FakeEngine {
        fn default() -> Self {
            Self {
                length_ms: 120_000,
                tracks: vec![
                    AudioTrack { id: -1, label: "Disable".to_string() },
                    AudioTrack { id: 1, label: "Track 1 - English".to_string() },
                    AudioTrack { id: 2, label: "Track 2 - Deutsch".to_string() },
                ],
                fail_open: false,
                opened: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl FakeEngine {
        pub fn new() -> Self {
            Self::default()
        }

        /// State of the n-th handle opened by this engine
        pub fn handle_state(&self, index: usize) -> Option<FakeHandleState> {
            self.opened
                .lock()
                .unwrap()
                .get(index)
                .map(|state| state.lock().unwrap().clone())
        }

        /// Makes the next control call on the n-th handle fail
        pub fn fail_next_call(&self, index: usize) {
            if let Some(state) = self.opened.lock().unwrap().get(index) {
                state.lock().unwrap().fail_next = true;
            }
        }

        /// Simulates the n-th player going away, e.g. its window was closed
        pub fn exit_player(&self, index: usize) {
            if let Some(state) = self.opened.lock().unwrap().get(index) {
                state.lock().unwrap().exited = true;
            }
        }

        pub fn opened(&self) -> usize {
            self.opened.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl MediaEngine for FakeEngine {
        async fn open(&self, source: &MediaSource) -> PlayerResult<Box<dyn MediaHandle>> {
            if self.fail_open {
                return Err(PlayerError::playback("cannot open media"));
            }

            let state = Arc::new(Mutex::new(FakeHandleState {
                url: source.url().to_string(),
                playing: false,
                stopped: true,
                position: 0.0,
                length_ms: self.length_ms,
                volume: 100,
                audio_track: 1,
                volume_calls: Vec::new(),
                fail_next: false,
                exited: false,
            }));
            self.opened.lock().unwrap().push(state.clone());

            Ok(Box::new(FakeHandle {
                state,
                tracks: self.tracks.clone(),
            }))
        }
    }
}
