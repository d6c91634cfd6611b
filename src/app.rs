use std::future;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::config::Config;
use crate::credentials::{Credentials, LoginFlow, LoginState};
use crate::errors::{AppError, PlayerError, PlayerResult};
use crate::log_buffer::LogBuffer;
use crate::models::RemoteEntry;
use crate::notify::{Notice, Notifier};
use crate::playback::{AudioTrack, MediaEngine, MediaProxy, PlaybackSession, PlaybackStatus};
use crate::services::webdav::{WebDAVConfig, WebDAVConnection, WebDAVWalker};
use crate::settings::{Settings, Theme};
use crate::tree::{FileTree, NodeId, TreeSynchronizer, VisibleRow};

/// Everything that only exists while logged in
struct Browser {
    sync: TreeSynchronizer<WebDAVWalker>,
    tree: FileTree,
    proxy: MediaProxy,
}

/// Result of opening a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opened {
    /// A directory row was expanded and now shows this many children
    Directory(usize),
    /// A file started playing
    Video(String),
}

/// One application session: login state, the browsed tree and at most one
/// open player.
pub struct App<E: MediaEngine> {
    config: Config,
    settings: Settings,
    login: LoginFlow,
    browser: Option<Browser>,
    engine: E,
    player: Option<PlaybackSession>,
    notifier: Box<dyn Notifier>,
    log: LogBuffer,
}

impl<E: MediaEngine> App<E> {
    pub fn new(
        config: Config,
        settings: Settings,
        engine: E,
        notifier: Box<dyn Notifier>,
        log: LogBuffer,
    ) -> Self {
        Self {
            config,
            settings,
            login: LoginFlow::new(),
            browser: None,
            engine,
            player: None,
            notifier,
            log,
        }
    }

    /// Creates the session with the settings stored at `config.settings_path`
    pub fn load(
        config: Config,
        engine: E,
        notifier: Box<dyn Notifier>,
        log: LogBuffer,
    ) -> PlayerResult<Self> {
        let settings = Settings::load(&config.settings_path)?;
        Ok(Self::new(config, settings, engine, notifier, log))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn theme(&self) -> Theme {
        self.settings.theme
    }

    pub fn login_state(&self) -> &LoginState {
        self.login.state()
    }

    pub fn is_authenticated(&self) -> bool {
        self.login.is_authenticated()
    }

    pub fn log(&self) -> &LogBuffer {
        &self.log
    }

    /// Validates the credentials with a PROPFIND on the root, then lists the
    /// root. Returns the number of root entries.
    ///
    /// A rejected login clears the stored user name and password and keeps
    /// the server URL for the next prompt.
    pub async fn login(&mut self, credentials: Credentials) -> PlayerResult<usize> {
        let credentials = match self.login.submit(credentials) {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!("Login not attempted: {}", e);
                self.notifier.notify(Notice::from_error(&e));
                return Err(e);
            }
        };

        info!("Logging in to {} as '{}'", credentials.server_url, credentials.username);
        let config =
            WebDAVConfig::new(credentials.clone()).with_timeout(self.config.timeout_seconds);

        let validated = async {
            let connection = WebDAVConnection::new(config)?;
            connection.validate_credentials().await?;
            Ok::<_, PlayerError>(connection)
        }
        .await;

        let connection = match validated {
            Ok(connection) => connection,
            Err(e) => {
                let e = self
                    .login
                    .complete(Err(e))
                    .err()
                    .unwrap_or(PlayerError::NotAuthenticated);
                return self.reject_login(e);
            }
        };

        // Without the media proxy the session is unusable, so the attempt is
        // dropped and the stored credentials stay as they were.
        let proxy = match MediaProxy::start(connection.clone(), self.config.proxy_port).await {
            Ok(proxy) => proxy,
            Err(e) => {
                self.login.logout();
                error!("Failed to start media proxy [{}]: {}", e.error_code(), e);
                self.notifier.notify(Notice::from_error(&e));
                return Err(e);
            }
        };
        self.login.complete(Ok(()))?;

        self.settings.remember(&credentials);
        self.save_settings();

        self.browser = Some(Browser {
            sync: TreeSynchronizer::new(WebDAVWalker::new(connection)),
            tree: FileTree::new(),
            proxy,
        });

        self.refresh().await
    }

    fn reject_login(&mut self, e: PlayerError) -> PlayerResult<usize> {
        error!("Login failed [{}]: {}", e.error_code(), e);
        self.notifier.notify(Notice::from_error(&e));

        if let Some(server_url) = self.login.prefill_server_url() {
            self.settings.server_url = server_url.to_string();
        }
        self.settings.forget_credentials();
        self.save_settings();
        Err(e)
    }

    /// Closes the player, drops the tree and forgets the password
    pub async fn logout(&mut self) -> PlayerResult<()> {
        if !self.login.is_authenticated() {
            return Err(PlayerError::NotAuthenticated);
        }

        self.close_player().await;
        if let Some(browser) = self.browser.take() {
            browser.proxy.shutdown();
        }
        self.login.logout();

        self.settings.forget_password();
        self.save_settings();
        Ok(())
    }

    /// Re-lists the root directory
    pub async fn refresh(&mut self) -> PlayerResult<usize> {
        let browser = self.browser.as_mut().ok_or(PlayerError::NotAuthenticated)?;
        browser
            .sync
            .expand_root(&mut browser.tree, self.notifier.as_ref())
            .await
    }

    /// Rows of the tree as currently expanded, numbered from 1 by the shell
    pub fn rows(&self) -> Vec<VisibleRow> {
        self.browser
            .as_ref()
            .map(|browser| browser.tree.visible_rows())
            .unwrap_or_default()
    }

    fn row_id(&self, row: usize) -> PlayerResult<NodeId> {
        let rows = self.rows();
        row.checked_sub(1)
            .and_then(|index| rows.get(index))
            .map(|r| r.id)
            .ok_or_else(|| {
                PlayerError::invalid_argument(format!("No row {}, run 'ls' to list rows", row))
            })
    }

    /// Entry shown at a row
    pub fn entry(&self, row: usize) -> PlayerResult<RemoteEntry> {
        let id = self.row_id(row)?;
        self.browser
            .as_ref()
            .and_then(|browser| browser.tree.node(id))
            .map(|node| node.entry.clone())
            .ok_or(PlayerError::NotAuthenticated)
    }

    pub async fn expand(&mut self, row: usize) -> PlayerResult<usize> {
        let id = self.row_id(row)?;
        let browser = self.browser.as_mut().ok_or(PlayerError::NotAuthenticated)?;
        browser
            .sync
            .expand(&mut browser.tree, id, self.notifier.as_ref())
            .await
    }

    pub fn collapse(&mut self, row: usize) -> PlayerResult<bool> {
        let id = self.row_id(row)?;
        let browser = self.browser.as_mut().ok_or(PlayerError::NotAuthenticated)?;
        Ok(browser.tree.collapse(id))
    }

    /// Expands a directory row, or plays a file row in a fresh player.
    /// A previously open player is closed first.
    pub async fn open(&mut self, row: usize) -> PlayerResult<Opened> {
        let entry = self.entry(row)?;
        if entry.is_directory {
            return self.expand(row).await.map(Opened::Directory);
        }
        if !entry.is_video() {
            warn!("'{}' does not look like a video, trying anyway", entry.relative_path);
        }

        self.close_player().await;

        let browser = self.browser.as_ref().ok_or(PlayerError::NotAuthenticated)?;
        let source = browser.proxy.register(&entry.relative_path, &entry.display_name);
        let token = source.token();

        match PlaybackSession::open(&self.engine, source).await {
            Ok(session) => {
                self.player = Some(session);
                Ok(Opened::Video(entry.display_name))
            }
            Err(e) => {
                browser.proxy.revoke(token);
                error!(
                    "Failed to open '{}' [{}]: {}",
                    entry.relative_path,
                    e.error_code(),
                    e
                );
                self.notifier.notify(Notice::from_error(&e));
                Err(e)
            }
        }
    }

    pub fn player(&self) -> Option<&PlaybackSession> {
        self.player.as_ref()
    }

    fn session(&mut self) -> PlayerResult<&mut PlaybackSession> {
        self.player.as_mut().ok_or(PlayerError::SessionClosed)
    }

    /// Engine failures are shown to the user. The player stays open unless
    /// the engine itself is gone, in which case it is closed.
    async fn report<T>(&mut self, result: PlayerResult<T>) -> PlayerResult<T> {
        match &result {
            Err(e @ PlayerError::PlaybackFailure { .. }) => {
                self.notifier.notify(Notice::from_error(e));
            }
            Err(e @ PlayerError::EngineExited { .. }) => {
                self.notifier.notify(Notice::from_error(e));
                self.close_player().await;
            }
            _ => {}
        }
        result
    }

    pub async fn play(&mut self) -> PlayerResult<()> {
        let result = self.session()?.play().await;
        self.report(result).await
    }

    pub async fn pause(&mut self) -> PlayerResult<()> {
        let result = self.session()?.pause().await;
        self.report(result).await
    }

    pub async fn stop(&mut self) -> PlayerResult<()> {
        let result = self.session()?.stop().await;
        self.report(result).await
    }

    /// Seeks to a slider position given in percent, `0..=100`
    pub async fn seek_percent(&mut self, percent: f64) -> PlayerResult<()> {
        let result = self.session()?.seek(percent / 100.0).await;
        self.report(result).await
    }

    pub async fn set_volume(&mut self, percent: i64) -> PlayerResult<u8> {
        let result = self.session()?.set_volume(percent).await;
        self.report(result).await
    }

    pub async fn audio_tracks(&mut self) -> PlayerResult<Vec<AudioTrack>> {
        let result = self.session()?.audio_tracks().await;
        self.report(result).await
    }

    pub async fn select_audio_track(&mut self, track_id: i64) -> PlayerResult<()> {
        let result = self.session()?.select_audio_track(track_id).await;
        self.report(result).await
    }

    /// Refreshes the player status. Ordinary failures are only logged since
    /// this runs every second; a player that went away is closed with one
    /// notice and the error is returned.
    pub async fn tick(&mut self) -> PlayerResult<PlaybackStatus> {
        let result = self.session()?.tick().await;
        match result {
            Err(e @ PlayerError::EngineExited { .. }) => self.report(Err(e)).await,
            other => other,
        }
    }

    /// Completes on the open player's next tick; pending forever otherwise
    pub async fn wait_tick(&mut self) {
        match self.player.as_mut() {
            Some(session) => session.wait_tick().await,
            None => future::pending().await,
        }
    }

    /// Closes the open player, if any. Returns whether one was open.
    pub async fn close_player(&mut self) -> bool {
        let Some(mut session) = self.player.take() else {
            return false;
        };

        if let Err(e) = session.close().await {
            warn!("Player did not shut down cleanly: {}", e);
        }
        if let Some(browser) = self.browser.as_ref() {
            browser.proxy.revoke(session.source().token());
        }
        true
    }

    pub fn set_theme(&mut self, theme: Theme) -> PlayerResult<()> {
        self.settings.theme = theme;
        info!("Theme changed to {}", theme);
        self.settings.save(&self.config.settings_path).inspect_err(|e| {
            error!("Failed to save settings: {}", e);
            self.notifier.notify(Notice::from_error(e));
        })
    }

    /// Writes the log to `target`, or to a timestamped file in the
    /// configured log directory
    pub fn export_log(&self, target: Option<&Path>) -> PlayerResult<PathBuf> {
        let target = target.unwrap_or(&self.config.log_dir);
        self.log.export(target).inspect_err(|e| {
            error!("Failed to export log: {}", e);
            self.notifier.notify(Notice::from_error(e));
        })
    }

    /// Closes the player and stops the media proxy
    pub async fn shutdown(&mut self) {
        self.close_player().await;
        if let Some(browser) = self.browser.take() {
            browser.proxy.shutdown();
        }
    }

    fn save_settings(&self) {
        if let Err(e) = self.settings.save(&self.config.settings_path) {
            error!("Failed to save settings: {}", e);
            self.notifier.notify(Notice::from_error(&e));
        }
    }
}
