use std::path::PathBuf;

use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use davplay::{config::Config, log_buffer::LogBuffer, notify::StderrNotifier, shell, App};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let log = LogBuffer::new();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(log.layer())
        .init();

    let matches = Command::new("davplay")
        .about("Browse a Nextcloud server over WebDAV and play its videos")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("settings")
                .help("Settings file (JSON)")
                .long("settings")
                .short('s')
                .value_name("FILE"),
        )
        .arg(
            Arg::new("timeout")
                .help("Request timeout in seconds")
                .long("timeout")
                .value_name("SECONDS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("player")
                .help("mpv executable used for playback")
                .long("player")
                .value_name("COMMAND"),
        )
        .arg(
            Arg::new("log-dir")
                .help("Default directory for 'save-log'")
                .long("log-dir")
                .value_name("DIR"),
        )
        .arg(
            Arg::new("proxy-port")
                .help("Loopback port for streaming to the player (default: any free port)")
                .long("proxy-port")
                .value_name("PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("no-login")
                .help("Start without asking for credentials")
                .long("no-login")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let mut config = Config::from_env()?;
    if let Some(path) = matches.get_one::<String>("settings") {
        config.settings_path = PathBuf::from(path);
    }
    if let Some(timeout) = matches.get_one::<u64>("timeout") {
        config.timeout_seconds = *timeout;
    }
    if let Some(player) = matches.get_one::<String>("player") {
        config.player_command = player.clone();
    }
    if let Some(dir) = matches.get_one::<String>("log-dir") {
        config.log_dir = PathBuf::from(dir);
    }
    if let Some(port) = matches.get_one::<u16>("proxy-port") {
        config.proxy_port = *port;
    }
    let login_first = !matches.get_flag("no-login");

    info!("Starting davplay with settings from {}", config.settings_path.display());
    let engine = media_engine(&config)?;
    let mut app = App::load(config, engine, Box::new(StderrNotifier), log)?;

    let mut stdout = std::io::stdout();
    let result = shell::run(&mut app, tokio::io::stdin(), &mut stdout, login_first).await;
    app.shutdown().await;

    if let Err(ref e) = result {
        error!("Shell stopped: {}", e);
    }
    info!("Bye");
    result
}

#[cfg(not(unix))]
compile_error!("davplay drives mpv over a Unix socket and needs a Unix platform");

fn media_engine(config: &Config) -> Result<davplay::playback::MpvEngine> {
    Ok(davplay::playback::MpvEngine::new(config.player_command.clone()))
}
