//! Line-oriented front end.
//!
//! Reads commands from an async reader, dispatches them to [`App`] and
//! drives the player's refresh tick from the same loop, so a tick never
//! runs while a command is being handled. Each tick that changes the player
//! status redraws a single status line in front of the prompt.

use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tracing::debug;

use crate::app::{App, Opened};
use crate::credentials::Credentials;
use crate::errors::{AppError, ErrorSeverity, PlayerError};
use crate::playback::{MediaEngine, PlaybackStatus};
use crate::settings::Theme;
use crate::tree::VisibleRow;

const RESET: &str = "\x1b[0m";
/// Carriage return plus "erase line", used to redraw the status line
const REDRAW: &str = "\r\x1b[2K";
const PROMPT: &str = "davplay> ";

/// Lines shown by `log` without an argument
const DEFAULT_LOG_LINES: usize = 20;

pub const HELP: &str = "\
Commands:
  login [url user]     log in (the password is prompted)
  logout               log out and forget the saved password
  ls | tree            list the expanded tree with row numbers
  expand <n>           load the children of directory row n
  collapse <n>         hide the children of directory row n
  open <n>             play file row n, or expand directory row n
  play | pause | stop  transport controls
  seek <percent>       jump to a position, 0-100
  volume <0-100>       set the volume
  tracks               list audio tracks
  track <id>           switch audio track
  status               show position and time
  close                close the player
  theme [dark|light]   show or change the theme
  log [n]              show the last n log lines
  save-log [path]      export the log
  help                 show this help
  quit                 exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Login {
        server_url: Option<String>,
        username: Option<String>,
    },
    Logout,
    List,
    Expand(usize),
    Collapse(usize),
    Open(usize),
    Play,
    Pause,
    Stop,
    Seek(f64),
    Volume(i64),
    Tracks,
    Track(i64),
    Status,
    Close,
    Theme(Option<Theme>),
    Log(usize),
    SaveLog(Option<PathBuf>),
    Help,
    Quit,
    Empty,
}

impl FromStr for Command {
    type Err = PlayerError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(Command::Empty);
        };
        let args: Vec<&str> = words.collect();

        let command = match name.to_lowercase().as_str() {
            "login" => match args.as_slice() {
                [] => Command::Login {
                    server_url: None,
                    username: None,
                },
                [url, user] => Command::Login {
                    server_url: Some(url.to_string()),
                    username: Some(user.to_string()),
                },
                _ => return Err(usage("login [url user]")),
            },
            "logout" => Command::Logout,
            "ls" | "tree" => Command::List,
            "expand" => Command::Expand(number(&args, "expand <n>")?),
            "collapse" => Command::Collapse(number(&args, "collapse <n>")?),
            "open" => Command::Open(number(&args, "open <n>")?),
            "play" => Command::Play,
            "pause" => Command::Pause,
            "stop" => Command::Stop,
            "seek" => Command::Seek(number(&args, "seek <percent>")?),
            "volume" | "vol" => Command::Volume(number(&args, "volume <0-100>")?),
            "tracks" => Command::Tracks,
            "track" => Command::Track(number(&args, "track <id>")?),
            "status" => Command::Status,
            "close" => Command::Close,
            "theme" => match args.as_slice() {
                [] => Command::Theme(None),
                [theme] => Command::Theme(Some(theme.parse()?)),
                _ => return Err(usage("theme [dark|light]")),
            },
            "log" => match args.as_slice() {
                [] => Command::Log(DEFAULT_LOG_LINES),
                _ => Command::Log(number(&args, "log [n]")?),
            },
            "save-log" => match args.as_slice() {
                [] => Command::SaveLog(None),
                [path] => Command::SaveLog(Some(PathBuf::from(path))),
                _ => return Err(usage("save-log [path]")),
            },
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => {
                return Err(PlayerError::invalid_argument(format!(
                    "Unknown command '{}', type 'help' for a list",
                    other
                )))
            }
        };
        Ok(command)
    }
}

fn usage(text: &str) -> PlayerError {
    PlayerError::invalid_argument(format!("Usage: {}", text))
}

fn number<T: FromStr>(args: &[&str], text: &str) -> Result<T, PlayerError> {
    match args {
        [value] => value.parse().map_err(|_| usage(text)),
        _ => Err(usage(text)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Interactive session reading commands from `input` and writing to `out`.
/// With `login_first` the user is asked for credentials (prefilled from the
/// settings) before the first prompt.
pub async fn run<E, R, W>(
    app: &mut App<E>,
    input: R,
    out: &mut W,
    login_first: bool,
) -> Result<()>
where
    E: MediaEngine,
    R: AsyncRead + Unpin,
    W: Write,
{
    let mut lines = BufReader::new(input).lines();
    let mut last_status: Option<PlaybackStatus> = None;

    if login_first && login(app, &mut lines, out, None, None).await?.is_none() {
        return Ok(());
    }

    let mut show_prompt = true;
    loop {
        if show_prompt {
            prompt(out, app.theme(), PROMPT)?;
        }

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                show_prompt = true;

                let command = match line.parse::<Command>() {
                    Ok(command) => command,
                    Err(e) => {
                        writeln!(out, "{}", e.user_message())?;
                        continue;
                    }
                };
                let flow = execute(app, &mut lines, out, command, &mut last_status).await?;
                if flow == Flow::Quit {
                    break;
                }
            }
            _ = app.wait_tick() => {
                show_prompt = false;
                match app.tick().await {
                    Ok(status) => {
                        if last_status.as_ref() != Some(&status) {
                            write!(out, "{}{}  ", REDRAW, status_line(&status))?;
                            prompt(out, app.theme(), PROMPT)?;
                            last_status = Some(status);
                        }
                    }
                    Err(PlayerError::EngineExited { .. }) => {
                        writeln!(out, "{}Player closed", REDRAW)?;
                        last_status = None;
                        show_prompt = true;
                    }
                    Err(e) => debug!("Status refresh failed: {}", e),
                }
            }
        }
    }

    Ok(())
}

async fn execute<E, R, W>(
    app: &mut App<E>,
    lines: &mut Lines<BufReader<R>>,
    out: &mut W,
    command: Command,
    last_status: &mut Option<PlaybackStatus>,
) -> Result<Flow>
where
    E: MediaEngine,
    R: AsyncRead + Unpin,
    W: Write,
{
    debug!("Executing {:?}", command);

    match command {
        Command::Empty => {}
        Command::Help => writeln!(out, "{}", HELP)?,
        Command::Quit => return Ok(Flow::Quit),
        Command::Login {
            server_url,
            username,
        } => {
            if app.is_authenticated() {
                writeln!(out, "Already logged in; run 'logout' first")?;
            } else {
                login(app, lines, out, server_url, username).await?;
            }
        }
        Command::Logout => {
            if report(out, app.logout().await)?.is_some() {
                *last_status = None;
                writeln!(out, "Logged out")?;
            }
        }
        Command::List => print_rows(out, &app.rows())?,
        Command::Expand(row) => {
            if report(out, app.expand(row).await)?.is_some() {
                print_rows(out, &app.rows())?;
            }
        }
        Command::Collapse(row) => {
            if report(out, app.collapse(row))?.is_some() {
                print_rows(out, &app.rows())?;
            }
        }
        Command::Open(row) => match report(out, app.open(row).await)? {
            Some(Opened::Directory(_)) => print_rows(out, &app.rows())?,
            Some(Opened::Video(name)) => {
                *last_status = None;
                writeln!(out, "Playing {}", name)?;
            }
            None => {}
        },
        Command::Play => {
            report(out, app.play().await)?;
        }
        Command::Pause => {
            report(out, app.pause().await)?;
        }
        Command::Stop => {
            *last_status = None;
            report(out, app.stop().await)?;
        }
        Command::Seek(percent) => {
            *last_status = None;
            report(out, app.seek_percent(percent).await)?;
        }
        Command::Volume(percent) => {
            if let Some(volume) = report(out, app.set_volume(percent).await)? {
                writeln!(out, "Volume {}%", volume)?;
            }
        }
        Command::Tracks => {
            if let Some(tracks) = report(out, app.audio_tracks().await)? {
                let current = app.player().and_then(|p| p.selected_track());
                for track in tracks {
                    let marker = if Some(track.id) == current { "*" } else { " " };
                    writeln!(out, "{} {:>3}  {}", marker, track.id, track.label)?;
                }
            }
        }
        Command::Track(id) => {
            report(out, app.select_audio_track(id).await)?;
        }
        Command::Status => {
            // The snapshot of the last tick is shown; a fresh one is only
            // read right after opening or moving the position.
            if app.player().is_some() && last_status.is_none() {
                *last_status = report(out, app.tick().await)?;
            }
            match (app.player(), last_status.as_ref()) {
                (None, _) => writeln!(out, "No video is open")?,
                (Some(player), Some(status)) => writeln!(
                    out,
                    "{}  {:?}  {}  volume {}%",
                    player.source().display_name(),
                    player.state(),
                    status_line(status),
                    player.volume()
                )?,
                (Some(_), None) => {}
            }
        }
        Command::Close => {
            if app.close_player().await {
                *last_status = None;
                writeln!(out, "Player closed")?;
            } else {
                writeln!(out, "No video is open")?;
            }
        }
        Command::Theme(None) => writeln!(out, "Theme: {}", app.theme())?,
        Command::Theme(Some(theme)) => {
            if report(out, app.set_theme(theme))?.is_some() {
                writeln!(out, "Theme set to {}", theme)?;
            }
        }
        Command::Log(n) => {
            for line in app.log().tail(n) {
                writeln!(out, "{}", line)?;
            }
        }
        Command::SaveLog(path) => {
            if let Some(written) = report(out, app.export_log(path.as_deref()))? {
                writeln!(out, "Log saved to {}", written.display())?;
            }
        }
    }

    Ok(Flow::Continue)
}

/// Prompts for whatever is missing, with saved values as defaults (Enter
/// accepts them), and asks again until the server accepts the credentials.
/// Returns `None` when input ends first.
async fn login<E, R, W>(
    app: &mut App<E>,
    lines: &mut Lines<BufReader<R>>,
    out: &mut W,
    mut server_url: Option<String>,
    mut username: Option<String>,
) -> Result<Option<()>>
where
    E: MediaEngine,
    R: AsyncRead + Unpin,
    W: Write,
{
    loop {
        let theme = app.theme();
        let saved = app.settings().clone();

        let url = match server_url.take() {
            Some(url) => url,
            None => match ask(lines, out, theme, "Server URL", &saved.server_url).await? {
                Some(url) => url,
                None => return Ok(None),
            },
        };
        let user = match username.take() {
            Some(user) => user,
            None => match ask(lines, out, theme, "Username", &saved.username).await? {
                Some(user) => user,
                None => return Ok(None),
            },
        };

        let password_hint = if saved.password.is_empty() { "" } else { "saved" };
        prompt(out, theme, &format!("Password [{}]: ", password_hint))?;
        let Some(password) = lines.next_line().await? else {
            return Ok(None);
        };
        let password = if password.is_empty() {
            saved.password
        } else {
            password
        };

        match app.login(Credentials::new(&url, &user, &password)).await {
            Ok(count) => {
                writeln!(out, "Logged in, {} entries in the root directory", count)?;
                print_rows(out, &app.rows())?;
                return Ok(Some(()));
            }
            Err(e) if is_retryable_login(&e) => {
                if e.error_severity() == ErrorSeverity::Minor {
                    writeln!(out, "{}", e.user_message())?;
                }
                writeln!(out, "Please try again")?;
            }
            Err(e) => {
                report(out, Err::<(), _>(e))?;
                return Ok(Some(()));
            }
        }
    }
}

/// Failures that leave the login prompt open
fn is_retryable_login(error: &PlayerError) -> bool {
    matches!(
        error,
        PlayerError::AuthRejected { .. }
            | PlayerError::TransportFailure { .. }
            | PlayerError::MalformedResponse { .. }
            | PlayerError::InvalidArgument { .. }
    )
}

async fn ask<R: AsyncRead + Unpin, W: Write>(
    lines: &mut Lines<BufReader<R>>,
    out: &mut W,
    theme: Theme,
    label: &str,
    default: &str,
) -> Result<Option<String>> {
    prompt(out, theme, &format!("{} [{}]: ", label, default))?;
    Ok(lines.next_line().await?.map(|line| {
        let line = line.trim();
        if line.is_empty() {
            default.to_string()
        } else {
            line.to_string()
        }
    }))
}

fn prompt<W: Write>(out: &mut W, theme: Theme, text: &str) -> Result<()> {
    write!(out, "{}{}{}", theme.prompt_color(), text, RESET)?;
    out.flush()?;
    Ok(())
}

/// Prints the errors the application does not surface as a notice itself
fn report<T, W: Write>(out: &mut W, result: Result<T, PlayerError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            if e.error_severity() == ErrorSeverity::Minor
                || matches!(e, PlayerError::NotAuthenticated)
            {
                writeln!(out, "{}", e.user_message())?;
            }
            Ok(None)
        }
    }
}

pub fn render_row(number: usize, row: &VisibleRow) -> String {
    let marker = match (row.is_directory, row.expanded) {
        (true, true) => "▾",
        (true, false) => "▸",
        (false, _) => " ",
    };
    format!("{:>4}  {}{} {}", number, "  ".repeat(row.depth), marker, row.display_name)
}

fn print_rows<W: Write>(out: &mut W, rows: &[VisibleRow]) -> Result<()> {
    if rows.is_empty() {
        writeln!(out, "Nothing to show; log in first")?;
        return Ok(());
    }
    for (index, row) in rows.iter().enumerate() {
        writeln!(out, "{}", render_row(index + 1, row))?;
    }
    Ok(())
}

/// Slider and "MM:SS / MM:SS" label of a status snapshot
pub fn status_line(status: &PlaybackStatus) -> String {
    format!("[{}] {}", slider(status.slider), status.label)
}

fn slider(percent: u8) -> String {
    const WIDTH: usize = 20;
    let filled = (percent.min(100) as usize * WIDTH) / 100;
    format!("{}{}", "#".repeat(filled), "-".repeat(WIDTH - filled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::FileTree;

    #[test]
    fn test_parse_commands() {
        assert_eq!("".parse::<Command>().unwrap(), Command::Empty);
        assert_eq!("  ls ".parse::<Command>().unwrap(), Command::List);
        assert_eq!("tree".parse::<Command>().unwrap(), Command::List);
        assert_eq!("open 3".parse::<Command>().unwrap(), Command::Open(3));
        assert_eq!("seek 42.5".parse::<Command>().unwrap(), Command::Seek(42.5));
        assert_eq!("volume 150".parse::<Command>().unwrap(), Command::Volume(150));
        assert_eq!("track -1".parse::<Command>().unwrap(), Command::Track(-1));
        assert_eq!("log".parse::<Command>().unwrap(), Command::Log(DEFAULT_LOG_LINES));
        assert_eq!("THEME dark".parse::<Command>().unwrap(), Command::Theme(Some(Theme::Dark)));
        assert_eq!(
            "login https://cloud.example.com alice".parse::<Command>().unwrap(),
            Command::Login {
                server_url: Some("https://cloud.example.com".to_string()),
                username: Some("alice".to_string()),
            }
        );
        assert_eq!(
            "save-log /tmp/out.log".parse::<Command>().unwrap(),
            Command::SaveLog(Some(PathBuf::from("/tmp/out.log")))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!("open".parse::<Command>().is_err());
        assert!("open two".parse::<Command>().is_err());
        assert!("expand -1".parse::<Command>().is_err());
        assert!("login onlyurl".parse::<Command>().is_err());
        assert!("theme blue".parse::<Command>().is_err());
        assert!("rm -rf".parse::<Command>().is_err());
    }

    #[test]
    fn test_render_row() {
        let mut tree = FileTree::new();
        let root = tree.root();
        tree.replace_children(
            root,
            vec![
                crate::models::RemoteEntry::from_relative_path("Videos/", true),
                crate::models::RemoteEntry::from_relative_path("a.mp4", false),
            ],
        )
        .unwrap();
        let rows = tree.visible_rows();

        assert_eq!(render_row(1, &rows[0]), "   1  ▸ Videos/");
        assert_eq!(render_row(2, &rows[1]), "   2    a.mp4");
    }

    #[test]
    fn test_retryable_login_errors() {
        let rejected = PlayerError::AuthRejected {
            path: "".to_string(),
            status: 401,
            reason: "Unauthorized".to_string(),
        };
        assert!(is_retryable_login(&rejected));
        assert!(is_retryable_login(&PlayerError::transport("http://x", "refused")));
        assert!(is_retryable_login(&PlayerError::invalid_argument("Username is required")));
        assert!(!is_retryable_login(&PlayerError::playback("bind failed")));
    }

    #[test]
    fn test_slider() {
        assert_eq!(slider(0), "--------------------");
        assert_eq!(slider(50), "##########----------");
        assert_eq!(slider(100), "####################");
    }
}
