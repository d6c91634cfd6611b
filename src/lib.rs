pub mod app;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod log_buffer;
pub mod models;
pub mod notify;
pub mod playback;
pub mod services;
pub mod settings;
pub mod shell;
pub mod test_utils;
pub mod tree;
pub mod webdav_xml_parser;

pub use app::App;
pub use config::Config;
pub use errors::{PlayerError, PlayerResult};
