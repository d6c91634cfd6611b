// WebDAV access organized by functionality

pub mod config;
pub mod connection;
pub mod url_management;
pub mod walker;

// Re-export main types for convenience
pub use config::WebDAVConfig;
pub use connection::WebDAVConnection;
pub use url_management::WebDAVUrlManager;
pub use walker::{DirectoryLister, WebDAVWalker};

#[cfg(test)]
mod url_construction_tests;
