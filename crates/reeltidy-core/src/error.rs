use thiserror::Error;

/// Errors surfaced by the core library.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("parse failed: {0}")]
    Parse(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
