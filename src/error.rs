use std::fmt;

/// Application-level errors. Per-page decode failures are deliberately not
/// represented here: they are local to one file and surface as `None` from
/// `PageBuffer::resolve`.
#[derive(Debug)]
pub enum Error {
    /// Folder unreadable or missing.
    Io(std::io::Error),
    /// Settings file could not be parsed or written.
    Settings(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Settings(msg) => write!(f, "settings error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Settings(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Settings(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
