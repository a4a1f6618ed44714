use thiserror::Error;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, RosterError>;

impl RosterError {
    /// Wrap an I/O failure with the path it happened on.
    pub fn io(action: &str, path: &std::path::Path, err: std::io::Error) -> Self {
        Self::Io(format!("Failed to {} '{}': {}", action, path.display(), err))
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

impl From<std::io::Error> for RosterError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RosterError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
