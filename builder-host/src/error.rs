use thiserror::Error;

pub type Result<T> = std::result::Result<T, HostError>;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("unable to open host session: {0}")]
    Connect(String),

    #[error("{command} failed: {detail}")]
    Command { command: String, detail: String },

    /// The descriptor exists but could not be read or parsed. Callers
    /// must not collapse this into "guest not found".
    #[error("unable to open descriptor {path}: {reason}")]
    Descriptor { path: String, reason: String },

    #[error("guest creation failed: {0}")]
    Create(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
