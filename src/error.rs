use thiserror::Error;

#[derive(Error, Debug)]
pub enum TollError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("Unexpected status {status} from {endpoint}")]
    UnexpectedStatus { endpoint: String, status: u16 },
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
    #[error("Queue error: {0}")]
    Queue(#[from] lapin::Error),
    #[error("Audit error: {0}")]
    Audit(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TollError {
    /// Errors that can only happen while the process is starting and should
    /// terminate it rather than be recovered by the worker loops.
    pub fn is_fatal_startup(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Queue(_) | Self::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, TollError>;
