use thiserror::Error;

#[derive(Debug, Error)]
pub enum RtError {
    #[error("model artifact malformed: {0}")]
    Malformed(String),
    #[error("model backend error: {0}")]
    Backend(String),
    #[error("input width {got}, model expects {expected}")]
    InputWidth { got: usize, expected: usize },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RtError>;
