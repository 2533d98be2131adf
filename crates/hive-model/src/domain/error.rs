use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown execution mode: {0}")]
    UnknownMode(String),
    #[error("unknown execution status: {0}")]
    UnknownStatus(String),
}
