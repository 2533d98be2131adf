use thiserror::Error;

#[derive(Error, Debug)]
pub enum FleetError {
    #[error("http request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("fleet controller rejected request: {0}")]
    Rejected(String),

    #[error("invalid response from fleet controller: {0}")]
    InvalidResponse(String),
}

impl From<FleetError> for hive_core::CoreError {
    fn from(err: FleetError) -> Self {
        hive_core::CoreError::EventLog(err.to_string())
    }
}
