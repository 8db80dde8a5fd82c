use thiserror::Error;
use tokio::sync::mpsc;

use crate::process::UnitKey;
use crate::review::CountryHarvest;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("No valid app IDs provided")]
    NoValidAppIds,

    #[error("Invalid country code: {0:?}")]
    InvalidCountry(String),
    #[error("Unknown platform: {0:?}")]
    UnknownPlatform(String),

    #[error("Page {0} is out of range, pages start at 1")]
    PageOutOfRange(u32),
    #[error("App not found in the {country} store: {app_id}")]
    AppNotFound { app_id: String, country: String },
    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),
    #[error("Couldn't send a harvest through a channel.")]
    RuntimeSendError,

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

impl From<mpsc::error::SendError<(UnitKey, CountryHarvest)>> for Error {
    fn from(_value: mpsc::error::SendError<(UnitKey, CountryHarvest)>) -> Self {
        Error::RuntimeSendError
    }
}
