use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(
        "form controls '{category_control}' and '{subcategory_control}' not present after {waited:?}"
    )]
    BindTimeout {
        category_control: String,
        subcategory_control: String,
        waited: Duration,
    },
    #[error("form control '{0}' is not present")]
    ControlMissing(String),
}

/// Why a subcategory listing could not be obtained.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("listing endpoint returned HTTP {status}")]
    HttpStatus { status: u16 },
    #[error("listing request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("listing response is not a subcategory array: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid listing endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}
