use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing AWS credentials: {0}")]
    MissingCredentials(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Cost Explorer returned {status}: {code}: {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Malformed Cost Explorer response: {0}")]
    MalformedResponse(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BillingError>;
