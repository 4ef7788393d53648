use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScreenerError {
    #[error("no data available: {0}")]
    DataUnavailable(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("calculation error: {0}")]
    Calculation(String),

    #[error("gateway error: {0}")]
    Gateway(String),
}
