use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarqueeError {
    /// The metadata backend could not be reached or answered with an error.
    /// Recovered by skipping the current tick.
    #[error("metadata source unavailable: {0}")]
    SourceUnavailable(String),
    /// Fatal at startup, before the ticker runs.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}
