use thiserror::Error;

/// Tagged result of a single provider call.
///
/// The retry loop branches on the tag instead of inspecting error strings.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutcome<T> {
    Success(T),
    /// Timeout, connection failure or an explicit rate-limit response.
    TransientFailure(String),
    /// Any other error response or a malformed payload.
    PermanentFailure(String),
}

impl<T> ProviderOutcome<T> {
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ProviderOutcome<U> {
        match self {
            ProviderOutcome::Success(v) => ProviderOutcome::Success(f(v)),
            ProviderOutcome::TransientFailure(e) => ProviderOutcome::TransientFailure(e),
            ProviderOutcome::PermanentFailure(e) => ProviderOutcome::PermanentFailure(e),
        }
    }
}

#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("Missing provider credentials: set FINNHUB_API_KEY")]
    MissingCredentials,

    #[error("Invalid resolution '{0}': expected one of 1, 5, 15, 30, 60, D, W, M")]
    InvalidResolution(String),

    #[error("Transient provider error: {0}")]
    Transient(String),

    #[error("Provider error: {0}")]
    Permanent(String),

    #[error("Market data provider unavailable (circuit open)")]
    CircuitOpen,

    #[error("Cache error: {0}")]
    Cache(#[from] sqlx::Error),
}

pub type MarketDataResult<T> = Result<T, MarketDataError>;
