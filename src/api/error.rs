use thiserror::Error;

/// Failure taxonomy for backend calls.
///
/// Every operation is a single attempt: failures are reported to the caller
/// immediately, never retried or swallowed here. The controller is the one
/// place that turns these into operator-facing state.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never completed (connect failure, dropped connection).
    #[error("backend unreachable: {0}")]
    Transport(#[source] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("backend returned HTTP {status}")]
    Status { status: u16 },

    /// A success status arrived but the body did not match the expected
    /// shape. Same user-visible class as a bad status: the response was
    /// received and was not usable.
    #[error("malformed response from backend: {0}")]
    Decode(#[source] reqwest::Error),
}
