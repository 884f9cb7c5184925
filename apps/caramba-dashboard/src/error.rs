use thiserror::Error;

/// Shown when a failed response carries no readable `detail`.
pub const UNPARSABLE_ERROR_DETAIL: &str = "Failed to parse error response.";

/// Failures of a panel API call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The panel answered 401; the session is gone and the console must leave.
    #[error("Session expired.")]
    SessionExpired,
    #[error("{0}")]
    RequestFailed(String),
    /// A success response whose body did not match the expected shape.
    #[error("Malformed response from server.")]
    MalformedResponse,
}

impl ApiError {
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::RequestFailed("Request timed out.".to_string())
        } else {
            ApiError::RequestFailed(err.to_string())
        }
    }
}
