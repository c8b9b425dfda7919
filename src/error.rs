// Error taxonomy for talking to the remote service. Display strings are
// what the user sees, so they stay verbatim where the server supplies
// the text and generic everywhere else.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// No identity or secret stored locally; nothing was sent.
    #[error("Auth not set, please login.")]
    Unauthenticated,

    /// The service answered 401. Carries the server's message.
    #[error("{0}")]
    AuthenticationRejected(String),

    /// Any other 4xx. Carries the raw response body.
    #[error("{body}")]
    ClientError { status: StatusCode, body: String },

    /// A status outside the handled ranges, or an undecodable body.
    #[error("Unknown Error")]
    Unknown { status: StatusCode },

    #[error("Unknown Error")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid header value")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Lookback of {0} days is out of range")]
    InvalidWindow(u32),

    /// Logged in, but no team list was cached (e.g. the team fetch at
    /// login was rejected).
    #[error("No teams cached, please login.")]
    NoTeams,

    /// The worker thread running this team's request panicked.
    #[error("Unknown Error")]
    WorkerPanicked,
}

impl ApiError {
    /// Map a non-success response to the matching variant.
    pub fn from_response(status: StatusCode, body: String) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            ApiError::AuthenticationRejected(rejection_message(body))
        } else if status.is_client_error() {
            ApiError::ClientError { status, body }
        } else {
            ApiError::Unknown { status }
        }
    }
}

/// Pull `message` out of a JSON error body, or keep the body as-is.
fn rejection_message(body: String) -> String {
    #[derive(serde::Deserialize)]
    struct Rejection {
        message: String,
    }

    match serde_json::from_str::<Rejection>(&body) {
        Ok(r) => r.message,
        Err(_) => body,
    }
}
