use reqwest::StatusCode;

/// Errors of the authenticated request pipeline.
///
/// Only a 401 is handled locally (refresh, then retry once); everything else
/// reaches the caller unchanged.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// network / connectivity, never retried
    #[error("HTTP request failed: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },

    /// the retried attempt was rejected as well
    #[error("request unauthorized with HTTP {status} after credential refresh")]
    AuthorizationFailure { status: StatusCode },

    /// refresh failed, the session is terminated and a new login is required
    #[error("session expired: {reason}")]
    AuthenticationExpired { reason: String },

    /// the refresh endpoint rejected the refresh token
    #[error("refresh rejected with HTTP {status}")]
    Unauthorized { status: StatusCode },

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("request rejected with HTTP {status}: {body}")]
    Validation { status: StatusCode, body: String },

    #[error("server error HTTP {status}: {body}")]
    Server { status: StatusCode, body: String },

    #[error("invalid response body: {source}")]
    Decode {
        #[from]
        source: serde_json::Error,
    },

    #[error("invalid request `{path}`: {reason}")]
    InvalidRequest { path: String, reason: String },
}

impl AuthError {
    /// The caller has to present a fresh login
    pub fn is_session_terminated(&self) -> bool {
        matches!(self, AuthError::AuthenticationExpired { .. })
    }

    /// Maps a non-success status that is not handled by the refresh path
    pub(crate) fn from_status(status: StatusCode, body: String) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            AuthError::AuthorizationFailure { status }
        } else if status.is_server_error() {
            AuthError::Server { status, body }
        } else {
            AuthError::Validation { status, body }
        }
    }
}
