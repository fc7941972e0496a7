use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::helpers::jwt::jwt_expiration;

pub const TOKEN_VALUE_STUB: &str = "";

/// Short-lived bearer credential, only ever sent as an `Authorization` header value
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

/// Long-lived credential exchanged for a new pair, rotated on every refresh
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `exp` claim when the token is a JWT
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        jwt_expiration(&self.0).ok()
    }
}

impl RefreshToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// tokens never end up in logs
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        redacted(f, "AccessToken", self.is_empty())
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        redacted(f, "RefreshToken", self.is_empty())
    }
}

fn redacted(f: &mut fmt::Formatter<'_>, name: &str, empty: bool) -> fmt::Result {
    if empty {
        write!(f, "{}(<empty>)", name)
    } else {
        write!(f, "{}(<redacted>)", name)
    }
}

/// The (access, refresh) pair of one authenticated context.
/// Both non-empty means authenticated, anything else is treated as unauthenticated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access: AccessToken,
    pub refresh: RefreshToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::Authenticated => "authenticated",
        }
    }
}

impl Session {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: AccessToken::new(access),
            refresh: RefreshToken::new(refresh),
        }
    }

    pub fn empty() -> Self {
        Self::new(TOKEN_VALUE_STUB, TOKEN_VALUE_STUB)
    }

    pub fn state(&self) -> SessionState {
        if self.access.is_empty() || self.refresh.is_empty() {
            SessionState::Unauthenticated
        } else {
            SessionState::Authenticated
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }
}
