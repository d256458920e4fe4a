// Bearer-token session state.
//
// One session per account. The token is only ever read through
// `LockApi::ensure_session`, which re-logs in once the validity window has
// elapsed.

use std::time::{Duration, Instant};

use secrecy::SecretString;
use serde::Deserialize;

/// An access token with the moment it was issued and how long it lives.
#[derive(Debug, Clone)]
pub struct Session {
    token: SecretString,
    issued_at: Instant,
    validity: Duration,
}

impl Session {
    pub fn new(token: SecretString, validity: Duration) -> Self {
        Self {
            token,
            issued_at: Instant::now(),
            validity,
        }
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    pub fn age(&self) -> Duration {
        self.issued_at.elapsed()
    }

    /// A session is expired once its age exceeds the validity window.
    pub fn is_expired(&self) -> bool {
        self.age() > self.validity
    }
}

/// Body of a `POST login` response.
#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub access_token: Option<String>,
    /// Validity window in milliseconds.
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub errcode: i64,
    #[serde(default)]
    pub errmsg: Option<String>,
}
