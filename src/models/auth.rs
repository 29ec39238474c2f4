use chrono::{DateTime, Duration, Utc};

/// Bearer token handed out at login, with its absolute expiry.
///
/// An expired token is never attached to a request; the caller is expected
/// to send the user back through login instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    /// Build from the login response's `expiresIn` seconds.
    pub fn new(token: impl Into<String>, expires_in_secs: i64) -> Self {
        Self {
            token: token.into(),
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}
