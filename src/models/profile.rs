use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Signed-in user's profile as shown on the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub username: String,
    pub email: String,
    pub business_type: String,
    pub joined_at: Option<DateTime<Utc>>,
    pub posts_created: u64,
    pub connected_accounts: u64,
}

/// Raw `GET /user/profile` body. Every field is optional; the backend has
/// shipped several shapes of this response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileResponse {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub business_type: Option<String>,
    /// Unix seconds.
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub posts_created: Option<u64>,
    #[serde(default)]
    pub connected_accounts: Option<u64>,
}

impl ProfileResponse {
    /// Apply the dashboard's fallback defaults for missing fields.
    pub fn into_profile(self, fallback_username: &str) -> UserProfile {
        UserProfile {
            username: self
                .username
                .unwrap_or_else(|| fallback_username.to_string()),
            email: self.email.unwrap_or_else(|| "user@example.com".to_string()),
            business_type: self
                .business_type
                .unwrap_or_else(|| "Not specified".to_string()),
            joined_at: self
                .created_at
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            posts_created: self.posts_created.unwrap_or(0),
            connected_accounts: self.connected_accounts.unwrap_or(0),
        }
    }
}
