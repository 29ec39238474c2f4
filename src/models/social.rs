use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Social platforms an account can be linked to.
///
/// LinkedIn and Twitter appear in the connection set but do not have a
/// working OAuth handshake yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Provider {
    Instagram,
    Facebook,
    Linkedin,
    Twitter,
}

impl Provider {
    /// `type` tag carried by this provider's cross-window callback message.
    pub fn message_type(&self) -> String {
        format!("{self}_callback")
    }
}

/// Provider-specific details of a linked account.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConnectionDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
}

/// Link state of one provider, as reported by the backend.
///
/// The handshake never writes this directly; it only triggers a re-fetch of
/// ground truth after reaching a terminal state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConnectionStatus {
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub detail: Option<ConnectionDetail>,
}

/// Full connection set for one app user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SocialConnections {
    #[serde(default)]
    pub instagram: ConnectionStatus,
    #[serde(default)]
    pub linkedin: ConnectionStatus,
    #[serde(default)]
    pub twitter: ConnectionStatus,
    #[serde(default)]
    pub facebook: ConnectionStatus,
}

impl SocialConnections {
    pub fn get(&self, provider: Provider) -> &ConnectionStatus {
        match provider {
            Provider::Instagram => &self.instagram,
            Provider::Facebook => &self.facebook,
            Provider::Linkedin => &self.linkedin,
            Provider::Twitter => &self.twitter,
        }
    }

    pub fn connected_count(&self) -> usize {
        [&self.instagram, &self.linkedin, &self.twitter, &self.facebook]
            .into_iter()
            .filter(|status| status.connected)
            .count()
    }
}
