use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Base URL of the Posting Expert backend API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Meta app client id used for the Instagram and Facebook OAuth dialogs.
    #[serde(default = "default_oauth_client_id")]
    pub oauth_client_id: String,

    /// Redirect target the provider sends the popup back to.
    #[serde(default = "default_oauth_redirect_uri")]
    pub oauth_redirect_uri: String,

    /// Origin a cross-window callback message must carry to be trusted.
    #[serde(default = "default_trusted_message_origin")]
    pub trusted_message_origin: String,

    /// Job status poll interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Popup closure-detection interval in milliseconds.
    #[serde(default = "default_closure_check_ms")]
    pub closure_check_interval_ms: u64,
}

fn default_api_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_oauth_client_id() -> String {
    // Meta app id shared by the Instagram and Facebook dialogs.
    "1095157869184608".to_string()
}

fn default_oauth_redirect_uri() -> String {
    "https://postingexpert.com/connect".to_string()
}

fn default_trusted_message_origin() -> String {
    "https://postingexpert.com".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_closure_check_ms() -> u64 {
    1000
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn closure_check_interval(&self) -> Duration {
        Duration::from_millis(self.closure_check_interval_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            oauth_client_id: default_oauth_client_id(),
            oauth_redirect_uri: default_oauth_redirect_uri(),
            trusted_message_origin: default_trusted_message_origin(),
            poll_interval_ms: default_poll_interval_ms(),
            closure_check_interval_ms: default_closure_check_ms(),
        }
    }
}
