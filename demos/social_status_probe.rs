//! Example: Social Status Probe
//!
//! Fetches and prints the per-provider connection set for one app user.
//!
//! Usage:
//!   cargo run --example social_status_probe -- <app_user>
//!
//! Prerequisites:
//!   - .env file (or environment) with API_BASE_URL pointing at the backend

use std::sync::Arc;

use posting_expert_client::config::AppConfig;
use posting_expert_client::models::social::Provider;
use posting_expert_client::services::api::ApiClient;
use posting_expert_client::services::connections::ConnectionRegistry;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let app_user = std::env::args().nth(1).unwrap_or_else(|| "probe".to_string());

    let config = AppConfig::from_env().expect("Failed to load configuration");
    println!("🔌 Social status probe against {}", config.api_base_url);

    let api = Arc::new(ApiClient::from_config(&config));
    let registry = ConnectionRegistry::new(api);
    let connections = registry.refresh(&app_user).await?;

    for provider in [
        Provider::Instagram,
        Provider::Linkedin,
        Provider::Twitter,
        Provider::Facebook,
    ] {
        let status = connections.get(provider);
        let mark = if status.connected { "✓" } else { "○" };
        print!("   {mark} {provider}");
        if let Some(detail) = &status.detail {
            if let Some(username) = &detail.username {
                print!(" @{username}");
            }
            if let Some(page) = &detail.page_name {
                print!(" via {page}");
            }
        }
        println!();
    }
    println!("Connected: {}/4", connections.connected_count());

    Ok(())
}
