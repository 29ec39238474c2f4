//! Example: Enqueue Probe
//!
//! Submits one content-generation job against a real backend and polls it
//! to a terminal state, printing every observed transition.
//!
//! Usage:
//!   cargo run --example enqueue_probe
//!
//! Prerequisites:
//!   - .env file (or environment) with API_BASE_URL pointing at the backend

use std::sync::Arc;

use posting_expert_client::config::AppConfig;
use posting_expert_client::models::job::{ContentStyle, JobRequest, PlatformSelection, Requester};
use posting_expert_client::orchestrator::job::{JobOrchestrator, JobState};
use posting_expert_client::services::api::ApiClient;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration");
    println!("🔌 Enqueue probe against {}", config.api_base_url);

    let api = Arc::new(ApiClient::from_config(&config));
    let orchestrator = JobOrchestrator::from_config(api, &config);

    let request = JobRequest::new(
        "connectivity probe - eco friendly products",
        1,
        ContentStyle::Informative,
        PlatformSelection::all(),
        false,
        Requester::new("probe", "probe"),
    );

    let job_id = orchestrator.submit(request).await?;
    println!("✅ Enqueued as job {job_id}");

    let mut updates = orchestrator.subscribe();
    loop {
        updates.changed().await?;
        let state = updates.borrow().clone();
        let JobState::Active(handle) = state else {
            continue;
        };
        println!("   status: {}", handle.status.label());
        if handle.status.is_terminal() {
            if let Some(result) = handle.result {
                println!("🎉 Result: {result}");
            }
            if let Some(error) = handle.error {
                println!("❌ Error: {error}");
            }
            break;
        }
    }

    Ok(())
}
