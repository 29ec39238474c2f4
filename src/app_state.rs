use std::sync::Arc;

use crate::config::AppConfig;
use crate::orchestrator::handshake::PopupHandshakeOrchestrator;
use crate::orchestrator::job::JobOrchestrator;
use crate::orchestrator::window::{MessageHub, WindowOpener};
use crate::services::api::ApiClient;
use crate::services::connections::ConnectionRegistry;

/// Shared client state wiring every orchestrator to one backend and one
/// window system. A UI surface builds this once and hands the pieces to
/// its views.
#[derive(Clone)]
pub struct ClientState {
    pub api: Arc<ApiClient>,
    pub jobs: Arc<JobOrchestrator>,
    pub handshakes: Arc<PopupHandshakeOrchestrator>,
    pub connections: Arc<ConnectionRegistry>,
    pub messages: Arc<MessageHub>,
}

impl ClientState {
    pub fn new(config: &AppConfig, opener: Arc<dyn WindowOpener>) -> Self {
        let api = Arc::new(ApiClient::from_config(config));
        let messages = MessageHub::new();
        Self {
            jobs: Arc::new(JobOrchestrator::from_config(Arc::clone(&api), config)),
            handshakes: Arc::new(PopupHandshakeOrchestrator::new(
                opener,
                Arc::clone(&messages),
                config,
            )),
            connections: Arc::new(ConnectionRegistry::new(Arc::clone(&api))),
            api,
            messages,
        }
    }
}
