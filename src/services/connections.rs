use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::models::social::{Provider, SocialConnections};
use crate::services::api::{ApiClient, ApiError};

/// Tracks the per-provider connection set for one app user.
///
/// The set is only ever replaced wholesale from `GET /social/status`;
/// handshake outcomes trigger a refresh but never write link state
/// themselves. Concurrent refreshes (two providers connecting around the
/// same time) are sequenced so a stale response cannot overwrite a fresher
/// one.
pub struct ConnectionRegistry {
    api: Arc<ApiClient>,
    state: watch::Sender<SocialConnections>,
    refresh_seq: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new(api: Arc<ApiClient>) -> Self {
        let (state, _) = watch::channel(SocialConnections::default());
        Self {
            api,
            state,
            refresh_seq: AtomicU64::new(0),
        }
    }

    /// Latest known connection set.
    pub fn current(&self) -> SocialConnections {
        self.state.borrow().clone()
    }

    /// Subscription for UI updates.
    pub fn subscribe(&self) -> watch::Receiver<SocialConnections> {
        self.state.subscribe()
    }

    /// Re-query the backend and replace the set. A response belonging to a
    /// refresh that was superseded while in flight is discarded.
    pub async fn refresh(&self, app_user: &str) -> Result<SocialConnections, ApiError> {
        let seq = self.refresh_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let fresh = self.api.social_status(app_user).await?;
        if self.refresh_seq.load(Ordering::SeqCst) == seq {
            self.state.send_replace(fresh.clone());
        } else {
            tracing::debug!(app_user, seq, "discarding superseded social status response");
        }
        Ok(fresh)
    }

    /// Sever a provider link, then re-fetch ground truth. The backend's
    /// error string is surfaced verbatim on failure.
    pub async fn disconnect(&self, provider: Provider, app_user: &str) -> Result<(), ApiError> {
        self.api.disconnect(provider, app_user).await?;
        tracing::info!(provider = %provider, app_user, "provider disconnected");
        self.refresh(app_user).await?;
        Ok(())
    }
}
