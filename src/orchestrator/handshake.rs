//! Cross-window OAuth handshake: popup open, message-vs-closure race,
//! terminal teardown.
//!
//! Each `connect` call spawns one session task owning the popup handle, a
//! message subscription, and the closure-detection ticker. The task ends in
//! exactly one of success, failure, or abandonment, and releases all three
//! resources on the way out — whichever of "message received" and "popup
//! closed" happens first wins, and the loser is disarmed immediately.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Url;
use tokio::sync::watch;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::job::Requester;
use crate::models::message::{CallbackMessage, InboundMessage};
use crate::models::social::Provider;
use crate::orchestrator::handle::OperationHandle;
use crate::orchestrator::window::{MessageHub, MessageSubscription, PopupWindow, WindowOpener};

/// Observable state of one OAuth session.
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeState {
    /// Popup open; waiting for the callback message or user closure.
    AwaitingPopup,
    /// A tagged message arrived and is being validated.
    Resolving,
    Succeeded(LinkedAccount),
    Failed { message: String },
    /// Popup closed before any message arrived. Not an error; no message is
    /// shown.
    Abandoned,
}

impl HandshakeState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HandshakeState::Succeeded(_) | HandshakeState::Failed { .. } | HandshakeState::Abandoned
        )
    }
}

/// Provider detail delivered by a successful handshake. Display-only; the
/// authoritative link state comes from the next connection-set refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkedAccount {
    pub username: Option<String>,
    pub user_id: Option<String>,
    pub page_name: Option<String>,
    pub app_user: Option<String>,
}

impl From<&CallbackMessage> for LinkedAccount {
    fn from(message: &CallbackMessage) -> Self {
        Self {
            username: message.instagram_username.clone(),
            user_id: message.instagram_user_id.clone(),
            page_name: message.page_name.clone(),
            app_user: message.app_user.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    /// The user agent refused to open the popup. Nothing was registered.
    #[error("Popup blocked! Please allow popups for this site.")]
    PopupBlocked,

    /// No OAuth dialog is wired up for this provider yet.
    #[error("{0} connection coming soon")]
    ProviderUnsupported(Provider),

    /// A session for this provider is still awaiting its outcome.
    #[error("a {0} connection attempt is already in progress")]
    AlreadyPending(Provider),

    #[error("failed to build the authorization URL")]
    InvalidDialogUrl,
}

/// OAuth dialog constants per provider.
struct DialogProfile {
    dialog_url: &'static str,
    scope: &'static str,
    window_name: &'static str,
    features: &'static str,
}

fn dialog_profile(provider: Provider) -> Option<DialogProfile> {
    match provider {
        Provider::Instagram => Some(DialogProfile {
            // Instagram business accounts authorize through the Facebook
            // Graph dialog.
            dialog_url: "https://www.facebook.com/v21.0/dialog/oauth",
            scope: "instagram_business_content_publish,instagram_business_basic,\
                    pages_show_list,pages_read_engagement",
            window_name: "instagram_oauth",
            features: "width=600,height=700,scrollbars=yes,resizable=yes",
        }),
        Provider::Facebook => Some(DialogProfile {
            dialog_url: "https://www.facebook.com/v20.0/dialog/oauth",
            scope: "pages_show_list,pages_read_engagement,pages_manage_posts",
            window_name: "facebook_oauth",
            features: "width=600,height=600,scrollbars=yes,resizable=yes",
        }),
        Provider::Linkedin | Provider::Twitter => None,
    }
}

/// Runs popup handshakes, at most one active session per provider.
pub struct PopupHandshakeOrchestrator {
    opener: Arc<dyn WindowOpener>,
    messages: Arc<MessageHub>,
    client_id: String,
    redirect_uri: String,
    trusted_origin: String,
    closure_check_interval: Duration,
    sessions: Mutex<HashMap<Provider, watch::Receiver<HandshakeState>>>,
}

impl PopupHandshakeOrchestrator {
    pub fn new(
        opener: Arc<dyn WindowOpener>,
        messages: Arc<MessageHub>,
        config: &AppConfig,
    ) -> Self {
        Self {
            opener,
            messages,
            client_id: config.oauth_client_id.clone(),
            redirect_uri: config.oauth_redirect_uri.clone(),
            trusted_origin: config.trusted_message_origin.clone(),
            closure_check_interval: config.closure_check_interval(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Open the provider's consent dialog in a popup and watch it to a
    /// terminal state. The requester's username doubles as the anti-forgery
    /// `state` value, matching what the backend verifies on callback.
    pub fn connect(
        &self,
        provider: Provider,
        requester: &Requester,
    ) -> Result<OperationHandle<HandshakeState>, HandshakeError> {
        let Some(profile) = dialog_profile(provider) else {
            return Err(HandshakeError::ProviderUnsupported(provider));
        };

        let mut sessions = self.sessions.lock().expect("session lock poisoned");
        if let Some(existing) = sessions.get(&provider) {
            // Sender still alive and not terminal means the session task is
            // still racing message against closure.
            if existing.has_changed().is_ok() && !existing.borrow().is_terminal() {
                return Err(HandshakeError::AlreadyPending(provider));
            }
        }

        let url = self.authorize_url(&profile, requester)?;
        tracing::info!(provider = %provider, url = %url, "opening OAuth popup");

        let Some(popup) = self
            .opener
            .open(url.as_str(), profile.window_name, profile.features)
        else {
            // Blocked: fail before any listener or ticker exists.
            metrics::counter!("handshakes_blocked").increment(1);
            return Err(HandshakeError::PopupBlocked);
        };

        // The listener registers only once the popup is actually open.
        let subscription = self.messages.subscribe();
        let (tx, rx) = watch::channel(HandshakeState::AwaitingPopup);
        let session = HandshakeSession {
            id: Uuid::new_v4(),
            provider,
            popup,
            subscription,
            trusted_origin: self.trusted_origin.clone(),
            closure_check_interval: self.closure_check_interval,
            state: tx,
        };
        let task = tokio::spawn(session.run());

        sessions.insert(provider, rx.clone());
        Ok(OperationHandle::new(rx, task))
    }

    /// Latest state of the most recent session for `provider`, if any.
    pub fn session_state(&self, provider: Provider) -> Option<HandshakeState> {
        self.sessions
            .lock()
            .expect("session lock poisoned")
            .get(&provider)
            .map(|rx| rx.borrow().clone())
    }

    fn authorize_url(
        &self,
        profile: &DialogProfile,
        requester: &Requester,
    ) -> Result<Url, HandshakeError> {
        Url::parse_with_params(
            profile.dialog_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", profile.scope),
                ("response_type", "code"),
                ("state", requester.username.as_str()),
            ],
        )
        .map_err(|_| HandshakeError::InvalidDialogUrl)
    }
}

/// One in-flight session; owns everything that must be torn down.
struct HandshakeSession {
    id: Uuid,
    provider: Provider,
    popup: Box<dyn PopupWindow>,
    subscription: MessageSubscription,
    trusted_origin: String,
    closure_check_interval: Duration,
    state: watch::Sender<HandshakeState>,
}

impl HandshakeSession {
    async fn run(mut self) {
        let mut closure_ticks = tokio::time::interval(self.closure_check_interval);
        closure_ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Consume the immediate tick; the first closure check happens one
        // interval after open.
        closure_ticks.tick().await;

        let outcome = loop {
            tokio::select! {
                // When a message and a closure tick are both ready, the
                // message wins; the popup posting its result and closing
                // itself in the same instant must not read as abandonment.
                biased;
                message = self.subscription.recv() => {
                    match message {
                        Some(message) => {
                            if let Some(terminal) = self.inspect_message(message) {
                                break terminal;
                            }
                        }
                        // Hub gone; nothing can arrive anymore.
                        None => break HandshakeState::Abandoned,
                    }
                }
                _ = closure_ticks.tick() => {
                    if self.popup.is_closed() {
                        tracing::info!(
                            session = %self.id,
                            provider = %self.provider,
                            "popup closed before a callback message",
                        );
                        break HandshakeState::Abandoned;
                    }
                }
            }
        };

        self.finish(outcome);
    }

    /// Validate one inbound message. Returns the terminal state it implies,
    /// or `None` when the message is not this session's callback.
    fn inspect_message(&self, message: InboundMessage) -> Option<HandshakeState> {
        if !CallbackMessage::tag_matches(self.provider, &message.data) {
            return None;
        }
        if message.origin != self.trusted_origin {
            tracing::warn!(
                session = %self.id,
                provider = %self.provider,
                origin = %message.origin,
                "dropping callback message from untrusted origin",
            );
            return None;
        }
        let _ = self.state.send(HandshakeState::Resolving);

        let callback = match CallbackMessage::from_value(&message.data) {
            Ok(callback) => callback,
            Err(err) => {
                tracing::warn!(
                    session = %self.id,
                    provider = %self.provider,
                    error = %err,
                    "malformed callback message",
                );
                // Keep waiting; the real callback may still arrive.
                let _ = self.state.send(HandshakeState::AwaitingPopup);
                return None;
            }
        };

        Some(if callback.success {
            HandshakeState::Succeeded(LinkedAccount::from(&callback))
        } else {
            HandshakeState::Failed {
                message: callback
                    .error
                    .unwrap_or_else(|| "Connection failed".to_string()),
            }
        })
    }

    /// Terminal teardown: close the popup if still open, remove the message
    /// listener, let the closure ticker die with the task — in that order.
    fn finish(self, outcome: HandshakeState) {
        if !self.popup.is_closed() {
            self.popup.close();
        }
        drop(self.subscription);

        match &outcome {
            HandshakeState::Succeeded(account) => {
                tracing::info!(
                    session = %self.id,
                    provider = %self.provider,
                    username = account.username.as_deref().unwrap_or_default(),
                    "provider connected",
                );
                metrics::counter!("handshakes_succeeded").increment(1);
            }
            HandshakeState::Failed { message } => {
                tracing::warn!(
                    session = %self.id,
                    provider = %self.provider,
                    error = %message,
                    "provider connection failed",
                );
                metrics::counter!("handshakes_failed").increment(1);
            }
            HandshakeState::Abandoned => {
                metrics::counter!("handshakes_abandoned").increment(1);
            }
            _ => {}
        }

        let _ = self.state.send(outcome);
    }
}
