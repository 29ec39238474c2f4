//! Popup-side half of the handshake: the popup detects it was opened as
//! part of a connect flow, exchanges the authorization code with the
//! backend, posts the verdict to its opener, and closes itself after a
//! short delay so the user can read the status line.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tokio::sync::watch;

use crate::models::message::CallbackMessage;
use crate::models::social::Provider;
use crate::orchestrator::handle::OperationHandle;
use crate::orchestrator::window::OpenerWindow;
use crate::services::api::{ApiClient, ApiError, CallbackExchange};

/// Delay before self-close after a successful exchange.
const SUCCESS_CLOSE_DELAY: Duration = Duration::from_secs(2);
/// Failures stay up a little longer.
const FAILURE_CLOSE_DELAY: Duration = Duration::from_secs(3);

/// Query parameters the provider redirects back with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Parse from the popup's location query string; a leading `?` is
    /// accepted.
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params = Self::default();
        let Ok(url) = Url::parse(&format!("http://callback.invalid/?{query}")) else {
            return params;
        };
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                "error_description" => params.error_description = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    /// Whether this window was opened as part of a connect flow. The caller
    /// must additionally check that an opener reference exists before
    /// running the exchange.
    pub fn indicates_callback(&self) -> bool {
        self.code.is_some() || self.error.is_some()
    }
}

/// Observable phase of the popup-side exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackPhase {
    /// Backend exchange in flight; the popup shows a spinner.
    Exchanging,
    /// Verdict posted to the opener; self-close scheduled.
    Done(CallbackOutcome),
}

/// What the popup shows the user before closing.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackOutcome {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    /// The user declined consent at the provider.
    #[error("{0}")]
    ProviderDenied(String),

    /// The callback URL lacks `code` or `state`.
    #[error("Missing parameters")]
    MissingParameters,

    /// Backend unreachable during the code exchange.
    #[error("Network error. Please try again.")]
    ExchangeNetwork(#[source] ApiError),

    /// Backend answered but refused the exchange.
    #[error("{0}")]
    Rejected(String),
}

/// Runs the popup-side flow: `Exchanging` → `Done`, posting exactly one
/// callback message to the opener along the way.
pub struct CallbackRunner {
    api: Arc<ApiClient>,
    opener: Arc<dyn OpenerWindow>,
    success_close_delay: Duration,
    failure_close_delay: Duration,
}

impl CallbackRunner {
    pub fn new(api: Arc<ApiClient>, opener: Arc<dyn OpenerWindow>) -> Self {
        Self {
            api,
            opener,
            success_close_delay: SUCCESS_CLOSE_DELAY,
            failure_close_delay: FAILURE_CLOSE_DELAY,
        }
    }

    /// Shrink the self-close delays; used by tests.
    pub fn with_close_delays(mut self, success: Duration, failure: Duration) -> Self {
        self.success_close_delay = success;
        self.failure_close_delay = failure;
        self
    }

    /// Start the exchange. Every path — provider error, missing
    /// parameters, network failure, backend verdict — posts a message to
    /// the opener and then self-closes.
    pub fn run(&self, provider: Provider, params: CallbackParams) -> OperationHandle<CallbackPhase> {
        let api = Arc::clone(&self.api);
        let opener = Arc::clone(&self.opener);
        let success_delay = self.success_close_delay;
        let failure_delay = self.failure_close_delay;
        let (tx, rx) = watch::channel(CallbackPhase::Exchanging);

        let task = tokio::spawn(async move {
            let outcome = match exchange(api.as_ref(), provider, params).await {
                Ok(exchanged) => {
                    let message = success_message(provider, &exchanged);
                    opener.post_message(
                        serde_json::to_value(&message).unwrap_or_default(),
                    );
                    CallbackOutcome {
                        success: true,
                        message: connected_text(provider, &exchanged),
                    }
                }
                Err(err) => {
                    tracing::warn!(provider = %provider, error = %err, "callback exchange failed");
                    let failure = CallbackMessage::failure(provider, err.to_string());
                    opener.post_message(serde_json::to_value(&failure).unwrap_or_default());
                    CallbackOutcome {
                        success: false,
                        message: err.to_string(),
                    }
                }
            };

            let delay = if outcome.success {
                success_delay
            } else {
                failure_delay
            };
            let _ = tx.send(CallbackPhase::Done(outcome));

            tokio::time::sleep(delay).await;
            opener.close();
        });

        OperationHandle::new(rx, task)
    }
}

async fn exchange(
    api: &ApiClient,
    provider: Provider,
    params: CallbackParams,
) -> Result<SuccessfulExchange, CallbackError> {
    if let Some(error) = params.error {
        return Err(CallbackError::ProviderDenied(
            params.error_description.unwrap_or(error),
        ));
    }
    let (Some(code), Some(state)) = (params.code, params.state) else {
        return Err(CallbackError::MissingParameters);
    };

    let response = api
        .exchange_code(provider, &code, &state)
        .await
        .map_err(|err| match err {
            ApiError::Backend(message) => CallbackError::Rejected(message),
            other => CallbackError::ExchangeNetwork(other),
        })?;

    if response.success {
        Ok(SuccessfulExchange { response, state })
    } else {
        Err(CallbackError::Rejected(
            response
                .error
                .unwrap_or_else(|| "Connection failed".to_string()),
        ))
    }
}

struct SuccessfulExchange {
    response: CallbackExchange,
    state: String,
}

fn success_message(provider: Provider, exchanged: &SuccessfulExchange) -> CallbackMessage {
    CallbackMessage {
        message_type: provider.message_type(),
        success: true,
        error: None,
        instagram_username: exchanged.response.instagram_username.clone(),
        instagram_user_id: exchanged.response.instagram_user_id.clone(),
        page_name: exchanged.response.page_name.clone(),
        app_user: Some(exchanged.state.clone()),
    }
}

fn connected_text(provider: Provider, exchanged: &SuccessfulExchange) -> String {
    match provider {
        Provider::Instagram => format!(
            "Connected Instagram account: @{}",
            exchanged
                .response
                .instagram_username
                .as_deref()
                .unwrap_or("your account")
        ),
        Provider::Facebook => format!(
            "Connected Facebook page: {}",
            exchanged
                .response
                .page_name
                .as_deref()
                .unwrap_or("your page")
        ),
        other => format!("Connected {other} account"),
    }
}
