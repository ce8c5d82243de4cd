//! Verification session state machine
//!
//! ```text
//! Idle -> Initializing -> AwaitingProof -> Succeeded
//!   |          |               |
//!   +----------+---------------+--------> Failed
//! ```
//!
//! Every transition is guarded by the session id and the expected source state, so a
//! callback that belongs to a replaced session, or that arrives after the session already
//! finished, changes nothing.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use strum::Display;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    artifact::ProofArtifact,
    config::VerifierConfig,
    error::{SessionError, SessionResult},
    gateway::{GatewayError, ProviderGateway, ResultSlot, VerificationOutcome},
    link::RequestLink,
    provider::Provider,
};

/// Detail recorded when the gateway drops a session without reporting a result
const ABANDONED_DETAIL: &str = "Provider stopped waiting for the proof without a result";

/// Lifecycle state of a verification session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum SessionState {
    /// Provider selected, nothing requested yet
    Idle,
    /// Requesting a session and its URL from the provider
    Initializing,
    /// Request URL shown, waiting for the provider's result
    AwaitingProof,
    /// The provider delivered a proof
    Succeeded,
    /// The attempt failed
    Failed,
}

impl SessionState {
    /// Whether no further transition can happen
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Identity of one verification attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Observable view of the live session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Session identity
    pub id: SessionId,
    /// Selected provider
    pub provider: Provider,
    /// Current state
    pub state: SessionState,
    /// Shareable request URL, set from `AwaitingProof` on
    pub request_url: Option<String>,
    /// Proof payload, set only in `Succeeded`
    pub result_payload: Option<serde_json::Value>,
    /// Failure description, set only in `Failed`
    pub error_detail: Option<String>,
    /// Exported proof, set only in `Succeeded`
    pub artifact: Option<ProofArtifact>,
}

impl SessionSnapshot {
    fn new(id: SessionId, provider: Provider) -> Self {
        Self {
            id,
            provider,
            state: SessionState::Idle,
            request_url: None,
            result_payload: None,
            error_detail: None,
            artifact: None,
        }
    }

    /// Request URL with its QR rendering, once available
    #[must_use]
    pub fn request_link(&self) -> Option<RequestLink> {
        self.request_url.as_deref().map(RequestLink::new)
    }

    /// Status line for the presentation layer
    #[must_use]
    pub fn status_message(&self) -> String {
        match self.state {
            SessionState::Idle => format!("Ready to verify with {}", self.provider.display_name()),
            SessionState::Initializing => "Initializing verification...".to_string(),
            SessionState::AwaitingProof => "Waiting for verification...".to_string(),
            SessionState::Succeeded => "Verification successful! Proof downloaded.".to_string(),
            SessionState::Failed => format!(
                "Verification failed: {}",
                self.error_detail.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

/// State shared with the background task waiting for the provider's result
struct Shared {
    config: VerifierConfig,
    current: watch::Sender<Option<SessionSnapshot>>,
}

impl Shared {
    /// Applies `apply` if `id` is the live session and is in one of `from`
    fn transition(
        &self,
        id: SessionId,
        from: &[SessionState],
        apply: impl FnOnce(&mut SessionSnapshot),
    ) -> bool {
        self.current.send_if_modified(|current| match current {
            Some(session) if session.id == id && from.contains(&session.state) => {
                apply(session);
                true
            }
            _ => false,
        })
    }

    fn fail(&self, id: SessionId, detail: String) -> bool {
        let applied = self.transition(
            id,
            &[
                SessionState::Idle,
                SessionState::Initializing,
                SessionState::AwaitingProof,
            ],
            |session| {
                session.state = SessionState::Failed;
                session.error_detail = Some(detail.clone());
            },
        );

        if applied {
            tracing::warn!("Verification session {id} failed: {detail}");
        }
        applied
    }

    async fn resolve(&self, id: SessionId, outcome: VerificationOutcome) {
        match outcome {
            VerificationOutcome::Success(payload) => self.succeed(id, payload).await,
            VerificationOutcome::Error(detail) => {
                if !self.fail(id, detail) {
                    tracing::debug!("Ignoring error for inactive session {id}");
                }
            }
        }
    }

    async fn succeed(&self, id: SessionId, payload: serde_json::Value) {
        tracing::debug!("Proof payload for session {id}: {payload}");

        // Claim the terminal state before touching the filesystem
        let mut claimed = None;
        self.transition(id, &[SessionState::AwaitingProof], |session| {
            let artifact =
                ProofArtifact::new(session.provider.display_name(), &payload, Utc::now());
            session.state = SessionState::Succeeded;
            session.result_payload = Some(payload);
            session.artifact = Some(artifact.clone());
            claimed = Some(artifact);
        });

        let Some(artifact) = claimed else {
            tracing::debug!("Ignoring proof for inactive session {id}");
            return;
        };
        tracing::info!("Received proof for session {id}");

        if let Some(dir) = &self.config.export_dir {
            match artifact.write_to(dir).await {
                Ok(path) => tracing::info!("Exported proof to {}", path.display()),
                Err(err) => tracing::warn!(
                    "Failed to export proof {} to {}: {err}",
                    artifact.file_name(),
                    dir.display()
                ),
            }
        }
    }
}

/// Drives one verification attempt at a time
///
/// The controller owns the live session. Observers follow it through
/// [`SessionController::subscribe`]; results are delivered in the background and never
/// block [`SessionController::start`].
pub struct SessionController {
    gateway: Arc<dyn ProviderGateway>,
    shared: Arc<Shared>,
    observation: Option<CancellationToken>,
}

impl SessionController {
    /// Creates a controller with no session
    #[must_use]
    pub fn new(gateway: Arc<dyn ProviderGateway>, config: VerifierConfig) -> Self {
        let (current, _) = watch::channel(None);

        Self {
            gateway,
            shared: Arc::new(Shared { config, current }),
            observation: None,
        }
    }

    /// Snapshot of the live session, if any
    #[must_use]
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.shared.current.borrow().clone()
    }

    /// State of the live session; `Idle` when none was started
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared
            .current
            .borrow()
            .as_ref()
            .map_or(SessionState::Idle, |session| session.state)
    }

    /// Follows every change of the live session
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<SessionSnapshot>> {
        self.shared.current.subscribe()
    }

    /// Starts a verification with the provider named `provider_key`
    ///
    /// Any live session is discarded first, and its eventual result is ignored. On success
    /// the new session is `AwaitingProof` and the provider's result is awaited in the
    /// background.
    ///
    /// # Errors
    ///
    /// - `SessionError::UnknownProvider` - no session is created and the live one is kept
    /// - `SessionError::MissingCredentials` - the new session fails before any gateway call
    /// - `SessionError::GatewayFailure` - the new session fails
    pub async fn start(&mut self, provider_key: &str) -> SessionResult<SessionSnapshot> {
        let provider = Provider::from_key(provider_key)?;
        let id = self.replace(provider);

        let credentials = match self.shared.config.credentials() {
            Ok(credentials) => credentials,
            Err(err) => {
                self.shared.fail(id, err.to_string());
                return Err(err);
            }
        };

        self.shared.transition(id, &[SessionState::Idle], |session| {
            session.state = SessionState::Initializing;
        });
        tracing::info!(
            "Initializing verification session {id} with {}",
            provider.display_name()
        );

        let outcome = match self
            .request_proof(id, provider, &credentials.app_id, &credentials.app_secret)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                self.shared.fail(id, err.to_string());
                return Err(err.into());
            }
        };

        self.observe(id, outcome);

        Ok(self.snapshot().unwrap_or_else(|| SessionSnapshot::new(id, provider)))
    }

    /// Waits until the live session reaches a terminal state
    ///
    /// # Errors
    ///
    /// - `SessionError::NoActiveSession` - no session was started
    /// - `SessionError::VerificationFailed` - the session ended in `Failed`
    pub async fn wait_for_result(&self) -> SessionResult<serde_json::Value> {
        let mut receiver = self.subscribe();
        let finished = receiver
            .wait_for(|current| current.as_ref().is_none_or(|s| s.state.is_terminal()))
            .await
            .map_err(|_| SessionError::NoActiveSession)?
            .clone();

        match finished {
            None => Err(SessionError::NoActiveSession),
            Some(session) => match (session.state, session.result_payload) {
                (SessionState::Succeeded, Some(payload)) => Ok(payload),
                _ => Err(SessionError::VerificationFailed(
                    session.error_detail.unwrap_or_default(),
                )),
            },
        }
    }

    /// Discards the live session, if any
    pub fn discard(&mut self) {
        self.cancel_observation();
        self.shared.current.send_replace(None);
    }

    /// Replaces the live session with a new `Idle` one
    fn replace(&mut self, provider: Provider) -> SessionId {
        self.cancel_observation();

        let id = SessionId::new();
        if let Some(previous) = self
            .shared
            .current
            .send_replace(Some(SessionSnapshot::new(id, provider)))
        {
            tracing::debug!(
                "Discarded session {} in state {}",
                previous.id,
                previous.state
            );
        }
        id
    }

    /// Runs the gateway calls that take a session to `AwaitingProof`
    async fn request_proof(
        &self,
        id: SessionId,
        provider: Provider,
        app_id: &str,
        app_secret: &str,
    ) -> Result<oneshot::Receiver<VerificationOutcome>, GatewayError> {
        let handle = self
            .gateway
            .create_session(app_id, app_secret, provider.provider_id())
            .await?;

        if let Some(address) = &self.shared.config.callback_url {
            self.gateway
                .set_callback_address(&handle, address, true)
                .await?;
        }

        let request_url = self.gateway.get_request_url(&handle).await?;
        self.shared
            .transition(id, &[SessionState::Initializing], |session| {
                session.state = SessionState::AwaitingProof;
                session.request_url = Some(request_url.clone());
            });
        tracing::info!("Session {id} awaiting proof at {request_url}");

        let (slot, outcome) = ResultSlot::channel();
        self.gateway.start_listening(&handle, slot).await?;

        Ok(outcome)
    }

    /// Waits for the session's result in the background
    fn observe(&mut self, id: SessionId, outcome: oneshot::Receiver<VerificationOutcome>) {
        let token = CancellationToken::new();
        self.observation = Some(token.clone());

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {
                    tracing::debug!("Stopped observing session {id}");
                }
                result = outcome => {
                    let outcome = result.unwrap_or_else(|_| {
                        VerificationOutcome::Error(ABANDONED_DETAIL.to_string())
                    });
                    shared.resolve(id, outcome).await;
                }
            }
        });
    }

    fn cancel_observation(&mut self) {
        if let Some(token) = self.observation.take() {
            token.cancel();
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.cancel_observation();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::MockProviderGateway;

    fn config() -> VerifierConfig {
        VerifierConfig {
            app_id: Some("app-id".to_string()),
            app_secret: Some("app-secret".to_string()),
            ..VerifierConfig::default()
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(SessionState::Succeeded.is_terminal());
        assert!(SessionState::Failed.is_terminal());
        assert!(!SessionState::Idle.is_terminal());
        assert!(!SessionState::Initializing.is_terminal());
        assert!(!SessionState::AwaitingProof.is_terminal());
    }

    #[test]
    fn test_status_messages() {
        let mut session = SessionSnapshot::new(SessionId::new(), Provider::Amazon);
        assert_eq!(session.status_message(), "Ready to verify with Amazon");

        session.state = SessionState::AwaitingProof;
        assert_eq!(session.status_message(), "Waiting for verification...");

        session.state = SessionState::Failed;
        session.error_detail = Some("denied".to_string());
        assert_eq!(session.status_message(), "Verification failed: denied");
    }

    #[tokio::test]
    async fn test_transition_requires_matching_id_and_state() {
        let gateway = Arc::new(MockProviderGateway::new("https://verify.example/x"));
        let mut controller = SessionController::new(gateway, config());
        let id = controller.replace(Provider::Uber);

        // Wrong source state
        assert!(!controller
            .shared
            .transition(id, &[SessionState::AwaitingProof], |s| {
                s.state = SessionState::Succeeded;
            }));

        // Wrong session
        assert!(!controller.shared.fail(SessionId::new(), "stale".to_string()));
        assert_eq!(controller.state(), SessionState::Idle);

        assert!(controller.shared.fail(id, "boom".to_string()));
        assert!(!controller.shared.fail(id, "again".to_string()));
        assert_eq!(
            controller.snapshot().unwrap().error_detail.as_deref(),
            Some("boom")
        );
    }

    #[tokio::test]
    async fn test_replaced_session_exports_nothing() {
        let export_dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(MockProviderGateway::new("https://verify.example/x"));
        let mut controller = SessionController::new(
            gateway,
            VerifierConfig {
                export_dir: Some(export_dir.path().to_path_buf()),
                ..config()
            },
        );

        let stale = controller.replace(Provider::Amazon);
        controller.shared.transition(stale, &[SessionState::Idle], |s| {
            s.state = SessionState::AwaitingProof;
        });
        let live = controller.replace(Provider::Uber);

        controller
            .shared
            .succeed(stale, serde_json::json!({"claim": "late"}))
            .await;

        assert_eq!(std::fs::read_dir(export_dir.path()).unwrap().count(), 0);
        let session = controller.snapshot().unwrap();
        assert_eq!(session.id, live);
        assert_eq!(session.state, SessionState::Idle);
        assert!(session.artifact.is_none());
    }

    #[tokio::test]
    async fn test_success_is_recorded_before_export() {
        let export_dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(MockProviderGateway::new("https://verify.example/x"));
        let mut controller = SessionController::new(
            gateway,
            VerifierConfig {
                export_dir: Some(export_dir.path().to_path_buf()),
                ..config()
            },
        );

        let id = controller.replace(Provider::Netflix);
        controller.shared.transition(id, &[SessionState::Idle], |s| {
            s.state = SessionState::AwaitingProof;
        });

        controller
            .shared
            .succeed(id, serde_json::json!({"claim": "ok"}))
            .await;

        let session = controller.snapshot().unwrap();
        assert_eq!(session.state, SessionState::Succeeded);
        let artifact = session.artifact.expect("artifact recorded with the success");
        assert!(export_dir.path().join(artifact.file_name()).exists());
    }

    #[tokio::test]
    async fn test_dropped_slot_fails_session() {
        let gateway = Arc::new(MockProviderGateway::new("https://verify.example/x"));
        let mut controller = SessionController::new(gateway.clone(), config());

        controller.start("netflix").await.unwrap();
        drop(gateway.take_latest_slot());

        let result = controller.wait_for_result().await;
        assert!(
            matches!(result, Err(SessionError::VerificationFailed(ref d)) if d == ABANDONED_DETAIL)
        );
        assert_eq!(controller.state(), SessionState::Failed);
    }
}
