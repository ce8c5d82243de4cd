//! Interface to the external verification provider
//!
//! The provider's SDK builds and validates proofs; this crate only drives it through the
//! narrow contract below. A result is delivered through a [`ResultSlot`], which is consumed
//! when fired, so a session can observe at most one outcome.

use thiserror::Error;
use tokio::sync::oneshot;

/// Opaque session descriptor returned by the provider
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle(String);

impl SessionHandle {
    /// Wraps a provider-assigned session identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Provider-assigned session identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Synchronous failures of the provider gateway
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The provider refused or failed to create a session
    #[error("Failed to initialize verification session: {0}")]
    SessionCreation(String),

    /// The provider could not produce a request URL
    #[error("Failed to generate request URL: {0}")]
    RequestUrl(String),

    /// The provider rejected the callback address
    #[error("Failed to set callback address: {0}")]
    CallbackAddress(String),

    /// The provider could not start waiting for a result
    #[error("Failed to start waiting for a proof: {0}")]
    Listen(String),
}

/// Terminal result reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The provider produced a proof
    Success(serde_json::Value),
    /// The provider reported a failure
    Error(String),
}

/// At-most-once receiver of a session's terminal result
///
/// Both callbacks consume the slot. They return `false` when nobody is observing the
/// session anymore (for example after it was replaced), in which case the result is
/// dropped.
#[derive(Debug)]
pub struct ResultSlot {
    sender: oneshot::Sender<VerificationOutcome>,
}

impl ResultSlot {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<VerificationOutcome>) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, receiver)
    }

    /// Reports a successful verification
    pub fn on_success(self, payload: serde_json::Value) -> bool {
        self.fire(VerificationOutcome::Success(payload))
    }

    /// Reports a failed verification
    pub fn on_error(self, detail: impl Into<String>) -> bool {
        self.fire(VerificationOutcome::Error(detail.into()))
    }

    /// Whether the session this slot belongs to is no longer observed
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.sender.is_closed()
    }

    fn fire(self, outcome: VerificationOutcome) -> bool {
        self.sender.send(outcome).is_ok()
    }
}

/// Provider SDK operations used by a verification session
#[async_trait::async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Creates a proof request session for `provider_id`
    async fn create_session(
        &self,
        app_id: &str,
        app_secret: &str,
        provider_id: &str,
    ) -> Result<SessionHandle, GatewayError>;

    /// Returns the shareable URL the user opens (or scans) to verify
    async fn get_request_url(&self, session: &SessionHandle) -> Result<String, GatewayError>;

    /// Asks the provider to also push the proof to `address`
    ///
    /// Providers without push delivery can keep the default, which does nothing.
    async fn set_callback_address(
        &self,
        session: &SessionHandle,
        address: &str,
        as_json: bool,
    ) -> Result<(), GatewayError> {
        tracing::debug!(
            "Gateway ignores callback address {address} (json: {as_json}) for session {}",
            session.as_str()
        );
        Ok(())
    }

    /// Starts waiting for the result and fires `slot` once it is known
    ///
    /// Must return as soon as the wait has been set up.
    async fn start_listening(
        &self,
        session: &SessionHandle,
        slot: ResultSlot,
    ) -> Result<(), GatewayError>;
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::{GatewayError, ProviderGateway, ResultSlot, SessionHandle};

    /// In-memory gateway that hands result slots to the test
    pub struct MockProviderGateway {
        request_url: String,
        create_failure: Option<String>,
        request_url_failure: Option<String>,
        calls: AtomicUsize,
        created: Mutex<Vec<(String, String, String)>>,
        callback_addresses: Mutex<Vec<(SessionHandle, String, bool)>>,
        slots: Mutex<Vec<(SessionHandle, ResultSlot)>>,
    }

    impl MockProviderGateway {
        #[must_use]
        pub fn new(request_url: impl Into<String>) -> Self {
            Self {
                request_url: request_url.into(),
                create_failure: None,
                request_url_failure: None,
                calls: AtomicUsize::new(0),
                created: Mutex::new(Vec::new()),
                callback_addresses: Mutex::new(Vec::new()),
                slots: Mutex::new(Vec::new()),
            }
        }

        /// Makes `create_session` fail with `detail`
        #[must_use]
        pub fn with_create_failure(mut self, detail: impl Into<String>) -> Self {
            self.create_failure = Some(detail.into());
            self
        }

        /// Makes `get_request_url` fail with `detail`
        #[must_use]
        pub fn with_request_url_failure(mut self, detail: impl Into<String>) -> Self {
            self.request_url_failure = Some(detail.into());
            self
        }

        /// Number of gateway calls made so far
        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// `(app_id, app_secret, provider_id)` of every created session
        pub fn created_sessions(&self) -> Vec<(String, String, String)> {
            self.created.lock().expect("mock lock poisoned").clone()
        }

        /// Callback addresses registered so far
        pub fn callback_addresses(&self) -> Vec<(SessionHandle, String, bool)> {
            self.callback_addresses
                .lock()
                .expect("mock lock poisoned")
                .clone()
        }

        /// Removes and returns the result slot of the most recent session
        pub fn take_latest_slot(&self) -> Option<ResultSlot> {
            self.slots
                .lock()
                .expect("mock lock poisoned")
                .pop()
                .map(|(_, slot)| slot)
        }

        /// Removes and returns the result slot of `session`
        pub fn take_slot(&self, session: &SessionHandle) -> Option<ResultSlot> {
            let mut slots = self.slots.lock().expect("mock lock poisoned");
            let index = slots.iter().position(|(handle, _)| handle == session)?;
            Some(slots.remove(index).1)
        }

        fn record_call(&self) -> usize {
            self.calls.fetch_add(1, Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl ProviderGateway for MockProviderGateway {
        async fn create_session(
            &self,
            app_id: &str,
            app_secret: &str,
            provider_id: &str,
        ) -> Result<SessionHandle, GatewayError> {
            let call = self.record_call();
            if let Some(detail) = &self.create_failure {
                return Err(GatewayError::SessionCreation(detail.clone()));
            }

            self.created.lock().expect("mock lock poisoned").push((
                app_id.to_string(),
                app_secret.to_string(),
                provider_id.to_string(),
            ));
            Ok(SessionHandle::new(format!("mock-session-{call}")))
        }

        async fn get_request_url(&self, _session: &SessionHandle) -> Result<String, GatewayError> {
            self.record_call();
            self.request_url_failure.as_ref().map_or_else(
                || Ok(self.request_url.clone()),
                |detail| Err(GatewayError::RequestUrl(detail.clone())),
            )
        }

        async fn set_callback_address(
            &self,
            session: &SessionHandle,
            address: &str,
            as_json: bool,
        ) -> Result<(), GatewayError> {
            self.record_call();
            self.callback_addresses
                .lock()
                .expect("mock lock poisoned")
                .push((session.clone(), address.to_string(), as_json));
            Ok(())
        }

        async fn start_listening(
            &self,
            session: &SessionHandle,
            slot: ResultSlot,
        ) -> Result<(), GatewayError> {
            self.record_call();
            self.slots
                .lock()
                .expect("mock lock poisoned")
                .push((session.clone(), slot));
            Ok(())
        }
    }
}
