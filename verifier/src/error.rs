//! Error types for verification sessions

use thiserror::Error;

use crate::gateway::GatewayError;

/// Result type for verification session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur while driving a verification session
#[derive(Error, Debug)]
pub enum SessionError {
    /// The provider key does not match any known provider
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Application identity or secret is not configured
    #[error("Missing RECLAIM_APP_ID or RECLAIM_APP_SECRET")]
    MissingCredentials,

    /// The provider gateway failed while setting up the session
    #[error(transparent)]
    GatewayFailure(#[from] GatewayError),

    /// The provider reported that verification failed
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// There is no session to wait on
    #[error("No verification session has been started")]
    NoActiveSession,
}
