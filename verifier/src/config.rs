//! Verifier configuration loaded from the environment

use std::env;
use std::fmt;
use std::path::PathBuf;

use crate::error::{SessionError, SessionResult};

/// Application identity issued by the verification service
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Application identifier
    pub app_id: String,
    /// Application secret
    pub app_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("app_secret", &"<redacted>")
            .finish()
    }
}

/// Configuration for verification sessions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifierConfig {
    /// Application identifier (`RECLAIM_APP_ID`)
    pub app_id: Option<String>,
    /// Application secret (`RECLAIM_APP_SECRET`)
    pub app_secret: Option<String>,
    /// Externally reachable address the provider should push proofs to
    /// (`RECLAIM_CALLBACK_URL`)
    pub callback_url: Option<String>,
    /// Directory exported proofs are written to (`PROOF_EXPORT_DIR`)
    pub export_dir: Option<PathBuf>,
}

impl VerifierConfig {
    /// Loads the configuration from environment variables
    ///
    /// Empty values are treated as absent. Missing credentials are reported here and are
    /// checked again on every session start.
    #[must_use]
    pub fn from_env() -> Self {
        let config = Self {
            app_id: non_empty_var("RECLAIM_APP_ID"),
            app_secret: non_empty_var("RECLAIM_APP_SECRET"),
            callback_url: non_empty_var("RECLAIM_CALLBACK_URL"),
            export_dir: non_empty_var("PROOF_EXPORT_DIR").map(PathBuf::from),
        };

        if config.credentials().is_err() {
            tracing::warn!("Configure RECLAIM_APP_ID and RECLAIM_APP_SECRET to start verifications");
        }

        config
    }

    /// Returns the application credentials
    ///
    /// # Errors
    ///
    /// Returns `SessionError::MissingCredentials` if the identity or the secret is absent
    pub fn credentials(&self) -> SessionResult<Credentials> {
        match (&self.app_id, &self.app_secret) {
            (Some(app_id), Some(app_secret)) => Ok(Credentials {
                app_id: app_id.clone(),
                app_secret: app_secret.clone(),
            }),
            _ => Err(SessionError::MissingCredentials),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
