//! Statically known verification providers

use serde::Serialize;
use strum::{Display, EnumIter, EnumString};

use crate::error::{SessionError, SessionResult};

/// Verification target the user proves a claim about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Amazon account
    Amazon,
    /// Uber account
    Uber,
    /// Netflix account
    Netflix,
}

impl Provider {
    /// Resolves a user-facing provider key such as `"amazon"`
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownProvider` if the key matches no provider
    pub fn from_key(key: &str) -> SessionResult<Self> {
        key.trim()
            .parse()
            .map_err(|_| SessionError::UnknownProvider(key.to_string()))
    }

    /// Name shown to the user and used in exported file names
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Amazon => "Amazon",
            Self::Uber => "Uber",
            Self::Netflix => "Netflix",
        }
    }

    /// Identifier assigned to this provider by the verification service
    #[must_use]
    pub const fn provider_id(self) -> &'static str {
        match self {
            Self::Amazon => "1d270ba2-8680-415b-b7e2-2cebd47f6f02",
            Self::Uber => "a9562ec7-d8e7-4a6b-ab08-89552f2e423b",
            Self::Netflix => "b3bd406a-cec0-4c91-8c8b-eeb06292cf8e",
        }
    }
}
