//! Client-side orchestration of a single proof verification attempt
//!
//! A [`SessionController`] drives one verification attempt against an external
//! verification provider: it asks the [`ProviderGateway`] for a request URL, exposes it to
//! the presentation layer, and waits in the background for the provider to report a
//! result. Only one session is live at a time; starting a new one discards the previous.

#![deny(clippy::all, clippy::pedantic, clippy::nursery, dead_code)]

pub mod artifact;
pub mod config;
pub mod error;
pub mod gateway;
pub mod link;
pub mod provider;
pub mod session;

pub use artifact::ProofArtifact;
pub use config::{Credentials, VerifierConfig};
pub use error::{SessionError, SessionResult};
pub use gateway::{GatewayError, ProviderGateway, ResultSlot, SessionHandle, VerificationOutcome};
pub use link::RequestLink;
pub use provider::Provider;
pub use session::{SessionController, SessionId, SessionSnapshot, SessionState};
