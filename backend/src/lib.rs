//! Proof intake backend
//!
//! Receives proofs pushed by the verification provider and records them in the
//! append-only proof store.

#![deny(clippy::all, clippy::pedantic, clippy::nursery, dead_code)]

pub mod routes;
pub mod server;
pub mod types;
