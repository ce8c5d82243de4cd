mod callback;
mod docs;
mod health;
mod proofs;

use aide::axum::{
    routing::{get, post},
    ApiRouter,
};

/// Creates the router with all handler routes
pub fn handler() -> ApiRouter {
    ApiRouter::new()
        .merge(docs::handler())
        .api_route("/health", get(health::handler))
        .api_route("/api/reclaim/callback", post(callback::receive_proof))
        .api_route("/api/proofs", get(proofs::list_proofs))
}
