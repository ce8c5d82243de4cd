use std::sync::Arc;

use axum::{Extension, Json};
use proof_storage::ProofStorage;
use schemars::JsonSchema;
use serde::Serialize;
use tracing::instrument;

use crate::types::{AppError, ProofPayload};

#[derive(Debug, Serialize, JsonSchema)]
pub struct CallbackResponse {
    pub success: bool,
    pub message: String,
}

/// Proof intake endpoint
///
/// Called by the verification provider once a user completes a verification. The body is
/// recorded verbatim together with its arrival time; nothing in it is validated.
#[instrument(skip(proof_storage, payload))]
pub async fn receive_proof(
    Extension(proof_storage): Extension<Arc<ProofStorage>>,
    ProofPayload(payload): ProofPayload,
) -> Result<Json<CallbackResponse>, AppError> {
    let stored = proof_storage.append(payload).await?;

    tracing::info!(
        received_at = %stored.received_at,
        "Proof received"
    );

    Ok(Json(CallbackResponse {
        success: true,
        message: "Proof received".to_string(),
    }))
}
