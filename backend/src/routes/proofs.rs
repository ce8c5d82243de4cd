use std::sync::Arc;

use axum::{Extension, Json};
use proof_storage::{ProofStorage, StoredProof};
use tracing::instrument;

use crate::types::AppError;

/// Lists every proof received so far, oldest first
#[instrument(skip(proof_storage))]
pub async fn list_proofs(
    Extension(proof_storage): Extension<Arc<ProofStorage>>,
) -> Result<Json<Vec<StoredProof>>, AppError> {
    let proofs = proof_storage.load_all().await?;
    tracing::debug!(count = proofs.len(), "Listing proofs");

    Ok(Json(proofs))
}
