use std::sync::Arc;

use intake_backend::{server, types::Environment};
use proof_storage::ProofStorage;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let environment = Environment::from_env();

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(environment.tracing_level()).into())
        .from_env_lossy();

    // JSON logs for staging/production, human-readable for development
    if environment.json_logs() {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).init();
    }

    let proof_storage = Arc::new(ProofStorage::open(environment.proofs_file()).await?);

    server::start(environment, proof_storage).await
}
