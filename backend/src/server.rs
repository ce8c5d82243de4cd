use std::sync::Arc;
use std::time::Duration;

use aide::openapi::OpenApi;
use axum::{Extension, Router};
use proof_storage::ProofStorage;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::{routes, types::Environment};

/// Requests taking longer than this are answered with `408 Request Timeout`
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds the application router with all layers and shared dependencies attached
#[must_use]
pub fn router(environment: Environment, proof_storage: Arc<ProofStorage>) -> Router {
    let mut openapi = OpenApi::default();

    routes::handler()
        .finish_api(&mut openapi)
        .layer(Extension(openapi))
        .layer(Extension(environment))
        .layer(Extension(proof_storage))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}

/// Starts the server with the given environment and dependencies
///
/// # Errors
///
/// Returns an error if the server fails to start or bind to the port
pub async fn start(
    environment: Environment,
    proof_storage: Arc<ProofStorage>,
) -> anyhow::Result<()> {
    let port = environment.port()?;
    let public_url = environment.public_url(port);
    let proofs_file = proof_storage.path().display().to_string();

    let router = router(environment, proof_storage);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("🔄 Proof intake backend started on http://{addr}");
    tracing::info!("📥 Callback URL: {public_url}/api/reclaim/callback");
    tracing::info!("📄 Proofs listing: {public_url}/api/proofs");
    tracing::info!("💾 Proofs stored in {proofs_file}");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(anyhow::Error::from)
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl-C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
