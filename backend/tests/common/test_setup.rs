use axum::{body::Body, http::Request, response::Response, Router};
use intake_backend::{server, types::Environment};
use proof_storage::ProofStorage;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Setup test environment variables with all the required configuration
pub fn setup_test_env() {
    // Load test environment variables
    dotenvy::from_path(".env.example").ok();

    // Initialize tracing for tests
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init()
        .ok();
}

/// Router wired to a proof store living in its own temporary directory
pub struct TestSetup {
    pub router: Router,
    pub proof_storage: Arc<ProofStorage>,
    // Keep the directory alive for the duration of the test
    _dir: TempDir,
}

impl TestSetup {
    pub async fn new() -> Self {
        Self::with_environment(Environment::Development).await
    }

    pub async fn with_environment(environment: Environment) -> Self {
        setup_test_env();

        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let proof_storage = Arc::new(
            ProofStorage::open(dir.path().join("proofs.json"))
                .await
                .expect("Failed to open proof store"),
        );

        let router = server::router(environment, proof_storage.clone());

        Self {
            router,
            proof_storage,
            _dir: dir,
        }
    }

    /// Replaces the store contents with arbitrary bytes
    pub fn write_raw_store(&self, contents: &str) {
        std::fs::write(self.proof_storage.path(), contents).expect("Failed to write store");
    }

    /// Removes the store's backing file
    pub fn delete_store(&self) {
        std::fs::remove_file(self.proof_storage.path()).expect("Failed to delete store");
    }

    pub async fn send_post_request(
        &self,
        route: &str,
        payload: serde_json::Value,
    ) -> Result<Response, Box<dyn std::error::Error>> {
        self.send_raw_post_request(route, "application/json", payload.to_string())
            .await
    }

    pub async fn send_form_request(
        &self,
        route: &str,
        body: &str,
    ) -> Result<Response, Box<dyn std::error::Error>> {
        self.send_raw_post_request(route, "application/x-www-form-urlencoded", body.to_string())
            .await
    }

    pub async fn send_raw_post_request(
        &self,
        route: &str,
        content_type: &str,
        body: String,
    ) -> Result<Response, Box<dyn std::error::Error>> {
        let request = Request::builder()
            .uri(route)
            .method("POST")
            .header("Content-Type", content_type)
            .body(Body::from(body))?;

        let response = self.router.clone().oneshot(request).await?;
        Ok(response)
    }

    pub async fn send_get_request(
        &self,
        route: &str,
    ) -> Result<Response, Box<dyn std::error::Error>> {
        let request = Request::builder()
            .uri(route)
            .method("GET")
            .body(Body::empty())?;

        let response = self.router.clone().oneshot(request).await?;
        Ok(response)
    }

    pub async fn parse_response_body(
        &self,
        response: Response,
    ) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
        use http_body_util::BodyExt;

        let body = response.into_body().collect().await?.to_bytes();
        let json = serde_json::from_slice(&body)?;
        Ok(json)
    }
}
