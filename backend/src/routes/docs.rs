use aide::{axum::ApiRouter, openapi::OpenApi, scalar::Scalar};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Extension, Json,
};

use crate::types::Environment;

const OPENAPI_PATH: &str = "/openapi.json";

/// Scalar UI and the generated OpenAPI document, both hidden where docs are disabled
pub fn handler() -> ApiRouter {
    ApiRouter::new()
        .route("/docs", get(docs_page))
        .route(OPENAPI_PATH, get(openapi_schema))
}

#[allow(clippy::unused_async)]
async fn docs_page(Extension(environment): Extension<Environment>) -> Response {
    if !environment.show_api_docs() {
        return StatusCode::NOT_FOUND.into_response();
    }

    let scalar = Scalar::new(OPENAPI_PATH).with_title("Proof Intake Docs");
    Html(scalar.html()).into_response()
}

#[allow(clippy::unused_async)]
async fn openapi_schema(
    Extension(environment): Extension<Environment>,
    Extension(openapi): Extension<OpenApi>,
) -> Response {
    if !environment.show_api_docs() {
        return StatusCode::NOT_FOUND.into_response();
    }

    Json(openapi).into_response()
}
