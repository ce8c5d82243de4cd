//! Custom extractors for request validation

use aide::operation::OperationInput;
use aide::OperationOutput;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::{header, StatusCode},
    Form, Json,
};
use serde_json::{map::Entry, Map, Value};

use crate::types::error::AppError;

/// Proof pushed by the verification provider
///
/// Accepts a JSON object or array as-is, or a URL-encoded form which is stored as an
/// object of its fields. Repeated form keys become arrays and bracketed keys such as
/// `proof[id]` or `tags[]` become nested objects and arrays. Unknown fields are never
/// rejected.
pub struct ProofPayload(pub Value);

impl<S> FromRequest<S> for ProofPayload
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(fields) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|_| {
                    AppError::new(
                        StatusCode::BAD_REQUEST,
                        "invalid_form",
                        "Invalid form payload",
                        false,
                    )
                })?;

            return Ok(Self(form_to_json(fields)));
        }

        let Json(payload) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|err| match err {
                JsonRejection::MissingJsonContentType(_) => AppError::new(
                    StatusCode::BAD_REQUEST,
                    "invalid_content_type",
                    "Missing Content-Type: application/json header",
                    false,
                ),
                _ => AppError::new(
                    StatusCode::BAD_REQUEST,
                    "invalid_json",
                    "Invalid JSON payload",
                    false,
                ),
            })?;

        // Proofs are structured data; a bare scalar is not a proof
        if !(payload.is_object() || payload.is_array()) {
            return Err(AppError::new(
                StatusCode::BAD_REQUEST,
                "invalid_payload",
                "Proof payload must be a JSON object or array",
                false,
            ));
        }

        Ok(Self(payload))
    }
}

impl OperationInput for ProofPayload {
    fn operation_input(
        ctx: &mut aide::generate::GenContext,
        operation: &mut aide::openapi::Operation,
    ) {
        Json::<Value>::operation_input(ctx, operation);
    }

    fn inferred_early_responses(
        ctx: &mut aide::generate::GenContext,
        operation: &mut aide::openapi::Operation,
    ) -> Vec<(Option<u16>, aide::openapi::Response)> {
        // Document validation error responses
        AppError::inferred_responses(ctx, operation)
    }
}

/// Builds a JSON object from form fields in the order they were sent
fn form_to_json(fields: Vec<(String, String)>) -> Value {
    let mut object = Map::new();
    for (key, value) in fields {
        insert_path(&mut object, &key_segments(&key), Value::String(value));
    }
    Value::Object(object)
}

/// Splits `a[b][]` into `["a", "b", ""]`; malformed keys are kept whole
fn key_segments(key: &str) -> Vec<&str> {
    let whole = vec![key];
    let Some(open) = key.find('[') else {
        return whole;
    };
    if open == 0 {
        return whole;
    }

    let mut segments = vec![&key[..open]];
    let mut rest = &key[open..];
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            return whole;
        };
        segments.push(&inner[..close]);
        rest = &inner[close + 1..];
    }

    if rest.is_empty() {
        segments
    } else {
        whole
    }
}

fn insert_path(object: &mut Map<String, Value>, segments: &[&str], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };

    match rest {
        [] => merge_value(object, first, value),
        [""] => push_value(object, first, value),
        _ => match object.get_mut(*first) {
            Some(Value::Object(inner)) => insert_path(inner, rest, value),
            _ => {
                let mut nested = Map::new();
                insert_path(&mut nested, rest, value);
                merge_value(object, first, Value::Object(nested));
            }
        },
    }
}

/// Stores `value` under `key`, turning a repeated key into an array
fn merge_value(object: &mut Map<String, Value>, key: &str, value: Value) {
    match object.entry(key) {
        Entry::Vacant(entry) => {
            entry.insert(value);
        }
        Entry::Occupied(mut entry) => match entry.get_mut() {
            Value::Array(items) => items.push(value),
            existing => {
                let previous = existing.take();
                *existing = Value::Array(vec![previous, value]);
            }
        },
    }
}

/// Appends `value` to the array under `key`
fn push_value(object: &mut Map<String, Value>, key: &str, value: Value) {
    match object.entry(key) {
        Entry::Vacant(entry) => {
            entry.insert(Value::Array(vec![value]));
        }
        Entry::Occupied(_) => merge_value(object, key, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_repeated_keys_become_arrays() {
        let value = form_to_json(fields(&[("claim", "a"), ("claim", "b"), ("claim", "c")]));
        assert_eq!(value, json!({ "claim": ["a", "b", "c"] }));
    }

    #[test]
    fn test_bracketed_keys_nest() {
        let value = form_to_json(fields(&[
            ("proof[id]", "7"),
            ("proof[owner][name]", "alice"),
            ("tags[]", "x"),
            ("tags[]", "y"),
            ("plain", "1"),
        ]));
        assert_eq!(
            value,
            json!({
                "proof": { "id": "7", "owner": { "name": "alice" } },
                "tags": ["x", "y"],
                "plain": "1",
            })
        );
    }

    #[test]
    fn test_malformed_keys_are_kept_whole() {
        assert_eq!(key_segments("[id]"), vec!["[id]"]);
        assert_eq!(key_segments("a[b"), vec!["a[b"]);
        assert_eq!(key_segments("a[b]c"), vec!["a[b]c"]);
        assert_eq!(key_segments("a[b][]"), vec!["a", "b", ""]);
    }

    #[test]
    fn test_conflicting_shapes_keep_every_value() {
        let value = form_to_json(fields(&[("proof", "raw"), ("proof[id]", "7")]));
        assert_eq!(value, json!({ "proof": ["raw", { "id": "7" }] }));
    }
}
