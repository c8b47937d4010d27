//! Request bodies sent either as HTML forms or as JSON.

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::Error;

/// Form fields named `instructions_<platform>` are gathered under this key.
const PLATFORM_PREFIX: &str = "instructions_";

/// Extracts `T` from a JSON body or from `application/x-www-form-urlencoded`.
///
/// Form bodies are turned into a JSON object first: a repeated field becomes
/// an array and `instructions_pc=...` style fields become a
/// `platform_instructions` object, so both encodings deserialize through the
/// same serde definitions. An empty body reads as an empty object, so
/// bodies whose fields all have defaults may be left out. Every failure is an
/// [`Error::BadRequest`].
#[derive(Debug, Clone)]
pub struct FormOrJson<T>(pub T);

impl<T, S> FromRequest<S> for FormOrJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.trim_start().starts_with("application/json"));

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| Error::bad_request(e.body_text()))?;

        let value = if body.iter().all(u8::is_ascii_whitespace) {
            Value::Object(Map::new())
        } else if is_json {
            serde_json::from_slice(&body)
                .map_err(|e| Error::bad_request(format!("invalid JSON body: {e}")))?
        } else {
            form_to_json(&body)
        };

        serde_json::from_value(value)
            .map(Self)
            .map_err(|e| Error::bad_request(format!("invalid request body: {e}")))
    }
}

/// Convert url-encoded pairs into a JSON object.
fn form_to_json(body: &[u8]) -> Value {
    let mut fields = Map::new();
    let mut platforms = Map::new();

    for (key, value) in url::form_urlencoded::parse(body) {
        if let Some(platform) = key.strip_prefix(PLATFORM_PREFIX) {
            if value.trim().is_empty() {
                continue;
            }
            platforms.insert(platform.to_string(), Value::String(value.into_owned()));
            continue;
        }

        let value = Value::String(value.into_owned());
        match fields.get_mut(&*key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                fields.insert(key.into_owned(), value);
            }
        }
    }

    if !platforms.is_empty() {
        fields.insert("platform_instructions".to_string(), Value::Object(platforms));
    }
    Value::Object(fields)
}
