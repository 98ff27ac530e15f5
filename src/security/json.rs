use axum::{
    async_trait,
    body::to_bytes,
    extract::{FromRequest, Request},
    http::{
        HeaderMap,
        header::{CONTENT_LENGTH, CONTENT_TYPE},
    },
};
use serde::de::DeserializeOwned;
use serde_json::Deserializer;

use crate::errors::AppError;

pub const MAX_BODY_SIZE_BYTES: usize = 64 * 1024; // 64 KiB upper bound for request bodies

/// JSON extractor that reports the failing field path and rejects
/// trailing data after the document.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        validate_content_type(req.headers())?;
        validate_declared_length(req.headers())?;

        let body_bytes = to_bytes(req.into_body(), MAX_BODY_SIZE_BYTES)
            .await
            .map_err(|_| AppError::PayloadTooLarge)?;

        let mut deserializer = Deserializer::from_slice(body_bytes.as_ref());
        let result = serde_path_to_error::deserialize(&mut deserializer).map_err(parsing_error)?;

        deserializer
            .end()
            .map_err(|err| AppError::InvalidJson(format!("unexpected trailing data: {err}")))?;

        Ok(ValidatedJson(result))
    }
}

fn parsing_error(err: serde_path_to_error::Error<serde_json::Error>) -> AppError {
    let path = err.path().to_string();
    let error = err.into_inner();
    if path.is_empty() || path == "." {
        AppError::InvalidJson(error.to_string())
    } else {
        AppError::InvalidJson(format!("at {path}: {error}"))
    }
}

fn validate_content_type(headers: &HeaderMap) -> Result<(), AppError> {
    if let Some(value) = headers.get(CONTENT_TYPE)
        && let Ok(value) = value.to_str()
        && (value.starts_with("application/json") || value.ends_with("+json"))
    {
        return Ok(());
    }

    Err(AppError::UnsupportedMediaType)
}

fn validate_declared_length(headers: &HeaderMap) -> Result<(), AppError> {
    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());

    match declared {
        Some(length) if length > MAX_BODY_SIZE_BYTES => Err(AppError::PayloadTooLarge),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http};
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Payload {
        mood: String,
        #[serde(default)]
        goals: Vec<String>,
    }

    fn request(content_type: Option<&str>, body: &str) -> Request {
        let mut builder = http::Request::builder().method("PUT").uri("/journal/today");
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn extract(req: Request) -> Result<Payload, AppError> {
        ValidatedJson::<Payload>::from_request(req, &())
            .await
            .map(|ValidatedJson(payload)| payload)
    }

    #[tokio::test]
    async fn test_accepts_json() {
        let payload = extract(request(
            Some("application/json"),
            r#"{"mood":"happy","goals":["sleep"]}"#,
        ))
        .await
        .unwrap();
        assert_eq!(payload.mood, "happy");
        assert_eq!(payload.goals, vec!["sleep"]);
    }

    #[tokio::test]
    async fn test_rejects_missing_content_type() {
        let err = extract(request(None, r#"{"mood":"happy"}"#)).await.unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMediaType));
    }

    #[tokio::test]
    async fn test_rejects_unknown_fields_with_path() {
        let err = extract(request(
            Some("application/json"),
            r#"{"mood":"happy","weather":"sunny"}"#,
        ))
        .await
        .unwrap_err();
        match err {
            AppError::InvalidJson(message) => assert!(message.contains("weather"), "{message}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reports_nested_path() {
        let err = extract(request(
            Some("application/json"),
            r#"{"mood":"happy","goals":["sleep", 7]}"#,
        ))
        .await
        .unwrap_err();
        match err {
            AppError::InvalidJson(message) => assert!(message.contains("goals[1]"), "{message}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejects_trailing_data() {
        let err = extract(request(
            Some("application/json"),
            r#"{"mood":"happy"} {"mood":"sad"}"#,
        ))
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidJson(_)));
    }

    #[tokio::test]
    async fn test_rejects_oversized_body() {
        let big = format!(r#"{{"mood":"{}"}}"#, "a".repeat(MAX_BODY_SIZE_BYTES));
        let err = extract(request(Some("application/json"), &big)).await.unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge));
    }
}
