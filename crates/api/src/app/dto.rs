//! Request extraction and response shapes.

use std::str::FromStr;

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use serde::Serialize;
use serde_json::{Map, Value};

use kidsbook_core::{DomainError, UserId};

use crate::app::errors::ApiError;

// -------------------------
// Request DTOs
// -------------------------

/// A JSON object body. An empty body reads as `{}`.
///
/// Field-level parsing happens in the services against allow-listed tables,
/// so handlers only guarantee the body is an object.
#[derive(Debug, Clone, Default)]
pub struct JsonObject(pub Map<String, Value>);

#[axum::async_trait]
impl<S> FromRequest<S> for JsonObject
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(_) => Err(ApiError::bad_request("request body must be a JSON object")),
            Err(e) => Err(ApiError::bad_request(format!("invalid JSON body: {e}"))),
        }
    }
}

/// Parse an id from a path segment.
pub fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse::<T>().map_err(ApiError::from)
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct AddedMembers {
    pub added: Vec<UserId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use kidsbook_core::GroupId;

    async fn extract(body: &'static str) -> Result<JsonObject, ApiError> {
        let req = axum::http::Request::builder().body(Body::from(body)).unwrap();
        JsonObject::from_request(req, &()).await
    }

    #[tokio::test]
    async fn empty_bodies_read_as_empty_objects() {
        assert!(extract("").await.unwrap().0.is_empty());
        assert!(extract("  \n").await.unwrap().0.is_empty());
        assert_eq!(extract(r#"{"name":"Math"}"#).await.unwrap().0["name"], "Math");
    }

    #[tokio::test]
    async fn non_objects_are_bad_requests() {
        assert_eq!(extract("[1]").await.unwrap_err().status(), StatusCode::BAD_REQUEST);
        assert_eq!(extract("{").await.unwrap_err().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn ids_parse_or_fail_with_400() {
        let id = GroupId::new();
        assert_eq!(parse_id::<GroupId>(&id.to_string()).unwrap(), id);
        assert_eq!(parse_id::<GroupId>("nope").unwrap_err().status(), StatusCode::BAD_REQUEST);
    }
}
