use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, middleware::Next, response::Response};

use kidsbook_auth::CredentialService;

use crate::context::CallerContext;

#[derive(Clone)]
pub struct AuthState {
    pub credentials: Arc<dyn CredentialService>,
}

/// Resolve the bearer token, if any, into a [`CallerContext`].
///
/// Never rejects: endpoints decide through the authorization engine whether
/// an anonymous caller is acceptable.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let session = extract_bearer(req.headers()).and_then(|token| match state.credentials.resolve(token) {
        Ok(session) => Some(session),
        Err(e) => {
            tracing::debug!(error = %e, "bearer token rejected");
            None
        }
    });

    req.extensions_mut().insert(CallerContext::new(session));
    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_is_extracted_and_trimmed() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer  abc "));
        assert_eq!(extract_bearer(&headers), Some("abc"));

        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer(&headers), None);
    }
}
