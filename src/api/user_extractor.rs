use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
};
use crate::model::UserContext;

/// Axum extractor for UserContext from request headers
///
/// - X-User-Id: the acting user
/// - Authorization: optional `Bearer <token>`
///
/// Requests without a user header act as the default harness user.
#[async_trait]
impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;
        let token = extract_bearer_token(headers);

        match extract_header_value(headers, "x-user-id") {
            Some(user_id) => Ok(UserContext::with_token(user_id, token)),
            None => Ok(UserContext {
                api_token: token,
                ..UserContext::default_user()
            }),
        }
    }
}

/// Extract header value as string
fn extract_header_value(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue, Request};

    #[tokio::test]
    async fn test_user_context_extraction() {
        let request = Request::builder()
            .header("x-user-id", "steward-7")
            .header("authorization", "Bearer s3cret")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let user = UserContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user.user_id, "steward-7");
        assert_eq!(user.api_token, Some("s3cret".to_string()));
    }

    #[tokio::test]
    async fn test_missing_headers_fall_back_to_default_user() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let user = UserContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user, UserContext::default_user());
    }

    #[test]
    fn test_blank_header_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-user-id"),
            HeaderValue::from_static("  "),
        );
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));

        assert_eq!(extract_header_value(&headers, "x-user-id"), None);
        assert_eq!(extract_bearer_token(&headers), None);
    }
}
