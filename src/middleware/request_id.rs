//! Request correlation id
//!
//! Resolved once per request, in order: `?request_id=` query parameter,
//! `X-Request-ID` header, freshly generated UUID v4. The id is stored in the
//! request extensions and echoed back in the `X-Request-ID` response header.

use std::convert::Infallible;
use std::fmt;

use axum::{
    extract::{FromRequestParts, Query, Request},
    http::{request::Parts, HeaderMap, HeaderValue, Uri},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::models::PredictionQuery;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    fn resolve(uri: &Uri, headers: &HeaderMap) -> Self {
        let from_query = Query::<PredictionQuery>::try_from_uri(uri)
            .ok()
            .and_then(|Query(q)| q.request_id);

        let from_header = || {
            headers
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        from_query
            .filter(|id| !id.trim().is_empty())
            .or_else(|| from_header().filter(|id| !id.trim().is_empty()))
            .map(|id| RequestId(id.trim().to_string()))
            .unwrap_or_else(|| RequestId(Uuid::new_v4().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Middleware: attach a request id to the request and its response
pub async fn assign_request_id(mut req: Request, next: Next) -> Response {
    let request_id = RequestId::resolve(req.uri(), req.headers());
    let header_value = HeaderValue::from_str(request_id.as_str()).ok();

    req.extensions_mut().insert(request_id);

    let mut response = next.run(req).await;
    if let Some(value) = header_value {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestId>()
            .cloned()
            .unwrap_or_else(|| RequestId::resolve(&parts.uri, &parts.headers)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(id: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_str(id).unwrap());
        headers
    }

    #[test]
    fn test_query_wins_over_header() {
        let uri: Uri = "/predict?request_id=from-query".parse().unwrap();
        let id = RequestId::resolve(&uri, &headers_with("from-header"));
        assert_eq!(id.as_str(), "from-query");
    }

    #[test]
    fn test_header_used_without_query() {
        let uri: Uri = "/predict".parse().unwrap();
        let id = RequestId::resolve(&uri, &headers_with("abc-123"));
        assert_eq!(id.as_str(), "abc-123");
    }

    #[test]
    fn test_blank_values_ignored() {
        let uri: Uri = "/predict?request_id=".parse().unwrap();
        let id = RequestId::resolve(&uri, &headers_with("  "));
        assert!(Uuid::parse_str(id.as_str()).is_ok());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let uri: Uri = "/predict".parse().unwrap();
        let a = RequestId::resolve(&uri, &HeaderMap::new());
        let b = RequestId::resolve(&uri, &HeaderMap::new());
        assert_ne!(a, b);
    }
}
