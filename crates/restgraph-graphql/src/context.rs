//! Per-request GraphQL execution context.
//!
//! A [`RequestContext`] is attached to every GraphQL request as query data.
//! Resolvers hand it to the request customizer so that values from the
//! inbound request (typically its `Authorization` header) can be copied into
//! the synthesized REST calls.

use axum::http::{HeaderMap, HeaderName, HeaderValue};

/// Context of the inbound GraphQL request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Headers of the inbound GraphQL HTTP request.
    pub headers: HeaderMap,

    /// Request ID for tracing and correlation.
    pub request_id: String,
}

impl RequestContext {
    /// Creates a context from inbound headers.
    ///
    /// The request id is taken from `x-request-id` when present, otherwise a
    /// fresh UUID is generated.
    #[must_use]
    pub fn from_headers(headers: HeaderMap) -> Self {
        let request_id = headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Self {
            headers,
            request_id,
        }
    }

    /// Returns an inbound header value.
    #[must_use]
    pub fn header(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    /// Returns the inbound `Authorization` header.
    #[must_use]
    pub fn authorization(&self) -> Option<&HeaderValue> {
        self.headers.get(axum::http::header::AUTHORIZATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("req-123"));
        let ctx = RequestContext::from_headers(headers);
        assert_eq!(ctx.request_id, "req-123");
    }

    #[test]
    fn test_request_id_generated() {
        let ctx = RequestContext::from_headers(HeaderMap::new());
        assert!(uuid::Uuid::parse_str(&ctx.request_id).is_ok());
        assert!(ctx.authorization().is_none());
    }
}
