//! Request adapter: in-process dispatch of synthesized REST calls.
//!
//! Resolvers describe the REST call they need as a [`CallSpecification`] and
//! hand it to the [`Dispatcher`]. The dispatcher runs the optional
//! [`RequestCustomizer`] to completion first, then passes the final call to a
//! [`RequestAdapter`]. The production adapter, [`InProcessAdapter`], drives
//! the host's axum router directly with `tower::ServiceExt::oneshot`, so no
//! socket is involved while status codes and headers stay exactly what the
//! real server would produce.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request, header};
use futures_util::FutureExt;
use restgraph_openapi::HttpMethod;
use serde_json::Value as JsonValue;
use tower::ServiceExt;
use tracing::{debug, warn};

use crate::context::RequestContext;
use crate::error::BridgeError;

/// Error type returned by request customizers.
pub type CustomizeError = Box<dyn std::error::Error + Send + Sync>;

/// Body of a synthesized call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallBody {
    /// Structured body, serialized as `application/json`.
    Json(JsonValue),
    /// Pre-encoded body.
    Raw {
        content_type: Option<String>,
        bytes: Bytes,
    },
}

/// An abstract HTTP call.
///
/// Each resolver invocation builds its own specification; nothing in here is
/// shared between concurrent resolutions.
#[derive(Debug, Clone)]
pub struct CallSpecification {
    pub method: HttpMethod,
    /// Path with the query string already appended.
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Option<CallBody>,
}

impl CallSpecification {
    /// Creates a call without headers or body.
    #[must_use]
    pub fn new(method: HttpMethod, path_and_query: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        Self {
            method,
            path_and_query: path_and_query.into(),
            headers,
            body: None,
        }
    }

    /// Returns the path without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        self.path_and_query
            .split_once('?')
            .map_or(self.path_and_query.as_str(), |(path, _)| path)
    }

    /// Appends an already-encoded `name=value` pair to the query string.
    pub fn append_query(&mut self, name: &str, value: &str) {
        let separator = if self.path_and_query.contains('?') {
            '&'
        } else {
            '?'
        };
        self.path_and_query.push(separator);
        self.path_and_query.push_str(&urlencoding::encode(name));
        self.path_and_query.push('=');
        self.path_and_query.push_str(&urlencoding::encode(value));
    }

    /// Sets a header, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidArgument`] for names or values that are
    /// not valid in HTTP.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), BridgeError> {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| BridgeError::InvalidArgument {
                argument: name.to_string(),
                message: e.to_string(),
            })?;
        let header_value =
            HeaderValue::from_str(value).map_err(|e| BridgeError::InvalidArgument {
                argument: name.to_string(),
                message: e.to_string(),
            })?;
        self.headers.insert(header_name, header_value);
        Ok(())
    }

    /// Converts the specification into an `http` request.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Internal`] if the request cannot be assembled.
    pub fn into_request(self) -> Result<Request<Body>, BridgeError> {
        let method = match self.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Post => Method::POST,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Head => Method::HEAD,
            HttpMethod::Options => Method::OPTIONS,
            HttpMethod::Trace => Method::TRACE,
        };

        let (body, content_type) = match self.body {
            None => (Body::empty(), None),
            Some(CallBody::Json(value)) => {
                let bytes = serde_json::to_vec(&value)
                    .map_err(|e| BridgeError::Internal(format!("body encoding failed: {e}")))?;
                (Body::from(bytes), Some("application/json".to_string()))
            }
            Some(CallBody::Raw {
                content_type,
                bytes,
            }) => (Body::from(bytes), content_type),
        };

        let mut request = Request::builder()
            .method(method)
            .uri(self.path_and_query.as_str())
            .body(body)
            .map_err(|e| BridgeError::Internal(format!("invalid call specification: {e}")))?;

        *request.headers_mut() = self.headers;
        if let Some(content_type) = content_type {
            if !request.headers().contains_key(header::CONTENT_TYPE) {
                let value = HeaderValue::from_str(&content_type)
                    .map_err(|e| BridgeError::Internal(format!("invalid content type: {e}")))?;
                request.headers_mut().insert(header::CONTENT_TYPE, value);
            }
        }
        Ok(request)
    }
}

/// Outcome of a dispatched call.
#[derive(Debug, Clone)]
pub struct CallResult {
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CallResult {
    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the response content type, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Returns the body as lossy UTF-8 text.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Returns the body as JSON, falling back to a string for non-JSON bodies.
    #[must_use]
    pub fn body_value(&self) -> JsonValue {
        if self.body.is_empty() {
            return JsonValue::Null;
        }
        serde_json::from_slice(&self.body).unwrap_or_else(|_| JsonValue::String(self.text()))
    }
}

/// Turns a call specification into a response.
#[async_trait]
pub trait RequestAdapter: Send + Sync {
    /// Dispatches the call and waits for the complete response.
    async fn dispatch(&self, call: CallSpecification) -> Result<CallResult, BridgeError>;
}

/// Default cap on a buffered in-process response body.
pub const DEFAULT_RESPONSE_LIMIT: usize = 16 * 1024 * 1024;

/// Dispatches calls through the host router without touching the network.
#[derive(Clone)]
pub struct InProcessAdapter {
    router: Router,
    response_limit: usize,
}

impl InProcessAdapter {
    /// Creates an adapter over the host's route table.
    #[must_use]
    pub fn new(router: Router) -> Self {
        Self {
            router,
            response_limit: DEFAULT_RESPONSE_LIMIT,
        }
    }

    /// Caps how many response body bytes are buffered per call.
    #[must_use]
    pub fn with_response_limit(mut self, limit: usize) -> Self {
        self.response_limit = limit;
        self
    }
}

#[async_trait]
impl RequestAdapter for InProcessAdapter {
    async fn dispatch(&self, call: CallSpecification) -> Result<CallResult, BridgeError> {
        let target = format!("{} {}", call.method, call.path());
        let request = call.into_request()?;
        let response = match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(body, self.response_limit)
            .await
            .map_err(|e| {
                BridgeError::Internal(format!(
                    "failed to read response body of {target} (limit {} bytes): {e}",
                    self.response_limit
                ))
            })?;

        Ok(CallResult {
            status: parts.status.as_u16(),
            status_text: parts.status.canonical_reason().unwrap_or_default().to_string(),
            headers: parts.headers,
            body,
        })
    }
}

/// Rewrites a call using data from the inbound GraphQL request.
///
/// Customizers may change headers, the query string and the body. Changing
/// the method or path is rejected by the [`Dispatcher`].
#[async_trait]
pub trait RequestCustomizer: Send + Sync {
    async fn customize(
        &self,
        call: CallSpecification,
        context: &RequestContext,
    ) -> Result<CallSpecification, CustomizeError>;
}

/// Copies selected inbound headers into every call.
#[derive(Debug, Clone)]
pub struct ForwardHeaders {
    names: Vec<HeaderName>,
}

impl ForwardHeaders {
    /// Forwards the given header names.
    #[must_use]
    pub fn new(names: Vec<HeaderName>) -> Self {
        Self { names }
    }

    /// Parses header names, skipping invalid ones.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .filter_map(|name| match HeaderName::from_bytes(name.as_ref().as_bytes()) {
                Ok(header) => Some(header),
                Err(e) => {
                    warn!(header = name.as_ref(), error = %e, "Ignoring invalid forward header");
                    None
                }
            })
            .collect();
        Self { names }
    }
}

impl Default for ForwardHeaders {
    fn default() -> Self {
        Self::new(vec![header::AUTHORIZATION])
    }
}

#[async_trait]
impl RequestCustomizer for ForwardHeaders {
    async fn customize(
        &self,
        mut call: CallSpecification,
        context: &RequestContext,
    ) -> Result<CallSpecification, CustomizeError> {
        for name in &self.names {
            if let Some(value) = context.header(name) {
                call.headers.insert(name.clone(), value.clone());
            }
        }
        Ok(call)
    }
}

/// Adapts an async closure into a [`RequestCustomizer`].
#[derive(Clone)]
pub struct FnCustomizer<F> {
    f: F,
}

/// Builds a customizer from `async fn(call, context) -> Result<call, error>`.
pub fn customize_fn<F, Fut>(f: F) -> FnCustomizer<F>
where
    F: Fn(CallSpecification, RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<CallSpecification, CustomizeError>> + Send,
{
    FnCustomizer { f }
}

#[async_trait]
impl<F, Fut> RequestCustomizer for FnCustomizer<F>
where
    F: Fn(CallSpecification, RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<CallSpecification, CustomizeError>> + Send,
{
    async fn customize(
        &self,
        call: CallSpecification,
        context: &RequestContext,
    ) -> Result<CallSpecification, CustomizeError> {
        (self.f)(call, context.clone()).await
    }
}

/// Runs customization, then dispatch.
#[derive(Clone)]
pub struct Dispatcher {
    adapter: Arc<dyn RequestAdapter>,
    customizer: Option<Arc<dyn RequestCustomizer>>,
}

impl Dispatcher {
    /// Creates a dispatcher without a customizer.
    #[must_use]
    pub fn new(adapter: Arc<dyn RequestAdapter>) -> Self {
        Self {
            adapter,
            customizer: None,
        }
    }

    /// Installs a customizer.
    #[must_use]
    pub fn with_customizer(mut self, customizer: Arc<dyn RequestCustomizer>) -> Self {
        self.customizer = Some(customizer);
        self
    }

    /// Returns whether a customizer is installed.
    #[must_use]
    pub fn has_customizer(&self) -> bool {
        self.customizer.is_some()
    }

    /// Customizes and dispatches a call.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::AdapterMisuse`] when the customizer fails,
    /// panics or retargets the call, and propagates adapter failures.
    pub async fn send(
        &self,
        call: CallSpecification,
        context: &RequestContext,
    ) -> Result<CallResult, BridgeError> {
        let call = self.customize(call, context).await?;
        let method = call.method;
        let target = call.path_and_query.clone();

        let started = Instant::now();
        let result = self.adapter.dispatch(call).await?;
        debug!(
            request_id = %context.request_id,
            %method,
            target = %target,
            status = result.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "In-process call completed"
        );
        Ok(result)
    }

    async fn customize(
        &self,
        call: CallSpecification,
        context: &RequestContext,
    ) -> Result<CallSpecification, BridgeError> {
        let Some(customizer) = &self.customizer else {
            return Ok(call);
        };

        let method = call.method;
        let path = call.path().to_string();
        let customized = match AssertUnwindSafe(customizer.customize(call, context))
            .catch_unwind()
            .await
        {
            Ok(Ok(call)) => call,
            Ok(Err(e)) => return Err(BridgeError::AdapterMisuse(e.to_string())),
            Err(_) => {
                return Err(BridgeError::AdapterMisuse(
                    "request customizer panicked".to_string(),
                ));
            }
        };

        if customized.method != method || customized.path() != path {
            return Err(BridgeError::AdapterMisuse(format!(
                "customizer retargeted {method} {path} to {} {}",
                customized.method,
                customized.path()
            )));
        }
        Ok(customized)
    }
}
