//! Error types for the GraphQL bridge.
//!
//! Synthesis errors are fatal at startup. Everything else happens while a
//! single field resolves and is turned into a field-level GraphQL error with
//! [`BridgeError::to_field_error`], so sibling fields keep resolving.

use std::fmt;

use async_graphql::ErrorExtensions;
use restgraph_openapi::{ExpressionError, ExtractError};
use serde_json::Value as JsonValue;

/// Errors that can occur in the bridge.
#[derive(Debug, Clone)]
pub enum BridgeError {
    /// The document produced no usable schema.
    SynthesisFailed(String),

    /// The OpenAPI document could not be obtained.
    Extraction(ExtractError),

    /// A link parameter could not be evaluated.
    LinkResolution {
        /// Link field name.
        link: String,
        /// Why evaluation failed.
        message: String,
    },

    /// The in-process call returned a non-2xx status.
    Dispatch {
        status: u16,
        status_text: String,
        /// Response body, decoded as JSON when possible.
        body: JsonValue,
    },

    /// The request customizer failed or tried to retarget the call.
    AdapterMisuse(String),

    /// A 2xx response body could not be decoded.
    Decode(String),

    /// A required argument was not supplied.
    MissingArgument {
        operation: String,
        argument: String,
    },

    /// An argument value cannot be sent over HTTP.
    InvalidArgument {
        argument: String,
        message: String,
    },

    /// Invalid GraphQL request.
    InvalidQuery(String),

    /// Internal error.
    Internal(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SynthesisFailed(msg) => {
                write!(f, "Failed to synthesize GraphQL schema: {msg}")
            }
            Self::Extraction(err) => {
                write!(f, "OpenAPI document unavailable: {err}")
            }
            Self::LinkResolution { link, message } => {
                write!(f, "Cannot resolve link '{link}': {message}")
            }
            Self::Dispatch {
                status,
                status_text,
                ..
            } => {
                write!(f, "Upstream operation failed with {status} {status_text}")
            }
            Self::AdapterMisuse(msg) => {
                write!(f, "Request customization failed: {msg}")
            }
            Self::Decode(msg) => {
                write!(f, "Cannot decode response body: {msg}")
            }
            Self::MissingArgument {
                operation,
                argument,
            } => {
                write!(f, "Operation '{operation}' requires argument '{argument}'")
            }
            Self::InvalidArgument { argument, message } => {
                write!(f, "Invalid argument '{argument}': {message}")
            }
            Self::InvalidQuery(msg) => {
                write!(f, "Invalid GraphQL query: {msg}")
            }
            Self::Internal(msg) => {
                write!(f, "Internal error: {msg}")
            }
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Extraction(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ExtractError> for BridgeError {
    fn from(err: ExtractError) -> Self {
        Self::Extraction(err)
    }
}

impl BridgeError {
    /// Wraps an expression failure for the named link.
    #[must_use]
    pub fn link(link: &str, err: &ExpressionError) -> Self {
        Self::LinkResolution {
            link: link.to_string(),
            message: err.to_string(),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::SynthesisFailed(_) | Self::Extraction(_) => 503,
            Self::LinkResolution { .. } => 422,
            Self::Dispatch { status, .. } => *status,
            Self::AdapterMisuse(_) => 500,
            Self::Decode(_) => 502,
            Self::MissingArgument { .. } | Self::InvalidArgument { .. } => 400,
            Self::InvalidQuery(_) => 400,
            Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for GraphQL error extensions.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SynthesisFailed(_) => "SYNTHESIS_FAILED",
            Self::Extraction(_) => "EXTRACTION_FAILED",
            Self::LinkResolution { .. } => "LINK_RESOLUTION_FAILED",
            Self::Dispatch { .. } => "DISPATCH_FAILED",
            Self::AdapterMisuse(_) => "ADAPTER_MISUSE",
            Self::Decode(_) => "DECODE_FAILED",
            Self::MissingArgument { .. } => "MISSING_ARGUMENT",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::InvalidQuery(_) => "INVALID_QUERY",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Converts the error into a field-level GraphQL error.
    #[must_use]
    pub fn to_field_error(&self) -> async_graphql::Error {
        let code = self.error_code();
        let error = async_graphql::Error::new(self.to_string()).extend_with(|_, e| {
            e.set("code", code);
        });
        match self {
            Self::Dispatch {
                status,
                status_text,
                body,
            } => {
                let body = async_graphql::Value::from_json(body.clone())
                    .unwrap_or(async_graphql::Value::Null);
                let status = *status;
                let status_text = status_text.clone();
                error.extend_with(move |_, e| {
                    e.set("status", i32::from(status));
                    e.set("statusText", status_text.as_str());
                    e.set("body", body.clone());
                })
            }
            _ => error,
        }
    }
}
