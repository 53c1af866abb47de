//! Viewer fields for secured operations.
//!
//! A viewer is a root field that takes credentials as arguments and returns
//! an object holding the operations secured by one security scheme. Every
//! call made beneath the viewer, link traversals included, carries those
//! credentials.

use std::fmt;
use std::sync::Arc;

use async_graphql::dynamic::{Field, FieldFuture, FieldValue, InputValue, TypeRef};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use restgraph_openapi::SecurityScheme;

use super::graph::{ArgumentDef, FieldDef, GraphType};
use crate::adapter::CallSpecification;
use crate::error::BridgeError;

/// Credential kinds a viewer can accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ViewerScheme {
    Bearer,
    Basic,
    ApiKey { name: String, in_query: bool },
}

impl ViewerScheme {
    /// Returns the viewer kind for a security scheme, if supported.
    pub(crate) fn from_scheme(scheme: &SecurityScheme) -> Option<Self> {
        match scheme.scheme_type.as_str() {
            "http" => match scheme.scheme.as_deref().map(str::to_ascii_lowercase).as_deref() {
                Some("bearer") => Some(Self::Bearer),
                Some("basic") => Some(Self::Basic),
                _ => None,
            },
            "apiKey" => {
                let name = scheme.name.clone()?;
                match scheme.location.as_deref() {
                    Some("header") => Some(Self::ApiKey {
                        name,
                        in_query: false,
                    }),
                    Some("query") => Some(Self::ApiKey {
                        name,
                        in_query: true,
                    }),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn argument_names(&self) -> &'static [&'static str] {
        match self {
            Self::Bearer => &["token"],
            Self::Basic => &["username", "password"],
            Self::ApiKey { .. } => &["apiKey"],
        }
    }
}

/// Credentials supplied to a viewer field.
#[derive(Clone, PartialEq, Eq)]
pub(crate) enum Credentials {
    Bearer(String),
    Basic { username: String, password: String },
    ApiKey {
        name: String,
        in_query: bool,
        value: String,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(..)"),
            Self::Basic { username, .. } => write!(f, "Basic({username}, ..)"),
            Self::ApiKey { name, .. } => write!(f, "ApiKey({name}, ..)"),
        }
    }
}

impl Credentials {
    /// Adds the credentials to a call.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidArgument`] when the value cannot be
    /// carried in a header.
    pub(crate) fn apply(&self, call: &mut CallSpecification) -> Result<(), BridgeError> {
        match self {
            Self::Bearer(token) => call.set_header("authorization", &format!("Bearer {token}")),
            Self::Basic { username, password } => {
                let encoded = STANDARD.encode(format!("{username}:{password}"));
                call.set_header("authorization", &format!("Basic {encoded}"))
            }
            Self::ApiKey {
                name,
                in_query: true,
                value,
            } => {
                call.append_query(name, value);
                Ok(())
            }
            Self::ApiKey {
                name,
                in_query: false,
                value,
            } => call.set_header(name, value),
        }
    }
}

/// Parent value of the fields inside a viewer.
#[derive(Debug)]
pub(crate) struct ViewerNode {
    pub(crate) credentials: Arc<Credentials>,
}

/// Builds a viewer root field returning `type_name`.
pub(crate) fn viewer_field(
    field_name: &str,
    type_name: &str,
    scheme_name: &str,
    scheme: &ViewerScheme,
) -> (FieldDef, Field) {
    let ty = GraphType::named(type_name);
    let resolver_scheme = scheme.clone();
    let mut field = Field::new(field_name, ty.to_type_ref(), move |ctx| {
        let scheme = resolver_scheme.clone();
        FieldFuture::new(async move {
            let text = |name: &str| -> async_graphql::Result<String> {
                Ok(ctx.args.try_get(name)?.string()?.to_string())
            };
            let credentials = match scheme {
                ViewerScheme::Bearer => Credentials::Bearer(text("token")?),
                ViewerScheme::Basic => Credentials::Basic {
                    username: text("username")?,
                    password: text("password")?,
                },
                ViewerScheme::ApiKey { name, in_query } => Credentials::ApiKey {
                    name,
                    in_query,
                    value: text("apiKey")?,
                },
            };
            Ok(Some(FieldValue::owned_any(ViewerNode {
                credentials: Arc::new(credentials),
            })))
        })
    })
    .description(format!("Operations secured by the {scheme_name} scheme"));

    let mut arguments = Vec::new();
    for name in scheme.argument_names() {
        let arg_type = GraphType::named(TypeRef::STRING).non_null();
        field = field.argument(InputValue::new(*name, arg_type.to_type_ref()));
        arguments.push(ArgumentDef::new(name, &arg_type));
    }
    (FieldDef::new(field_name, &ty).with_arguments(arguments), field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use restgraph_openapi::HttpMethod;

    fn scheme(json: serde_json::Value) -> SecurityScheme {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_supported_schemes() {
        assert_eq!(
            ViewerScheme::from_scheme(&scheme(
                serde_json::json!({"type": "http", "scheme": "Bearer"})
            )),
            Some(ViewerScheme::Bearer)
        );
        assert_eq!(
            ViewerScheme::from_scheme(&scheme(
                serde_json::json!({"type": "apiKey", "name": "X-Key", "in": "header"})
            )),
            Some(ViewerScheme::ApiKey {
                name: "X-Key".into(),
                in_query: false
            })
        );
        assert_eq!(
            ViewerScheme::from_scheme(&scheme(
                serde_json::json!({"type": "apiKey", "name": "sid", "in": "cookie"})
            )),
            None
        );
        assert_eq!(
            ViewerScheme::from_scheme(&scheme(serde_json::json!({"type": "oauth2"}))),
            None
        );
    }

    #[test]
    fn test_apply_credentials() {
        let mut call = CallSpecification::new(HttpMethod::Get, "/me");
        Credentials::Basic {
            username: "aladdin".into(),
            password: "opensesame".into(),
        }
        .apply(&mut call)
        .unwrap();
        assert_eq!(
            call.headers["authorization"],
            "Basic YWxhZGRpbjpvcGVuc2VzYW1l"
        );

        let mut call = CallSpecification::new(HttpMethod::Get, "/me?x=1");
        Credentials::ApiKey {
            name: "key".into(),
            in_query: true,
            value: "s3cret".into(),
        }
        .apply(&mut call)
        .unwrap();
        assert_eq!(call.path_and_query, "/me?x=1&key=s3cret");
    }

    #[test]
    fn test_debug_hides_secrets() {
        let debug = format!("{:?}", Credentials::Bearer("abc.def".into()));
        assert!(!debug.contains("abc.def"));
    }
}
