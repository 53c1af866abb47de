//! Integration tests for credential forwarding.
//!
//! The `/me` route verifies an HS256 bearer token itself, so a query only
//! succeeds when the synthesized call carries the caller's credentials.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::Json;
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use restgraph_graphql::{
    ApiRouter, BridgeConfig, CallSpecification, CustomizeError, GraphQLBridge, customize_fn,
};
use restgraph_openapi::{DocumentDefinition, HttpMethod, RouteSchema, SchemaObject, SecurityScheme};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower::ServiceExt;

const SECRET: &[u8] = b"restgraph-test-secret";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: u64,
}

fn token(sub: &str, secret: &[u8]) -> String {
    let exp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
        + 3600;
    let claims = Claims {
        sub: sub.to_string(),
        exp,
    };
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret)).unwrap()
}

async fn me(headers: HeaderMap) -> Response {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let Some(bearer) = bearer else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "missing token" })),
        )
            .into_response();
    };
    match decode::<Claims>(
        bearer,
        &DecodingKey::from_secret(SECRET),
        &Validation::new(Algorithm::HS256),
    ) {
        Ok(data) => Json(json!({
            "sub": data.claims.sub,
            "tag": headers.get("x-tag").and_then(|v| v.to_str().ok()),
        }))
        .into_response(),
        Err(e) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

fn api() -> ApiRouter {
    let scheme: SecurityScheme =
        serde_json::from_value(json!({ "type": "http", "scheme": "bearer" })).unwrap();
    let mut definition = DocumentDefinition::default();
    definition
        .security_schemes
        .insert("bearerAuth".to_string(), scheme);

    ApiRouter::new(definition)
        .route(
            HttpMethod::Get,
            "/me",
            RouteSchema::new()
                .operation_id("me")
                .secured_by("bearerAuth")
                .response(
                    "200",
                    SchemaObject::object([
                        ("sub", SchemaObject::of_type("string")),
                        ("tag", SchemaObject::of_type("string")),
                    ]),
                ),
            me,
        )
        .unwrap()
}

async fn graphql(router: &Router, query: &str, authorization: Option<&str>) -> Value {
    let mut request = Request::post("/graphql").header("content-type", "application/json");
    if let Some(value) = authorization {
        request = request.header("authorization", value);
    }
    let request = request
        .body(Body::from(json!({ "query": query }).to_string()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn forwarding_config() -> BridgeConfig {
    BridgeConfig {
        forward_headers: vec!["authorization".to_string()],
        ..BridgeConfig::default()
    }
}

#[tokio::test]
async fn test_valid_token_is_forwarded() {
    let router = GraphQLBridge::new(forwarding_config())
        .mount(api())
        .await
        .unwrap()
        .router();

    let bearer = format!("Bearer {}", token("alice", SECRET));
    let body = graphql(&router, "{ me { sub } }", Some(&bearer)).await;
    assert_eq!(body, json!({ "data": { "me": { "sub": "alice" } } }));
}

#[tokio::test]
async fn test_missing_or_invalid_token_is_a_field_error() {
    let router = GraphQLBridge::new(forwarding_config())
        .mount(api())
        .await
        .unwrap()
        .router();

    let body = graphql(&router, "{ me { sub } }", None).await;
    assert_eq!(body["data"]["me"], Value::Null);
    assert_eq!(body["errors"][0]["extensions"]["code"], "DISPATCH_FAILED");
    assert_eq!(body["errors"][0]["extensions"]["status"], 401);

    let forged = format!("Bearer {}", token("mallory", b"wrong-secret"));
    let body = graphql(&router, "{ me { sub } }", Some(&forged)).await;
    assert_eq!(body["errors"][0]["extensions"]["status"], 401);
}

#[tokio::test]
async fn test_without_customizer_headers_are_not_forwarded() {
    let router = GraphQLBridge::new(BridgeConfig::default())
        .mount(api())
        .await
        .unwrap()
        .router();

    let bearer = format!("Bearer {}", token("alice", SECRET));
    let body = graphql(&router, "{ me { sub } }", Some(&bearer)).await;
    assert_eq!(body["errors"][0]["extensions"]["status"], 401);
}

#[tokio::test]
async fn test_programmatic_customizer() {
    let customizer = customize_fn(|mut call, context| async move {
        if let Some(value) = context.authorization() {
            call.headers.insert(header::AUTHORIZATION, value.clone());
        }
        call.set_header("x-tag", "customized")
            .map_err(|e| Box::new(e) as CustomizeError)?;
        Ok::<_, CustomizeError>(call)
    });
    let router = GraphQLBridge::new(BridgeConfig::default())
        .with_customizer(Arc::new(customizer))
        .mount(api())
        .await
        .unwrap()
        .router();

    let bearer = format!("Bearer {}", token("bob", SECRET));
    let body = graphql(&router, "{ me { sub tag } }", Some(&bearer)).await;
    assert_eq!(body, json!({ "data": { "me": { "sub": "bob", "tag": "customized" } } }));
}

#[tokio::test]
async fn test_failing_customizer_is_a_field_error() {
    let customizer = customize_fn(|_call, _context| async move {
        Err::<CallSpecification, CustomizeError>("token store offline".into())
    });
    let router = GraphQLBridge::new(BridgeConfig::default())
        .with_customizer(Arc::new(customizer))
        .mount(api())
        .await
        .unwrap()
        .router();

    let body = graphql(&router, "{ me { sub } }", None).await;
    assert_eq!(body["data"]["me"], Value::Null);
    assert_eq!(body["errors"][0]["extensions"]["code"], "ADAPTER_MISUSE");
}

#[tokio::test]
async fn test_viewer_supplies_credentials() {
    let config = BridgeConfig {
        viewer: true,
        ..BridgeConfig::default()
    };
    let router = GraphQLBridge::new(config).mount(api()).await.unwrap().router();

    let query = format!(
        r#"{{ viewerBearerAuth(token: "{}") {{ me {{ sub }} }} }}"#,
        token("carol", SECRET)
    );
    let body = graphql(&router, &query, None).await;
    assert_eq!(
        body,
        json!({ "data": { "viewerBearerAuth": { "me": { "sub": "carol" } } } })
    );
}
