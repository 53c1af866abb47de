//! Integration tests for the GraphQL bridge.
//!
//! These tests register axum routes with OpenAPI metadata, mount the bridge
//! and drive it through the GraphQL endpoint, so every query goes through
//! synthesis, in-process dispatch and response mapping.

use std::time::Duration;

use assert_json_diff::assert_json_eq;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::{Json, Path};
use axum::http::{HeaderName, HeaderValue, Request, StatusCode};
use axum::response::IntoResponse;
use restgraph_graphql::{ApiRouter, BridgeConfig, GraphQLBridge};
use restgraph_openapi::{DocumentDefinition, HttpMethod, RouteLink, RouteSchema, SchemaObject};
use serde_json::{Value, json};
use tower::ServiceExt;

// =============================================================================
// Fixtures
// =============================================================================

fn id_params() -> SchemaObject {
    SchemaObject::object([("id", SchemaObject::of_type("string"))]).with_required(["id"])
}

fn user_schema() -> SchemaObject {
    SchemaObject::object([
        ("name", SchemaObject::of_type("string")),
        ("companyId", SchemaObject::of_type("string")),
    ])
}

async fn get_user(Path(id): Path<String>) -> Json<Value> {
    // Later ids answer first so concurrent calls interleave
    let delay = if id.ends_with('1') { 30 } else { 5 };
    tokio::time::sleep(Duration::from_millis(delay)).await;
    if id == "nocompany" {
        return Json(json!({ "name": "Loner" }));
    }
    let company_id = id.trim_start_matches("foo").to_string();
    Json(json!({ "name": format!("User {id}"), "companyId": company_id }))
}

async fn get_company(Path(id): Path<String>) -> Json<Value> {
    Json(json!({ "name": format!("Company {id}") }))
}

async fn list_users() -> Json<Value> {
    Json(json!([
        { "name": "Ann", "companyId": "42" },
        { "name": "Bob", "companyId": "7" }
    ]))
}

async fn get_badge(Path(id): Path<String>) -> impl IntoResponse {
    (
        [(
            HeaderName::from_static("x-company-id"),
            HeaderValue::from_static("99"),
        )],
        Json(json!({ "label": format!("Badge {id}") })),
    )
}

async fn put_some_route(Path(_id): Path<String>, Json(body): Json<Value>) -> Json<Value> {
    let hello = body.get("hello").and_then(Value::as_str).unwrap_or("undefined");
    Json(json!({ "hello": format!("Hello {hello}") }))
}

async fn get_missing(Path(id): Path<String>) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": format!("no thing {id}") })),
    )
}

fn api() -> ApiRouter {
    ApiRouter::new(DocumentDefinition::default())
        .route(
            HttpMethod::Get,
            "/user/{id}",
            RouteSchema::new()
                .operation_id("user")
                .params(id_params())
                .response("200", user_schema())
                .link(
                    "200",
                    "company",
                    RouteLink::to("company").param("id", "$response.body#/companyId"),
                ),
            get_user,
        )
        .unwrap()
        .route(
            HttpMethod::Get,
            "/company/{id}",
            RouteSchema::new()
                .operation_id("company")
                .params(id_params())
                .response(
                    "200",
                    SchemaObject::object([("name", SchemaObject::of_type("string"))]),
                )
                .link(
                    "200",
                    "self",
                    RouteLink::to("company").param("id", "$request.path.id"),
                ),
            get_company,
        )
        .unwrap()
        .route(
            HttpMethod::Get,
            "/users",
            RouteSchema::new()
                .operation_id("users")
                .response("200", SchemaObject::array(user_schema()))
                .link(
                    "200",
                    "company",
                    RouteLink::to("company").param("id", "$response.body#/companyId"),
                ),
            list_users,
        )
        .unwrap()
        .route(
            HttpMethod::Get,
            "/badge/{id}",
            RouteSchema::new()
                .operation_id("badge")
                .params(id_params())
                .response(
                    "200",
                    SchemaObject::object([("label", SchemaObject::of_type("string"))]),
                )
                .link(
                    "200",
                    "employer",
                    RouteLink::to("company").param("id", "$response.header.x-company-id"),
                ),
            get_badge,
        )
        .unwrap()
        .route(
            HttpMethod::Put,
            "/some-route/{id}",
            RouteSchema::new()
                .params(id_params())
                .body(SchemaObject::object([(
                    "hello",
                    SchemaObject::of_type("string"),
                )]))
                .response(
                    "200",
                    SchemaObject::object([("hello", SchemaObject::of_type("string"))]),
                ),
            put_some_route,
        )
        .unwrap()
        .route(
            HttpMethod::Get,
            "/missing/{id}",
            RouteSchema::new()
                .operation_id("missing")
                .params(id_params())
                .response(
                    "200",
                    SchemaObject::object([("name", SchemaObject::of_type("string"))]),
                ),
            get_missing,
        )
        .unwrap()
}

async fn mounted() -> Router {
    GraphQLBridge::new(BridgeConfig::default())
        .mount(api())
        .await
        .expect("bridge should mount")
        .router()
}

async fn graphql(router: &Router, query: &str) -> Value {
    let request = Request::post("/graphql")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "query": query }).to_string()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// Mutations
// =============================================================================

#[tokio::test]
async fn test_mutation_passes_body_through() {
    let router = mounted().await;

    let body = graphql(
        &router,
        r#"mutation { putSomeRouteId(id: "1", putSomeRouteIdInput: { hello: "world" }) { hello } }"#,
    )
    .await;
    assert_eq!(body, json!({ "data": { "putSomeRouteId": { "hello": "Hello world" } } }));
}

#[tokio::test]
async fn test_mutation_absent_body_field() {
    let router = mounted().await;

    let body = graphql(
        &router,
        r#"mutation { putSomeRouteId(id: "1", putSomeRouteIdInput: {}) { hello } }"#,
    )
    .await;
    assert_eq!(body["data"]["putSomeRouteId"]["hello"], "Hello undefined");

    let body = graphql(&router, r#"mutation { putSomeRouteId(id: "1") { hello } }"#).await;
    assert_eq!(body["data"]["putSomeRouteId"]["hello"], "Hello undefined");
}

// =============================================================================
// Links
// =============================================================================

#[tokio::test]
async fn test_nested_link_resolution() {
    let router = mounted().await;

    let body = graphql(
        &router,
        r#"{ user(id: "foo42") { name companyId company { name } } }"#,
    )
    .await;
    assert_json_eq!(
        body,
        json!({
            "data": {
                "user": {
                    "name": "User foo42",
                    "companyId": "42",
                    "company": { "name": "Company 42" }
                }
            }
        })
    );
}

#[tokio::test]
async fn test_unresolvable_link_fails_only_that_field() {
    let router = mounted().await;

    let body = graphql(&router, r#"{ user(id: "nocompany") { name company { name } } }"#).await;
    assert_eq!(body["data"]["user"]["name"], "Loner");
    assert!(body["data"]["user"].as_object().unwrap().contains_key("company"));
    assert_eq!(body["data"]["user"]["company"], Value::Null);
    assert_eq!(body["errors"][0]["path"], json!(["user", "company"]));
    assert_eq!(
        body["errors"][0]["extensions"]["code"],
        "LINK_RESOLUTION_FAILED"
    );
}

#[tokio::test]
async fn test_list_items_resolve_their_own_links() {
    let router = mounted().await;

    let body = graphql(&router, "{ users { name company { name } } }").await;
    assert_json_eq!(
        body,
        json!({
            "data": {
                "users": [
                    { "name": "Ann", "company": { "name": "Company 42" } },
                    { "name": "Bob", "company": { "name": "Company 7" } }
                ]
            }
        })
    );
}

#[tokio::test]
async fn test_link_from_request_path() {
    let router = mounted().await;

    let body = graphql(&router, r#"{ company(id: "a b/c") { name self { name } } }"#).await;
    assert!(body.get("errors").is_none(), "{body}");
    assert_eq!(body["data"]["company"]["name"], "Company a b/c");
    assert_eq!(body["data"]["company"]["self"]["name"], "Company a b/c");
}

#[tokio::test]
async fn test_link_from_response_header() {
    let router = mounted().await;

    let body = graphql(&router, r#"{ badge(id: "b1") { label employer { name } } }"#).await;
    assert!(body.get("errors").is_none(), "{body}");
    assert_eq!(body["data"]["badge"]["label"], "Badge b1");
    assert_eq!(body["data"]["badge"]["employer"]["name"], "Company 99");
}

#[tokio::test]
async fn test_response_keeps_selection_order() {
    let router = mounted().await;

    let body = graphql(
        &router,
        r#"{ user(id: "foo42") { company { name } name companyId } }"#,
    )
    .await;
    let keys: Vec<_> = body["data"]["user"]
        .as_object()
        .unwrap()
        .keys()
        .cloned()
        .collect();
    assert_eq!(keys, vec!["company", "name", "companyId"]);
}

// =============================================================================
// Errors and concurrency
// =============================================================================

#[tokio::test]
async fn test_dispatch_error_keeps_siblings() {
    let router = mounted().await;

    let body = graphql(
        &router,
        r#"{ user(id: "foo7") { name } missing(id: "x") { name } }"#,
    )
    .await;
    assert_eq!(body["data"]["user"]["name"], "User foo7");
    assert!(body["data"].as_object().unwrap().contains_key("missing"));
    assert_eq!(body["data"]["missing"], Value::Null);

    let error = &body["errors"][0];
    assert_eq!(error["path"], json!(["missing"]));
    assert_eq!(error["extensions"]["code"], "DISPATCH_FAILED");
    assert_eq!(error["extensions"]["status"], 404);
    assert_eq!(error["extensions"]["body"]["message"], "no thing x");
}

#[tokio::test]
async fn test_concurrent_fields_do_not_share_calls() {
    let router = mounted().await;

    let body = graphql(
        &router,
        r#"{
            a: user(id: "foo1") { name company { name } }
            b: user(id: "foo2") { name company { name } }
        }"#,
    )
    .await;
    assert!(body.get("errors").is_none(), "{body}");
    assert_eq!(body["data"]["a"]["name"], "User foo1");
    assert_eq!(body["data"]["a"]["company"]["name"], "Company 1");
    assert_eq!(body["data"]["b"]["name"], "User foo2");
    assert_eq!(body["data"]["b"]["company"]["name"], "Company 2");
}

#[tokio::test]
async fn test_missing_required_argument_is_a_validation_error() {
    let router = mounted().await;

    let body = graphql(&router, "{ user { name } }").await;
    assert!(body["errors"].is_array());
    assert!(body.get("data").is_none());
}
