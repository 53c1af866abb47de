//! Demo REST API served by the binary.
//!
//! Users reference companies by id, and the `getUser` response declares a
//! `company` link so the GraphQL schema can nest the company under a user.

use axum::extract::{Json, Path};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use restgraph_graphql::ApiRouter;
use restgraph_openapi::{
    DocumentDefinition, ExtractError, HttpMethod, RouteLink, RouteSchema, SchemaObject,
};
use serde_json::{Value, json};

const USERS: &[(&str, &str, &str)] = &[
    ("1", "Ada Lovelace", "10"),
    ("2", "Grace Hopper", "20"),
    ("3", "Alan Turing", "10"),
];

const COMPANIES: &[(&str, &str)] = &[("10", "Analytical Engines"), ("20", "Compilers Inc")];

fn id_params() -> SchemaObject {
    SchemaObject::object([("id", SchemaObject::of_type("string"))]).with_required(["id"])
}

fn user_schema() -> SchemaObject {
    SchemaObject::object([
        ("id", SchemaObject::of_type("string")),
        ("name", SchemaObject::of_type("string")),
        ("companyId", SchemaObject::of_type("string")),
    ])
}

fn user_json(&(id, name, company_id): &(&str, &str, &str)) -> Value {
    json!({ "id": id, "name": name, "companyId": company_id })
}

fn not_found(what: &str, id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": format!("{what} {id} not found") })),
    )
        .into_response()
}

async fn list_users() -> Json<Value> {
    Json(Value::Array(USERS.iter().map(user_json).collect()))
}

async fn get_user(Path(id): Path<String>) -> Response {
    match USERS.iter().find(|(uid, _, _)| *uid == id) {
        Some(user) => Json(user_json(user)).into_response(),
        None => not_found("user", &id),
    }
}

async fn get_company(Path(id): Path<String>) -> Response {
    match COMPANIES.iter().find(|(cid, _)| *cid == id) {
        Some((cid, name)) => Json(json!({ "id": cid, "name": name })).into_response(),
        None => not_found("company", &id),
    }
}

async fn greet(Path(id): Path<String>, Json(body): Json<Value>) -> Json<Value> {
    let hello = body
        .get("hello")
        .and_then(Value::as_str)
        .unwrap_or("undefined");
    Json(json!({ "id": id, "hello": format!("Hello {hello}") }))
}

/// Builds the demo routes.
///
/// # Errors
///
/// Fails only if two routes collide, which the fixed route table rules out.
pub fn demo_api(definition: DocumentDefinition) -> Result<ApiRouter, ExtractError> {
    ApiRouter::new(definition)
        .route(
            HttpMethod::Get,
            "/users",
            RouteSchema::new()
                .operation_id("listUsers")
                .response("200", SchemaObject::array(user_schema())),
            list_users,
        )?
        .route(
            HttpMethod::Get,
            "/user/{id}",
            RouteSchema::new()
                .operation_id("getUser")
                .params(id_params())
                .response("200", user_schema())
                .link(
                    "200",
                    "company",
                    RouteLink::to("getCompany").param("id", "$response.body#/companyId"),
                ),
            get_user,
        )?
        .route(
            HttpMethod::Get,
            "/company/{id}",
            RouteSchema::new()
                .operation_id("getCompany")
                .params(id_params())
                .response(
                    "200",
                    SchemaObject::object([
                        ("id", SchemaObject::of_type("string")),
                        ("name", SchemaObject::of_type("string")),
                    ]),
                ),
            get_company,
        )?
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
                    SchemaObject::object([
                        ("id", SchemaObject::of_type("string")),
                        ("hello", SchemaObject::of_type("string")),
                    ]),
                ),
            greet,
        )
}
