//! Axum HTTP handlers for the GraphQL bridge.
//!
//! - `POST <graphql.path>` - Executes a GraphQL request
//! - `GET <graphql.path>` - Executes a GraphQL request from URL params
//! - `GET /graphiql` - GraphiQL explorer, when enabled
//! - `GET <route_prefix>/json` - The OpenAPI document, when exposed
//!
//! GraphQL requests always execute against the schema that is live when they
//! arrive. Field errors come back with status 200 inside the `errors` list.

use std::sync::Arc;

use async_graphql::http::GraphiQLSource;
use async_graphql::{Request, Response, Variables};
use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse};
use restgraph_openapi::RouteRegistry;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::RequestContext;
use crate::error::BridgeError;
use crate::lifecycle::LiveSchema;

/// State shared across GraphQL handlers.
#[derive(Clone)]
pub struct GraphQLState {
    pub live: Arc<LiveSchema>,
}

/// GraphQL request body.
#[derive(Debug, Deserialize)]
pub struct GraphQLRequest {
    pub query: String,

    /// Optional operation name for multi-operation documents.
    #[serde(rename = "operationName")]
    pub operation_name: Option<String>,

    pub variables: Option<serde_json::Value>,
}

/// Query parameters for GET requests.
#[derive(Debug, Deserialize)]
pub struct GraphQLQueryParams {
    pub query: Option<String>,

    #[serde(rename = "operationName")]
    pub operation_name: Option<String>,

    /// Variables as a JSON string.
    pub variables: Option<String>,
}

/// GraphQL response envelope.
#[derive(Debug, Serialize)]
pub struct GraphQLResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

impl From<Response> for GraphQLResponse {
    fn from(resp: Response) -> Self {
        let data_json = serde_json::to_value(&resp.data).unwrap_or(serde_json::Value::Null);
        let data = if data_json.is_null() && !resp.errors.is_empty() {
            None
        } else {
            Some(data_json)
        };

        let errors = resp
            .errors
            .into_iter()
            .map(|e| {
                let mut error_obj = serde_json::json!({ "message": e.message });
                if !e.locations.is_empty() {
                    error_obj["locations"] =
                        serde_json::to_value(&e.locations).unwrap_or(serde_json::Value::Null);
                }
                if !e.path.is_empty() {
                    error_obj["path"] =
                        serde_json::to_value(&e.path).unwrap_or(serde_json::Value::Null);
                }
                if let Some(extensions) = &e.extensions {
                    error_obj["extensions"] =
                        serde_json::to_value(extensions).unwrap_or(serde_json::Value::Null);
                }
                error_obj
            })
            .collect();

        Self {
            data,
            errors,
            extensions: if resp.extensions.is_empty() {
                None
            } else {
                Some(serde_json::to_value(&resp.extensions).unwrap_or(serde_json::Value::Null))
            },
        }
    }
}

/// Handles POST requests to the GraphQL endpoint.
pub async fn graphql_handler(
    State(state): State<GraphQLState>,
    headers: HeaderMap,
    Json(request): Json<GraphQLRequest>,
) -> impl IntoResponse {
    execute_graphql(state, headers, request).await.into_response()
}

/// Handles GET requests to the GraphQL endpoint.
pub async fn graphql_handler_get(
    State(state): State<GraphQLState>,
    headers: HeaderMap,
    Query(params): Query<GraphQLQueryParams>,
) -> impl IntoResponse {
    let request = match params_to_request(params) {
        Ok(req) => req,
        Err(e) => return error_response(e).into_response(),
    };
    execute_graphql(state, headers, request).await.into_response()
}

async fn execute_graphql(
    state: GraphQLState,
    headers: HeaderMap,
    request: GraphQLRequest,
) -> impl IntoResponse {
    let schema = state.live.load();
    let context = RequestContext::from_headers(headers);

    let mut gql_request = Request::new(&request.query);
    if let Some(op_name) = request.operation_name {
        gql_request = gql_request.operation_name(op_name);
    }
    if let Some(vars) = request.variables {
        gql_request = gql_request.variables(Variables::from_json(vars));
    }

    debug!(request_id = %context.request_id, query = %request.query, "Executing GraphQL query");
    let response = schema.execute(gql_request.data(context)).await;

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        Json(GraphQLResponse::from(response)),
    )
}

/// Renders the GraphiQL page for `endpoint`.
#[must_use]
pub fn graphiql_page(endpoint: &str) -> Html<String> {
    Html(GraphiQLSource::build().endpoint(endpoint).finish())
}

/// Serves the finalized OpenAPI document.
pub async fn document_handler(State(registry): State<RouteRegistry>) -> impl IntoResponse {
    match registry.current_document() {
        Ok(document) => (StatusCode::OK, Json(document.to_json())).into_response(),
        Err(e) => error_response(BridgeError::from(e)).into_response(),
    }
}

fn params_to_request(params: GraphQLQueryParams) -> Result<GraphQLRequest, BridgeError> {
    let Some(query) = params.query else {
        return Err(BridgeError::InvalidQuery("missing 'query' parameter".into()));
    };
    let variables = params
        .variables
        .map(|vars| serde_json::from_str(&vars))
        .transpose()
        .map_err(|e| BridgeError::InvalidQuery(format!("invalid variables: {e}")))?;

    Ok(GraphQLRequest {
        query,
        operation_name: params.operation_name,
        variables,
    })
}

fn error_response(error: BridgeError) -> impl IntoResponse {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = serde_json::json!({
        "errors": [{
            "message": error.to_string(),
            "extensions": { "code": error.error_code() }
        }]
    });
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        Json(body),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphql_request_deserialize() {
        let json = r#"{
            "query": "{ getUser(id: \"1\") { name } }",
            "operationName": "GetUser",
            "variables": {"id": "1"}
        }"#;

        let request: GraphQLRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.operation_name.as_deref(), Some("GetUser"));
        assert!(request.variables.is_some());
    }

    #[test]
    fn test_params_to_request() {
        let params = GraphQLQueryParams {
            query: Some("{ _placeholder }".to_string()),
            operation_name: None,
            variables: Some(r#"{"foo": "bar"}"#.to_string()),
        };
        let request = params_to_request(params).unwrap();
        assert_eq!(request.query, "{ _placeholder }");
        assert_eq!(request.variables.unwrap()["foo"], "bar");
    }

    #[test]
    fn test_params_to_request_rejects_bad_input() {
        let missing = GraphQLQueryParams {
            query: None,
            operation_name: None,
            variables: None,
        };
        assert!(matches!(
            params_to_request(missing),
            Err(BridgeError::InvalidQuery(_))
        ));

        let invalid = GraphQLQueryParams {
            query: Some("{ _placeholder }".to_string()),
            operation_name: None,
            variables: Some("not valid json".to_string()),
        };
        assert!(params_to_request(invalid).is_err());
    }

    #[test]
    fn test_response_keeps_error_extensions() {
        let error = BridgeError::Dispatch {
            status: 404,
            status_text: "Not Found".into(),
            body: serde_json::json!({"message": "no such user"}),
        };
        let server_error = error
            .to_field_error()
            .into_server_error(async_graphql::Pos { line: 1, column: 3 });
        let response = Response::from_errors(vec![server_error]);

        let envelope = serde_json::to_value(GraphQLResponse::from(response)).unwrap();
        assert!(envelope.get("data").is_none());
        assert_eq!(envelope["errors"][0]["extensions"]["code"], "DISPATCH_FAILED");
        assert_eq!(envelope["errors"][0]["extensions"]["status"], 404);
        assert_eq!(envelope["errors"][0]["locations"][0]["line"], 1);
    }
}
