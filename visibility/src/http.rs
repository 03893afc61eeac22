//! HTTP surface.
//!
//! A thin `axum` layer over `ListingService`:
//!
//! - `GET /executions?query=&archetype=&page_size=&page_token=`
//! - `GET /executions/count?query=&archetype=`
//! - `PUT /executions` with `{"run_id": "...", "attributes": {...}}`
//!
//! A request with an `archetype` parameter is a scoped query for that
//! archetype; without one it is a standard query. An absent or zero
//! `page_size` uses the configured default. Page tokens travel as
//! lowercase hex. Errors are returned as `{"code": "...", "message": "..."}`.

use std::fmt::Write;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::backend::{CancelSignal, StoreError};
use crate::backend::document::MemoryStore;
use crate::listing::{ListError, ListRequest, ListingService};
use crate::query::QueryKind;
use crate::registry::AttributeLookup;
use crate::types::{AttributeType, AttributeValue, ExecutionRecord};

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ListingService<MemoryStore>>,
    /// Page size used when a request does not give one.
    pub default_page_size: usize,
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/executions", get(list_executions).put(upsert_execution))
        .route("/executions/count", get(count_executions))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub query: Option<String>,
    pub archetype: Option<String>,
    pub page_size: Option<usize>,
    pub page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CountParams {
    pub query: Option<String>,
    pub archetype: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpsertBody {
    pub run_id: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct ExecutionBody {
    pub run_id: String,
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct ListBody {
    pub executions: Vec<ExecutionBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CountBody {
    pub count: u64,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct HttpError {
    #[serde(skip)]
    status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl HttpError {
    fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code,
            message: message.into(),
        }
    }
}

impl From<ListError> for HttpError {
    fn from(e: ListError) -> Self {
        let status = match &e {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            ListError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            e if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            ListError::Store(StoreError::Cancelled) => StatusCode::REQUEST_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            code: e.code(),
            message: e.to_string(),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

fn query_kind(archetype: Option<String>) -> QueryKind {
    archetype
        .filter(|id| !id.is_empty())
        .map_or(QueryKind::Standard, QueryKind::Scoped)
}

async fn list_executions(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListBody>, HttpError> {
    let page_token = params
        .page_token
        .filter(|token| !token.is_empty())
        .map(|token| {
            decode_hex(&token)
                .ok_or_else(|| HttpError::bad_request("invalid_page_token", "page token is not hex"))
        })
        .transpose()?;

    let mut request = ListRequest::new(
        query_kind(params.archetype),
        params
            .page_size
            .filter(|size| *size > 0)
            .unwrap_or(state.default_page_size),
    )
    .with_page_token(page_token);
    request.query = params.query;

    let response = state
        .service
        .list_executions(request, CancelSignal::never())
        .await?;

    Ok(Json(ListBody {
        executions: response.records.iter().map(execution_body).collect(),
        next_page_token: response.next_page_token.as_deref().map(encode_hex),
    }))
}

async fn count_executions(
    State(state): State<AppState>,
    Query(params): Query<CountParams>,
) -> Result<Json<CountBody>, HttpError> {
    let count = state
        .service
        .count_executions(
            params.query.as_deref(),
            query_kind(params.archetype),
            CancelSignal::never(),
        )
        .await?;
    Ok(Json(CountBody { count }))
}

async fn upsert_execution(
    State(state): State<AppState>,
    Json(body): Json<UpsertBody>,
) -> Result<StatusCode, HttpError> {
    let record = build_record(state.service.registry(), body)?;
    state
        .service
        .store()
        .upsert(record)
        .map_err(|e| HttpError::from(ListError::Store(e)))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Coerce an upsert body into a record using the registered attribute types.
fn build_record(
    registry: &dyn AttributeLookup,
    body: UpsertBody,
) -> Result<ExecutionRecord, HttpError> {
    if body.run_id.is_empty() {
        return Err(HttpError::bad_request("invalid_record", "run_id must not be empty"));
    }
    let mut record = ExecutionRecord::new(body.run_id);
    for (name, json) in body.attributes {
        let attribute = registry.get_attribute(&name).ok_or_else(|| {
            HttpError::bad_request("unknown_attribute", format!("unknown search attribute: {name}"))
        })?;
        let value = json_to_value(attribute.attribute_type, &json).ok_or_else(|| {
            HttpError::bad_request(
                "type_mismatch",
                format!(
                    "search attribute {name} expects a {} value, got {json}",
                    attribute.attribute_type
                ),
            )
        })?;
        record.set(name, value);
    }
    Ok(record)
}

fn json_to_value(attribute_type: AttributeType, json: &Value) -> Option<AttributeValue> {
    match (attribute_type, json) {
        (AttributeType::String | AttributeType::Keyword, Value::String(s)) => {
            Some(AttributeValue::Text(s.as_str().to_owned()))
        }
        (AttributeType::Int, Value::Number(n)) => n.as_i64().map(AttributeValue::Int),
        (AttributeType::Bool, Value::Bool(b)) => Some(AttributeValue::Bool(*b)),
        (AttributeType::Datetime, Value::Number(n)) => n.as_i64().map(AttributeValue::Datetime),
        (AttributeType::Datetime, Value::String(s)) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()?
            .timestamp_nanos_opt()
            .map(AttributeValue::Datetime),
        (AttributeType::KeywordList, Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_owned))
            .collect::<Option<Vec<_>>>()
            .map(AttributeValue::KeywordList),
        _ => None,
    }
}

fn value_to_json(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Text(s) => Value::from(s.as_str()),
        AttributeValue::Int(n) => Value::from(*n),
        AttributeValue::Bool(b) => Value::from(*b),
        AttributeValue::Datetime(nanos) => Value::from(
            chrono::DateTime::from_timestamp_nanos(*nanos)
                .to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true),
        ),
        AttributeValue::KeywordList(items) => Value::from(items.as_slice()),
    }
}

fn execution_body(record: &ExecutionRecord) -> ExecutionBody {
    ExecutionBody {
        run_id: record.run_id().to_owned(),
        attributes: record
            .attributes()
            .map(|(name, value)| (name.to_owned(), value_to_json(value)))
            .collect(),
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut acc, b| {
            let _ = write!(acc, "{b:02x}");
            acc
        })
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| text.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::ListingOptions;
    use crate::registry::{AttributeRegistry, DEFAULT_PARTITION_ATTRIBUTE, START_TIME};

    fn state() -> AppState {
        let registry = AttributeRegistry::default()
            .with_custom("CustomAttr", AttributeType::Keyword)
            .expect("registry");
        AppState {
            service: Arc::new(ListingService::new(
                Arc::new(MemoryStore::new()),
                Arc::new(registry),
                ListingOptions::default(),
            )),
            default_page_size: 2,
        }
    }

    async fn put(state: &AppState, body: Value) -> Result<StatusCode, HttpError> {
        let body: UpsertBody = serde_json::from_value(body).expect("body");
        upsert_execution(State(state.clone()), Json(body)).await
    }

    #[test]
    fn test_hex_round_trip() {
        let bytes = vec![0x00, 0x7f, 0xff, 0x10];
        assert_eq!(encode_hex(&bytes), "007fff10");
        assert_eq!(decode_hex("007fff10"), Some(bytes));
        assert_eq!(decode_hex("0g"), None);
        assert_eq!(decode_hex("abc"), None);
        assert_eq!(decode_hex("+f"), None);
        assert_eq!(decode_hex("-1"), None);
    }

    #[tokio::test]
    async fn test_sign_prefixed_token_is_not_hex() {
        let error = list_executions(
            State(state()),
            Query(ListParams {
                page_token: Some("+f".to_owned()),
                ..ListParams::default()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(error.code, "invalid_page_token");
        assert_eq!(error.message, "page token is not hex");
    }

    #[test]
    fn test_datetime_json_round_trip() {
        let value = json_to_value(
            AttributeType::Datetime,
            &Value::from("2024-01-01T00:00:00Z"),
        )
        .expect("datetime");
        assert_eq!(value, AttributeValue::Datetime(1_704_067_200_000_000_000));
        assert_eq!(value_to_json(&value), Value::from("2024-01-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn test_put_then_list_with_scoping() {
        let state = state();
        put(
            &state,
            serde_json::json!({"run_id": "user", "attributes": {"CustomAttr": "x"}}),
        )
        .await
        .expect("put");
        put(
            &state,
            serde_json::json!({
                "run_id": "system",
                "attributes": {"CustomAttr": "x", DEFAULT_PARTITION_ATTRIBUTE: "scheduler"}
            }),
        )
        .await
        .expect("put");

        let Json(body) = list_executions(
            State(state.clone()),
            Query(ListParams {
                query: Some("CustomAttr = 'x'".to_owned()),
                ..ListParams::default()
            }),
        )
        .await
        .expect("list");
        assert_eq!(body.executions.len(), 1);
        assert_eq!(body.executions[0].run_id, "user");

        let Json(count) = count_executions(
            State(state),
            Query(CountParams {
                archetype: Some("scheduler".to_owned()),
                ..CountParams::default()
            }),
        )
        .await
        .expect("count");
        assert_eq!(count.count, 1);
    }

    #[tokio::test]
    async fn test_pagination_over_http() {
        let state = state();
        for i in 0..3 {
            put(
                &state,
                serde_json::json!({"run_id": format!("run-{i}"), "attributes": {START_TIME: i}}),
            )
            .await
            .expect("put");
        }

        let Json(first) = list_executions(State(state.clone()), Query(ListParams::default()))
            .await
            .expect("list");
        assert_eq!(first.executions.len(), 2);
        let token = first.next_page_token.expect("token");

        let Json(second) = list_executions(
            State(state),
            Query(ListParams {
                page_token: Some(token),
                ..ListParams::default()
            }),
        )
        .await
        .expect("list");
        assert_eq!(second.executions.len(), 1);
        assert_eq!(second.executions[0].run_id, "run-0");
        assert!(second.next_page_token.is_none());
    }

    #[tokio::test]
    async fn test_zero_page_size_uses_default() {
        let state = state();
        for run_id in ["a", "b", "c"] {
            put(&state, serde_json::json!({"run_id": run_id, "attributes": {}}))
                .await
                .expect("put");
        }

        let Json(body) = list_executions(
            State(state),
            Query(ListParams {
                page_size: Some(0),
                ..ListParams::default()
            }),
        )
        .await
        .expect("list");
        assert_eq!(body.executions.len(), 2);
        assert!(body.next_page_token.is_some());
    }

    #[tokio::test]
    async fn test_errors_map_to_status() {
        let state = state();
        let error = put(
            &state,
            serde_json::json!({"run_id": "r", "attributes": {"Nope": 1}}),
        )
        .await
        .unwrap_err();
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        assert_eq!(error.code, "unknown_attribute");

        let error = list_executions(
            State(state.clone()),
            Query(ListParams {
                query: Some("CustomAttr >".to_owned()),
                ..ListParams::default()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(error.code, "invalid_query");

        state.service.store().set_unavailable(true);
        let error = list_executions(State(state), Query(ListParams::default()))
            .await
            .unwrap_err();
        assert_eq!(error.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error.code, "backend_unavailable");
    }
}
