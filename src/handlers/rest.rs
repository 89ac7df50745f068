//! HTTP binding: translate an axum request into a router `Request` and the envelope back.

use crate::error::{status_for_code, AppError};
use crate::response::Envelope;
use crate::route::RoutePath;
use crate::router::{Method, Request};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::{self, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Header carrying the model description on HEAD responses (which have no body).
pub const MODEL_DESCRIPTION_HEADER: &str = "x-model-description";

/// Query string to the abstract query object. `where` (and array-form `order`) are JSON text.
fn query_to_value(params: HashMap<String, String>) -> Result<Option<Value>, AppError> {
    if params.is_empty() {
        return Ok(None);
    }
    let mut obj = Map::new();
    for (k, v) in params {
        let value = match k.as_str() {
            "where" => serde_json::from_str(&v).map_err(|e| AppError::InvalidQuery(format!("where: {}", e)))?,
            "order" if v.trim_start().starts_with('[') => {
                serde_json::from_str(&v).map_err(|e| AppError::InvalidQuery(format!("order: {}", e)))?
            }
            _ => Value::String(v),
        };
        obj.insert(k, value);
    }
    Ok(Some(Value::Object(obj)))
}

/// A query string axum could not decode is reported like any other bad query.
fn query_params<T>(extracted: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    extracted
        .map(|Query(params)| params)
        .map_err(|e| AppError::InvalidQuery(e.body_text()))
}

fn body_to_value(body: &Bytes) -> Result<Option<Value>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| AppError::BadRequest(format!("invalid JSON body: {}", e)))
}

fn build_request(method: &http::Method, uri: &Uri, params: HashMap<String, String>, body: &Bytes) -> Result<Request, AppError> {
    let method: Method = method.as_str().parse().map_err(|_| AppError::MethodNotAllowed {
        method: method.to_string(),
        path: uri.path().to_string(),
    })?;
    Ok(Request {
        method,
        path: uri.path().to_string(),
        query: query_to_value(params)?,
        body: body_to_value(body)?,
    })
}

fn status_for(envelope: &Envelope, request: &Request, endpoint: &str) -> StatusCode {
    match envelope.error_code() {
        Some(code) => status_for_code(code),
        None => {
            let collection = RoutePath::parse(endpoint, &request.path).is_ok_and(|p| p.id.is_none());
            if request.method == Method::Post && collection {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            }
        }
    }
}

/// Catch-all handler for every path under the router's endpoint.
pub async fn restful(
    State(state): State<AppState>,
    method: http::Method,
    uri: Uri,
    params: Result<Query<HashMap<String, String>>, QueryRejection>,
    body: Bytes,
) -> Response {
    let router = &state.router;
    if !router.is_restful_request(uri.path()) {
        return AppError::Routing(uri.path().to_string()).into_response();
    }
    let request = match query_params(params).and_then(|params| build_request(&method, &uri, params, &body)) {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };
    let envelope = router.handle_request(&request).await;
    let status = status_for(&envelope, &request, router.endpoint());

    let mut headers = HeaderMap::new();
    if request.method == Method::Head && envelope.is_success() {
        if let Ok(v) = HeaderValue::from_str(&envelope.data.to_string()) {
            headers.insert(MODEL_DESCRIPTION_HEADER, v);
        }
    }
    (status, headers, Json(envelope)).into_response()
}
