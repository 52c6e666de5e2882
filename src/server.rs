//! HTTP routes over the worker pool
//!
//! Handlers parse their parameters, hand a job to the [`WorkerPool`] and turn
//! the result into a response. No handler touches a file handle itself.

use crate::container::DataSource;
use crate::engine::{Engine, CONCENTRATION_VAR, TIME_VAR, Z_DIM};
use crate::errors::{ErrorKind, NcJsonError, Result};
use crate::parallel::WorkerPool;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Shared state: the pool of engines all handlers dispatch to
pub type SharedPool<S> = Arc<WorkerPool<Engine<S>>>;

type Params = HashMap<String, String>;

#[derive(Debug, Deserialize)]
struct VariableQuery {
    /// Comma-separated index prefix
    indices: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Build the router for a pool of engines.
pub fn router<S: DataSource + 'static>(pool: SharedPool<S>) -> Router {
    Router::new()
        .route("/get-info", get(get_info::<S>))
        .route("/get-data", get(get_data::<S>))
        .route("/get-image-inputs", get(get_image_inputs::<S>))
        .route("/variables/:name", get(get_variable::<S>))
        .with_state(pool)
}

/// GET /get-info
async fn get_info<S: DataSource + 'static>(State(pool): State<SharedPool<S>>) -> Response {
    debug!("get-info request");
    respond(pool.run(|engine| engine.metadata()).await)
}

/// GET /get-data?time_index=&z_index=
async fn get_data<S: DataSource + 'static>(
    State(pool): State<SharedPool<S>>,
    Query(params): Query<Params>,
) -> Response {
    let (time_index, z_index) = match time_and_z(&params) {
        Ok(indices) => indices,
        Err(e) => return error_response(e),
    };
    debug!(time_index, z_index, "get-data request");

    respond(
        pool.run(move |engine| {
            // Validate before reading so bad indices become 400s, not read errors.
            engine.validate_dimension_index(TIME_VAR, time_index)?;
            engine.validate_dimension_index(Z_DIM, z_index)?;
            engine.data(CONCENTRATION_VAR, &[time_index, z_index])
        })
        .await,
    )
}

/// GET /get-image-inputs?time_index=&z_index=
async fn get_image_inputs<S: DataSource + 'static>(
    State(pool): State<SharedPool<S>>,
    Query(params): Query<Params>,
) -> Response {
    let (time_index, z_index) = match time_and_z(&params) {
        Ok(indices) => indices,
        Err(e) => return error_response(e),
    };
    respond(
        pool.run(move |engine| engine.image_inputs(time_index, z_index).map(|i| i.to_json()))
            .await,
    )
}

/// GET /variables/:name?indices=a,b,...
async fn get_variable<S: DataSource + 'static>(
    State(pool): State<SharedPool<S>>,
    Path(name): Path<String>,
    Query(query): Query<VariableQuery>,
) -> Response {
    let prefix = match query.indices.as_deref() {
        Some(raw) => match parse_index_list("indices", raw) {
            Ok(prefix) => prefix,
            Err(e) => return error_response(e),
        },
        None => Vec::new(),
    };
    debug!(variable = %name, ?prefix, "variable data request");
    respond(pool.run(move |engine| engine.data(&name, &prefix)).await)
}

fn time_and_z(params: &Params) -> Result<(usize, usize)> {
    Ok((
        required_index(params, "time_index")?,
        required_index(params, "z_index")?,
    ))
}

/// Read a required non-negative integer query parameter.
pub fn required_index(params: &Params, name: &str) -> Result<usize> {
    let raw = params
        .get(name)
        .ok_or_else(|| NcJsonError::invalid_argument(format!("Missing required argument {}", name)))?;
    parse_index(name, raw)
}

/// Parse one index value, rejecting negatives and garbage.
pub fn parse_index(name: &str, raw: &str) -> Result<usize> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|e| NcJsonError::invalid_argument(format!("Invalid argument {}: {}", name, e)))?;
    if value < 0 {
        return Err(NcJsonError::invalid_argument(format!(
            "Invalid argument {}: Negative values not allowed",
            name
        )));
    }
    usize::try_from(value)
        .map_err(|e| NcJsonError::invalid_argument(format!("Invalid argument {}: {}", name, e)))
}

/// Parse a comma-separated list of indices; an empty string is an empty list.
pub fn parse_index_list(name: &str, raw: &str) -> Result<Vec<usize>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',').map(|part| parse_index(name, part)).collect()
}

fn respond(result: Result<JsonValue>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Render an error as `{"error": "<message>"}` with a status matching its kind.
pub fn error_response(err: NcJsonError) -> Response {
    let status = match err.kind() {
        ErrorKind::Client => {
            warn!(error = %err, "Rejected request");
            StatusCode::BAD_REQUEST
        }
        ErrorKind::Unsupported => {
            warn!(error = %err, "Request hit an unsupported type");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        ErrorKind::Fatal => {
            error!(error = %err, "Request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ErrorBody { error: err.to_string() })).into_response()
}
