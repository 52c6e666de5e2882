//! Unit tests for ncjson against in-memory containers
//!
//! These cover the request surface end to end (router, worker pool, engine)
//! without touching libnetcdf.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use ncjson::handles::Opener;
use ncjson::prelude::*;
use ncjson::server::router;
use serde_json::{json, Value as JsonValue};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

/// time=3 (unlimited), z=2, y=4, x=5 with concentration[t, z, y, x] = flat index.
fn plume_source() -> MemorySource {
    let mut source = MemorySource::new(FormatMode::Modern);
    source.add_unlimited_dimension("time", 3);
    source.add_dimension("z", 2);
    source.add_dimension("y", 4);
    source.add_dimension("x", 5);
    source.add_attribute(Attribute::text("title", "Plume run"));
    source.add_attribute(Attribute::double("version", 2.0));

    source
        .add_variable("time", &["time"], TypedBuffer::from_slice(&[0.0f64, 60.0, 120.0]))
        .expect("Failed to add time");
    source
        .add_variable("x", &["x"], TypedBuffer::from_slice(&[0i32, 10, 20, 30, 40]))
        .expect("Failed to add x");
    source
        .add_variable("y", &["y"], TypedBuffer::from_slice(&[0i32, 10, 20, 30]))
        .expect("Failed to add y");

    let field: Vec<f32> = (0..120).map(|i| i as f32).collect();
    source
        .add_variable("concentration", &["time", "z", "y", "x"], TypedBuffer::from_slice(&field))
        .expect("Failed to add concentration")
        .add_attribute(Attribute::text("units", "kg m-3"))
        .add_attribute(Attribute::text("long_name", "tracer concentration"));
    source
}

fn app(workers: usize) -> axum::Router {
    let source = plume_source();
    let pool = WorkerPool::for_engines(&WorkerConfig::with_workers(workers), "memory", move |_: &Path| {
        Ok(source.clone())
    })
    .expect("Failed to start pool");
    router(Arc::new(pool))
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, JsonValue) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).expect("Body is not JSON"))
}

#[test]
fn test_metadata_key_order() {
    let engine = Engine::new(plume_source());
    let info = engine.metadata().unwrap();

    let sections: Vec<&String> = info.as_object().unwrap().keys().collect();
    assert_eq!(sections, ["dimensions", "variables", "attributes"]);

    let dims: Vec<&String> = info["dimensions"].as_object().unwrap().keys().collect();
    assert_eq!(dims, ["x", "y", "z", "time"]);

    let vars: Vec<&String> = info["variables"].as_object().unwrap().keys().collect();
    assert_eq!(vars, ["concentration", "y", "x", "time"]);

    let globals: Vec<&String> = info["attributes"].as_object().unwrap().keys().collect();
    assert_eq!(globals, ["version", "title"]);

    // A variable's own attributes keep declaration order.
    let attrs: Vec<&String> = info["variables"]["concentration"]["attributes"]
        .as_object()
        .unwrap()
        .keys()
        .collect();
    assert_eq!(attrs, ["units", "long_name"]);
    assert_eq!(
        info["variables"]["concentration"]["dimensions"],
        json!(["time", "z", "y", "x"])
    );
}

#[test]
fn test_data_shape_follows_remaining_dimensions() {
    let engine = Engine::new(plume_source());

    let full = engine.data("concentration", &[]).unwrap();
    assert_eq!(full.as_array().unwrap().len(), 3);
    assert_eq!(full[2][1][3][4], json!(119.0));

    let plane = engine.data("concentration", &[1]).unwrap();
    assert_eq!(plane.as_array().unwrap().len(), 2);
    assert_eq!(plane[0][0], json!([40.0, 41.0, 42.0, 43.0, 44.0]));

    let row = engine.data("concentration", &[1, 0, 2]).unwrap();
    assert_eq!(row, json!([50.0, 51.0, 52.0, 53.0, 54.0]));

    let scalar = engine.data("concentration", &[1, 0, 2, 3]).unwrap();
    assert_eq!(scalar, json!(53.0));
}

#[test]
fn test_out_of_range_index_is_client_error() {
    let engine = Engine::new(plume_source());
    let prefixes: [&[usize]; 4] = [&[3], &[0, 2], &[0, 0, 4], &[0, 0, 0, 5]];
    for prefix in prefixes {
        let err = engine.data("concentration", prefix).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Client, "prefix {:?}", prefix);
    }
}

#[test]
fn test_handle_cache_reuses_handle() {
    let opener: Opener<MemorySource> = Arc::new(|_: &Path| Ok(plume_source()));
    let mut cache = HandleCache::new("memory", opener);
    let first = cache.get_instance_for_current_thread().unwrap() as *const MemorySource;
    let second = cache.get_instance_for_current_thread().unwrap() as *const MemorySource;
    assert_eq!(first, second);
    assert_eq!(cache.opens(), 1);
}

#[tokio::test]
async fn test_get_info_route() {
    let (status, body) = get(app(2), "/get-info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dimensions"]["time"], json!("<unlimited>"));
    assert_eq!(body["dimensions"]["x"], json!(5));
    assert_eq!(body["attributes"]["title"], json!("Plume run"));
    assert_eq!(body["attributes"]["version"], json!(2.0));
}

#[tokio::test]
async fn test_get_data_route() {
    let (status, body) = get(app(2), "/get-data?time_index=1&z_index=0").await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0], json!([40.0, 41.0, 42.0, 43.0, 44.0]));
    assert_eq!(rows[3], json!([55.0, 56.0, 57.0, 58.0, 59.0]));
}

#[tokio::test]
async fn test_get_data_rejects_bad_parameters() {
    let (status, body) = get(app(1), "/get-data?time_index=1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Missing required argument z_index" }));

    let (status, body) = get(app(1), "/get-data?time_index=-1&z_index=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        json!("Invalid argument time_index: Negative values not allowed")
    );

    let (status, body) = get(app(1), "/get-data?time_index=abc&z_index=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid argument time_index: "));

    let (status, body) = get(app(1), "/get-data?time_index=0&z_index=2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("'z'"));
}

#[tokio::test]
async fn test_variable_route() {
    let (status, body) = get(app(2), "/variables/x").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([0, 10, 20, 30, 40]));

    let (status, body) = get(app(2), "/variables/x?indices=3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(30));

    let (status, body) = get(app(2), "/variables/concentration?indices=2,1,3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([115.0, 116.0, 117.0, 118.0, 119.0]));

    let (status, body) = get(app(2), "/variables/missing").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Variable 'missing' not found" }));

    let (status, _) = get(app(2), "/variables/time?indices=0,0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_image_inputs_route() {
    let (status, body) = get(app(2), "/get-image-inputs?time_index=2&z_index=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["time"], json!([0.0, 60.0, 120.0]));
    assert_eq!(body["x"], json!([0.0, 10.0, 20.0, 30.0, 40.0]));
    assert_eq!(body["y"], json!([0.0, 10.0, 20.0, 30.0]));
    let rows = body["concentration"].as_array().unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0][0], json!(100.0));
    assert_eq!(rows[3][4], json!(119.0));
}

#[tokio::test]
async fn test_failed_open_is_reported_per_request() {
    let pool = WorkerPool::for_engines(&WorkerConfig::with_workers(1), "gone.nc", |path: &Path| {
        Err::<MemorySource, _>(NcJsonError::NetCDF {
            status: -51,
            message: format!("{}: Unknown file format", path.display()),
        })
    })
    .expect("Failed to start pool");
    let (status, body) = get(router(Arc::new(pool)), "/get-info").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("gone.nc"));
}
