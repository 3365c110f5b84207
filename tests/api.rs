//! End-to-end tests for the layer API, run against the full router over
//! the in-memory store.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use tinymap::handler::{AppState, router};
use tinymap::repo::FeatureRepository;
use tinymap::store::MemoryStore;

const KEY_REJECTION_MESSAGE: &str = "This key is not valid for this layer.";

fn app() -> Router {
    let repo = FeatureRepository::new(Arc::new(MemoryStore::default()));
    router(AppState { repo })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let request = match body {
        Some(value) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn point(lng: i64, lat: i64) -> Value {
    json!({
        "type": "Feature",
        "geometry": {"type": "Point", "coordinates": [lng, lat]},
    })
}

#[tokio::test]
async fn health_returns_ok() {
    let app = app();
    let (status, body) = send_json(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn landing_page_is_served() {
    let app = app();
    let (status, bytes) = send(&app, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8_lossy(&bytes).contains("tinymap"));
}

#[tokio::test]
async fn create_then_list_round_trips_the_feature() {
    let app = app();

    let mut body = point(1, 2);
    body["name"] = json!("fountain");
    let (status, created) = send_json(&app, "POST", "/layer/parks", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["layer"], "parks");
    assert_eq!(created["name"], "fountain");
    assert!(created["id"].is_i64());
    assert!(created.get("ownerKey").is_none());

    let (status, listed) = send_json(&app, "GET", "/layer/parks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["type"], "FeatureCollection");
    let features = listed["features"].as_array().unwrap();
    assert_eq!(features.len(), 1);
    assert_eq!(features[0]["id"], created["id"]);
    assert_eq!(features[0]["name"], "fountain");
    assert!(features[0].get("ownerKey").is_none());
}

#[tokio::test]
async fn first_keyed_write_binds_the_layer() {
    let app = app();

    let (status, _) = send_json(&app, "POST", "/layer/parks?key=abc", Some(point(1, 2))).await;
    assert_eq!(status, StatusCode::OK);

    // A different key is rejected with the fixed message.
    let (status, body) = send_json(&app, "POST", "/layer/parks?key=xyz", Some(point(3, 4))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], KEY_REJECTION_MESSAGE);

    // The binding key keeps working.
    let (status, _) = send_json(&app, "POST", "/layer/parks?key=abc", Some(point(3, 4))).await;
    assert_eq!(status, StatusCode::OK);

    // Other layers are unaffected.
    let (status, _) = send_json(&app, "POST", "/layer/rivers?key=xyz", Some(point(5, 6))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unkeyed_writes_pass_on_a_keyed_layer() {
    // The ownership model only blocks mismatched keys; a write without a
    // key goes through even when the layer is keyed.
    let app = app();

    let (status, created) = send_json(&app, "POST", "/layer/parks?key=abc", Some(point(1, 2))).await;
    assert_eq!(status, StatusCode::OK);
    let id = created["id"].as_i64().unwrap();

    let (status, _) = send_json(&app, "POST", "/layer/parks", Some(point(3, 4))).await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/layer/parks/{}", id);
    let (status, ack) = send_json(&app, "PUT", &uri, Some(point(9, 9))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["affected"], 1);

    // An empty key is treated as absent.
    let (status, _) = send_json(&app, "POST", "/layer/parks?key=", Some(point(5, 6))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn update_replaces_the_document_and_drops_its_owner_key() {
    let app = app();

    let (_, created) = send_json(&app, "POST", "/layer/parks?key=abc", Some(point(1, 2))).await;
    let id = created["id"].as_i64().unwrap();

    let uri = format!("/layer/parks/{}?key=abc", id);
    let (status, _) = send_json(&app, "PUT", &uri, Some(point(7, 8))).await;
    assert_eq!(status, StatusCode::OK);

    // The replaced document no longer carries a key, so a different key
    // may now bind the layer.
    let (status, _) = send_json(&app, "POST", "/layer/parks?key=xyz", Some(point(3, 4))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn put_restamps_the_path_layer_over_the_body() {
    let app = app();

    let (_, created) = send_json(&app, "POST", "/layer/parks", Some(point(1, 2))).await;
    let id = created["id"].as_i64().unwrap();

    let mut body = point(1, 2);
    body["layer"] = json!("lakes");
    let uri = format!("/layer/rivers/{}", id);
    let (status, _) = send_json(&app, "PUT", &uri, Some(body)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, fetched) = send_json(&app, "GET", &format!("/layer/anything/{}", id), None).await;
    assert_eq!(fetched["layer"], "rivers");

    let (_, parks) = send_json(&app, "GET", "/layer/parks", None).await;
    assert_eq!(parks["features"].as_array().unwrap().len(), 0);
    let (_, rivers) = send_json(&app, "GET", "/layer/rivers", None).await;
    assert_eq!(rivers["features"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn delete_is_guarded_and_acknowledged() {
    let app = app();

    let (_, created) = send_json(&app, "POST", "/layer/parks?key=abc", Some(point(1, 2))).await;
    let id = created["id"].as_i64().unwrap();

    let (status, body) =
        send_json(&app, "DELETE", &format!("/layer/parks/{}?key=xyz", id), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], KEY_REJECTION_MESSAGE);

    let (status, ack) =
        send_json(&app, "DELETE", &format!("/layer/parks/{}?key=abc", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["affected"], 1);

    let (status, _) = send_json(&app, "GET", &format!("/layer/parks/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_ids_surface_as_not_found() {
    let app = app();

    let (status, _) = send_json(&app, "GET", "/layer/parks/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(&app, "PUT", "/layer/parks/42", Some(point(1, 2))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(&app, "DELETE", "/layer/parks/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn id_lookup_ignores_the_layer_segment() {
    let app = app();

    let (_, created) = send_json(&app, "POST", "/layer/parks", Some(point(1, 2))).await;
    let id = created["id"].as_i64().unwrap();

    let (status, fetched) = send_json(&app, "GET", &format!("/layer/rivers/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["layer"], "parks");
}

#[tokio::test]
async fn csv_export_takes_every_record_but_geojson_filters_by_type() {
    let app = app();

    send_json(&app, "POST", "/layer/spots?key=abc", Some(point(1, 2))).await;
    // Not typed "Feature": excluded from GeoJSON, included in CSV.
    let untyped = json!({"geometry": {"coordinates": [3, 4]}});
    send_json(&app, "POST", "/layer/spots", Some(untyped)).await;

    let (status, bytes) = send(&app, "GET", "/layer/spots.csv", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8_lossy(&bytes), "lng,lat\n1,2\n3,4\n");

    let (_, geojson) = send_json(&app, "GET", "/layer/spots", None).await;
    assert_eq!(geojson["features"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn csv_content_type_is_text_csv() {
    let app = app();
    send_json(&app, "POST", "/layer/spots", Some(point(1, 2))).await;

    let request = Request::builder()
        .method("GET")
        .uri("/layer/spots.csv")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/csv"
    );
}

#[tokio::test]
async fn csv_export_of_malformed_geometry_fails_the_request() {
    let app = app();

    send_json(&app, "POST", "/layer/spots", Some(point(1, 2))).await;
    let (_, broken) = send_json(
        &app,
        "POST",
        "/layer/spots",
        Some(json!({"type": "Feature"})),
    )
    .await;
    let broken_id = broken["id"].as_i64().unwrap();

    let (status, body) = send_json(&app, "GET", "/layer/spots.csv", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains(&broken_id.to_string())
    );
}

#[tokio::test]
async fn format_suffixes_other_than_csv_fall_back_to_geojson() {
    let app = app();
    send_json(&app, "POST", "/layer/parks", Some(point(1, 2))).await;

    for uri in ["/layer/parks.geojson", "/layer/parks.kml"] {
        let (status, body) = send_json(&app, "GET", uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "FeatureCollection");
        assert_eq!(body["features"].as_array().unwrap().len(), 1);
    }
}

#[tokio::test]
async fn empty_layer_lists_cleanly_in_both_formats() {
    let app = app();

    let (status, body) = send_json(&app, "GET", "/layer/empty", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["features"].as_array().unwrap().len(), 0);

    let (status, bytes) = send(&app, "GET", "/layer/empty.csv", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8_lossy(&bytes), "lng,lat\n");
}

#[tokio::test]
async fn racing_unkeyed_creates_both_land() {
    // The guard is check-then-act with no locking across requests, so two
    // keyless creates on a fresh layer both succeed and the layer stays
    // unkeyed, open to whichever key arrives next. Accepted behavior, not
    // a bug.
    let app = app();

    let (status, _) = send_json(&app, "POST", "/layer/fresh", Some(point(1, 2))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_json(&app, "POST", "/layer/fresh", Some(point(3, 4))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_json(&app, "POST", "/layer/fresh?key=late", Some(point(5, 6))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn body_supplied_reserved_fields_are_discarded() {
    let app = app();

    let mut body = point(1, 2);
    body["layer"] = json!("smuggled");
    body["ownerKey"] = json!("smuggled");
    body["id"] = json!(999);

    let (status, created) = send_json(&app, "POST", "/layer/parks", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["layer"], "parks");
    assert_eq!(created["id"], 1);
    assert!(created.get("ownerKey").is_none());
}
