use restful_models::handlers::MODEL_DESCRIPTION_HEADER;
use restful_models::router::{Method, Request};
use restful_models::{
    from_json_str, resolve, restful_routes, AppState, Envelope, InMemoryProvider, Router, RouterOptions,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const MODELS: &str = r#"{
    "models": [
        {"name": "Photographer", "attributes": [{"name": "name", "type": "string"}]},
        {
            "name": "Photo",
            "attributes": [{"name": "name", "type": "string"}],
            "associations": [{"kind": "belongs_to", "target": "Photographer"}]
        }
    ]
}"#;

fn router_with(options: RouterOptions) -> Router {
    let registry = resolve(&from_json_str(MODELS).unwrap()).unwrap();
    Router::new(Arc::new(InMemoryProvider::new(registry)), options)
}

fn router() -> Router {
    router_with(RouterOptions::default())
}

async fn call(router: &Router, request: Request) -> Envelope {
    let env = router.handle_request(&request).await;
    assert!(env.is_success(), "{} {} failed: {:?}", request.method, request.path, env.data);
    env
}

async fn create_photo(router: &Router, name: &str) -> Value {
    call(router, Request::new(Method::Post, "/api/Photos").with_body(json!({"name": name})))
        .await
        .data
}

async fn create_photographer(router: &Router, name: &str) -> Value {
    call(router, Request::new(Method::Post, "/api/Photographers").with_body(json!({"name": name})))
        .await
        .data
}

fn rows(env: &Envelope) -> &Vec<Value> {
    env.data.as_array().expect("data is an array")
}

#[test]
fn recognises_restful_paths() {
    let r = router();
    assert!(r.is_restful_request("/api/Photos"));
    assert!(r.is_restful_request("/api/Photos/1/Photographer"));
    assert!(!r.is_restful_request("/api"));
    assert!(!r.is_restful_request("/fnord/Photos"));

    let r = router_with(RouterOptions::with_endpoint("/fnord"));
    assert!(r.is_restful_request("/fnord/Photos"));
    assert!(!r.is_restful_request("/api/Photos"));
}

#[tokio::test]
async fn list_is_empty_then_grows() {
    let r = router();
    let env = call(&r, Request::new(Method::Get, "/api/Photos")).await;
    assert!(rows(&env).is_empty());
    assert!(env.count.is_none());

    create_photo(&r, "first").await;
    let env = call(&r, Request::new(Method::Get, "/api/Photos")).await;
    assert_eq!(rows(&env).len(), 1);
    assert_eq!(rows(&env)[0]["name"], "first");
}

#[tokio::test]
async fn list_filters_and_orders() {
    let r = router();
    for name in ["c", "a", "d", "b"] {
        create_photo(&r, name).await;
    }
    let env = call(
        &r,
        Request::new(Method::Get, "/api/Photos").with_query(json!({"where": {"name": "d"}})),
    )
    .await;
    assert_eq!(rows(&env).len(), 1);
    assert_eq!(rows(&env)[0]["name"], "d");

    let env = call(
        &r,
        Request::new(Method::Get, "/api/Photos")
            .with_query(json!({"where": {"name": ["a", "b", "c"]}, "order": "name ASC"})),
    )
    .await;
    let names: Vec<&str> = rows(&env).iter().filter_map(|p| p["name"].as_str()).collect();
    assert_eq!(names, ["a", "b", "c"]);
}

#[tokio::test]
async fn windowed_list_reports_total_count() {
    let r = router();
    for i in 1..=8 {
        create_photo(&r, &format!("phototest{}", i)).await;
    }
    create_photo(&r, "unrelated").await;

    let env = call(
        &r,
        Request::new(Method::Get, "/api/Photos").with_query(json!({
            "where": {"name": {"$like": "phototest%"}},
            "order": "id ASC",
            "offset": 3,
            "limit": 3
        })),
    )
    .await;
    assert_eq!(env.count, Some(8));
    assert_eq!(env.offset, Some(3));
    assert_eq!(env.limit, Some(3));
    let names: Vec<&str> = rows(&env).iter().filter_map(|p| p["name"].as_str()).collect();
    assert_eq!(names, ["phototest4", "phototest5", "phototest6"]);
}

#[tokio::test]
async fn create_read_update_delete() {
    let r = router();
    let before = rows(&call(&r, Request::new(Method::Get, "/api/Photos")).await).len();
    let created = create_photo(&r, "sunset").await;
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["name"], "sunset");
    assert!(created["createdAt"].is_string());
    assert_eq!(rows(&call(&r, Request::new(Method::Get, "/api/Photos")).await).len(), before + 1);

    let path = format!("/api/Photos/{}", id);
    let got = call(&r, Request::new(Method::Get, path.clone())).await;
    assert_eq!(got.data["name"], "sunset");

    call(&r, Request::new(Method::Put, path.clone()).with_body(json!({"name": "dusk"}))).await;
    assert_eq!(call(&r, Request::new(Method::Get, path.clone())).await.data["name"], "dusk");

    call(&r, Request::new(Method::Patch, path.clone()).with_body(json!({"name": "dawn"}))).await;
    assert_eq!(call(&r, Request::new(Method::Get, path.clone())).await.data["name"], "dawn");

    let deleted = call(&r, Request::new(Method::Delete, path.clone())).await;
    assert!(deleted.data.is_null());
    assert_eq!(rows(&call(&r, Request::new(Method::Get, "/api/Photos")).await).len(), before);

    let missing = r.handle_request(&Request::new(Method::Get, path)).await;
    assert_eq!(missing.error_code(), Some("not_found"));
}

#[tokio::test]
async fn head_describes_attributes_in_order() {
    let r = router();
    let env = call(&r, Request::new(Method::Head, "/api/Photos")).await;
    assert_eq!(env.data["name"], "Photo");
    let names: Vec<&str> = env.data["attributes"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|a| a["name"].as_str())
        .collect();
    assert_eq!(names, ["id", "name", "createdAt", "updatedAt", "PhotographerId"]);
    assert_eq!(env.data["attributes"][0]["primaryKey"], true);
}

#[tokio::test]
async fn belongs_to_get_and_clear() {
    let r = router();
    let photographer = create_photographer(&r, "Ansel").await;
    let pid = photographer["id"].clone();
    let photo = call(
        &r,
        Request::new(Method::Post, "/api/Photos").with_body(json!({"name": "dunes", "PhotographerId": pid})),
    )
    .await
    .data;
    let path = format!("/api/Photos/{}/Photographer", photo["id"]);

    let env = call(&r, Request::new(Method::Get, path.clone())).await;
    let mut keys: Vec<&String> = env.data.as_object().unwrap().keys().collect();
    keys.sort();
    assert_eq!(keys, ["createdAt", "id", "name", "updatedAt"]);
    assert_eq!(env.data["name"], "Ansel");

    call(&r, Request::new(Method::Delete, path.clone())).await;
    let env = call(&r, Request::new(Method::Get, path)).await;
    assert!(env.data.is_null());
    let photo = call(&r, Request::new(Method::Get, format!("/api/Photos/{}", photo["id"]))).await;
    assert!(photo.data["PhotographerId"].is_null());
    // the photographer row survives
    call(&r, Request::new(Method::Get, format!("/api/Photographers/{}", pid))).await;
}

#[tokio::test]
async fn has_many_get_and_clear_one() {
    let r = router();
    let photographer = create_photographer(&r, "Vivian").await;
    let pid = photographer["id"].clone();
    let mut ids = Vec::new();
    for name in ["street", "mirror"] {
        let p = call(
            &r,
            Request::new(Method::Post, "/api/Photos").with_body(json!({"name": name, "PhotographerId": pid})),
        )
        .await
        .data;
        ids.push(p["id"].clone());
    }
    let path = format!("/api/Photographers/{}/Photos", pid);
    assert_eq!(rows(&call(&r, Request::new(Method::Get, path.clone())).await).len(), 2);

    call(&r, Request::new(Method::Delete, format!("{}/{}", path, ids[0]))).await;
    let remaining = call(&r, Request::new(Method::Get, path.clone())).await;
    assert_eq!(rows(&remaining).len(), 1);
    assert_eq!(rows(&remaining)[0]["id"], ids[1]);
}

#[tokio::test]
async fn clearing_an_unrelated_id_changes_nothing() {
    let r = router();
    let a = create_photographer(&r, "A").await;
    let b = create_photographer(&r, "B").await;
    let photo = call(
        &r,
        Request::new(Method::Post, "/api/Photos").with_body(json!({"name": "x", "PhotographerId": a["id"]})),
    )
    .await
    .data;
    let env = call(
        &r,
        Request::new(Method::Delete, format!("/api/Photos/{}/Photographer/{}", photo["id"], b["id"])),
    )
    .await;
    assert!(env.data.is_null());
    let photo = call(&r, Request::new(Method::Get, format!("/api/Photos/{}", photo["id"]))).await;
    assert_eq!(photo.data["PhotographerId"], a["id"]);
}

#[tokio::test]
async fn set_association_by_id() {
    let r = router();
    let photographer = create_photographer(&r, "Dorothea").await;
    let photo = create_photo(&r, "migrant").await;
    let env = call(
        &r,
        Request::new(
            Method::Put,
            format!("/api/Photos/{}/Photographer/{}", photo["id"], photographer["id"]),
        ),
    )
    .await;
    assert_eq!(env.data["PhotographerId"], photographer["id"]);

    let other = create_photo(&r, "harvest").await;
    call(
        &r,
        Request::new(
            Method::Post,
            format!("/api/Photographers/{}/Photos/{}", photographer["id"], other["id"]),
        ),
    )
    .await;
    let env = call(&r, Request::new(Method::Get, format!("/api/Photographers/{}/Photos", photographer["id"]))).await;
    assert_eq!(rows(&env).len(), 2);
}

#[tokio::test]
async fn unknown_association_is_not_found() {
    let r = router();
    let photo = create_photo(&r, "x").await;
    let env = r
        .handle_request(&Request::new(Method::Get, format!("/api/Photos/{}/Albums", photo["id"])))
        .await;
    assert_eq!(env.error_code(), Some("not_found"));
}

#[tokio::test]
async fn uuid_keyed_model_round_trip() {
    let config = from_json_str(
        r#"{"models": [{"name": "Tag", "primary_key_type": "uuid", "attributes": [{"name": "label", "type": "string"}]}]}"#,
    )
    .unwrap();
    let r = Router::new(
        Arc::new(InMemoryProvider::new(resolve(&config).unwrap())),
        RouterOptions::default(),
    );
    let created = call(&r, Request::new(Method::Post, "/api/Tags").with_body(json!({"label": "bw"}))).await.data;
    let id = created["id"].as_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&id).is_ok());

    let path = format!("/api/Tags/{}", id);
    assert_eq!(call(&r, Request::new(Method::Get, path.clone())).await.data["label"], "bw");
    call(&r, Request::new(Method::Put, path.clone()).with_body(json!({"label": "colour"}))).await;
    assert_eq!(call(&r, Request::new(Method::Get, path.clone())).await.data["label"], "colour");
    call(&r, Request::new(Method::Delete, path.clone())).await;

    let gone = r.handle_request(&Request::new(Method::Get, path)).await;
    assert_eq!(gone.error_code(), Some("not_found"));
    let bad = r.handle_request(&Request::new(Method::Get, "/api/Tags/not-a-uuid")).await;
    assert_eq!(bad.error_code(), Some("bad_request"));
}

#[tokio::test]
async fn dispatch_invokes_callback_once() {
    let r = Arc::new(router());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    r.dispatch(Request::new(Method::Get, "/api/Photos"), move |env| {
        let _ = tx.send(env);
    })
    .await
    .unwrap();
    let env = rx.recv().await.unwrap();
    assert!(env.is_success());
    assert!(rx.recv().await.is_none());
}

mod http {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request as HttpRequest, StatusCode};

    async fn send(app: axum::Router, req: HttpRequest<Body>) -> (StatusCode, Value) {
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, body)
    }

    fn app() -> axum::Router {
        restful_routes(AppState::new(router()))
    }

    #[tokio::test]
    async fn post_then_query_over_http() {
        let app = app();
        let req = HttpRequest::post("/api/Photos")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name":"phototest1"}"#))
            .unwrap();
        let (status, body) = send(app.clone(), req).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "success");

        let uri = "/api/Photos?where=%7B%22name%22%3A%7B%22%24like%22%3A%22photo%25%22%7D%7D&limit=10";
        let (status, body) = send(app, HttpRequest::get(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["offset"], 0);
        assert_eq!(body["data"][0]["name"], "phototest1");
    }

    #[tokio::test]
    async fn errors_map_to_status_codes() {
        let app = app();
        let (status, body) = send(app.clone(), HttpRequest::get("/api/Cats").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");

        let (status, _) = send(app.clone(), HttpRequest::get("/api/Photos/abc").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(app.clone(), HttpRequest::delete("/api/Photos").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let (status, _) = send(app, HttpRequest::get("/elsewhere").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn head_carries_description_header() {
        let req = HttpRequest::head("/api/Photos").body(Body::empty()).unwrap();
        let res = app().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let header = res.headers().get(MODEL_DESCRIPTION_HEADER).unwrap().to_str().unwrap();
        let described: Value = serde_json::from_str(header).unwrap();
        assert_eq!(described["tableName"], "Photos");
    }
}
