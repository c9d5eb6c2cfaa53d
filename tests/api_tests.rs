//! HTTP API tests
//!
//! Drives the full router in-process: envelope shape, status codes, the
//! auth extractor, and a multipart upload followed by a download.

mod common;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::TestApp;
use peernova::create_router;

const BOUNDARY: &str = "peernova-test-boundary";

struct Api {
    app: TestApp,
    router: Router,
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    bytes: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or(Value::Null)
    }
}

impl Api {
    fn new() -> Self {
        let app = TestApp::new();
        let router = create_router(app.state.clone());
        Self { app, router }
    }

    async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        Reply { status, headers, bytes }
    }

    async fn json(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Reply {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::HOST, "localhost:5000");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    async fn signup(&self, name: &str) -> String {
        let reply = self
            .json(
                Method::POST,
                "/api/auth/signup",
                None,
                Some(json!({
                    "name": name,
                    "email": format!("{}@campus.edu", name.to_lowercase()),
                    "password": "secret123",
                    "confirmPassword": "secret123"
                })),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED);
        reply.json()["data"]["token"].as_str().unwrap().to_string()
    }
}

fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, file_name, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn multipart_request(uri: &str, token: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::HOST, "localhost:5000")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

// ===== Basics =====

#[tokio::test]
async fn test_health_and_unknown_route() {
    let api = Api::new();

    let health = api.json(Method::GET, "/api/health", None, None).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.json()["success"], true);
    assert_eq!(health.json()["data"]["status"], "ok");

    let missing = api.json(Method::GET, "/api/nope", None, None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.json()["success"], false);
    assert_eq!(missing.json()["message"], "Route not found");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let api = Api::new();

    let reply = api.json(Method::GET, "/api/study-groups", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json()["message"], "No token provided, authorization denied");

    let reply = api.json(Method::GET, "/api/profile", Some("garbage"), None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json()["message"], "Token is not valid");
}

// ===== Auth =====

#[tokio::test]
async fn test_signup_login_and_duplicate() {
    let api = Api::new();
    api.signup("Ada").await;

    let login = api
        .json(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ada@campus.edu", "password": "secret123" })),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    let body = login.json();
    assert!(body["data"]["token"].is_string());
    assert_eq!(body["data"]["user"]["name"], "Ada");
    assert!(body["data"]["user"].get("passwordHash").is_none());

    let duplicate = api
        .json(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({
                "name": "Ada Again",
                "email": "ADA@campus.edu",
                "password": "secret123",
                "confirmPassword": "secret123"
            })),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
    assert_eq!(duplicate.json()["message"], "Email already registered");
    assert_eq!(duplicate.json()["errors"], json!(["Duplicate entry"]));
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let api = Api::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let reply = api.send(request).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["success"], false);
}

// ===== Study groups =====

#[tokio::test]
async fn test_group_endpoints() {
    let api = Api::new();
    let token = api.signup("Ada").await;

    let created = api
        .json(
            Method::POST,
            "/api/study-groups",
            Some(&token),
            Some(json!({
                "name": "DSA Wizards",
                "description": "Evening problem solving sessions",
                "subject": "Data Structures & Algorithms",
                "maxMembers": "2"
            })),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let group = created.json()["data"].clone();
    assert_eq!(group["subject"], "DataStructuresAlgorithms");
    assert_eq!(group["memberCount"], 1);
    assert_eq!(group["isOwner"], true);

    let listed = api.json(Method::GET, "/api/study-groups?subjects=DSA&limit=5", Some(&token), None).await;
    assert_eq!(listed.status, StatusCode::OK);
    let data = listed.json()["data"].clone();
    assert_eq!(data["total"], 1);
    assert_eq!(data["page"], 1);
    assert_eq!(data["limit"], 5);
    assert_eq!(data["totalPages"], 1);

    let bad_id = api.json(Method::GET, "/api/study-groups/not-a-uuid", Some(&token), None).await;
    assert_eq!(bad_id.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_id.json()["message"], "Invalid study group ID");

    let bad_page = api.json(Method::GET, "/api/study-groups?page=0", Some(&token), None).await;
    assert_eq!(bad_page.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_page.json()["message"], "Validation Error");

    let invalid = api
        .json(Method::POST, "/api/study-groups", Some(&token), Some(json!({ "name": "x" })))
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert!(invalid.json()["errors"].as_array().map_or(false, |e| !e.is_empty()));
}

// ===== Resources =====

#[tokio::test]
async fn test_upload_then_download() {
    let api = Api::new();
    let token = api.signup("Ada").await;

    let body = multipart_body(
        &[
            ("title", "Week 3 notes"),
            ("description", "Heaps and priority queues"),
            ("category", "Notes"),
        ],
        Some(("heaps.pdf", "application/pdf", b"%PDF-1.4 heaps")),
    );
    let uploaded = api.send(multipart_request("/api/resources", &token, body)).await;
    assert_eq!(uploaded.status, StatusCode::CREATED, "body: {}", String::from_utf8_lossy(&uploaded.bytes));

    let resource = uploaded.json()["data"].clone();
    let file_url = resource["fileUrl"].as_str().unwrap().to_string();
    assert!(file_url.starts_with("http://localhost:5000/uploads/"));
    let stored = common::stored_name(&file_url);
    assert_eq!(api.app.stored_files(), 1);

    let download = api
        .json(Method::GET, &format!("/api/resources/download/{}", stored), Some(&token), None)
        .await;
    assert_eq!(download.status, StatusCode::OK);
    assert_eq!(download.bytes, b"%PDF-1.4 heaps");
    let disposition = download.headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment;"));

    let id = resource["id"].as_str().unwrap();
    let detail = api.json(Method::GET, &format!("/api/resources/{}", id), Some(&token), None).await;
    assert_eq!(detail.json()["data"]["downloadCount"], 1);
    assert!(detail.json()["data"]["previewUrl"].is_string());

    let preview = api
        .json(Method::GET, &format!("/api/resources/preview/{}", stored), Some(&token), None)
        .await;
    assert_eq!(preview.status, StatusCode::OK);
    assert_eq!(preview.headers[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(preview.headers[header::CONTENT_DISPOSITION], "inline");
}

#[tokio::test]
async fn test_upload_without_file_is_rejected() {
    let api = Api::new();
    let token = api.signup("Ada").await;

    let body = multipart_body(
        &[
            ("title", "Week 3 notes"),
            ("description", "Heaps and priority queues"),
            ("category", "Notes"),
        ],
        None,
    );
    let reply = api.send(multipart_request("/api/resources", &token, body)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["errors"], json!(["file: File is required"]));
    assert_eq!(api.app.stored_files(), 0);
}

// ===== Settings =====

#[tokio::test]
async fn test_settings_round_trip_over_http() {
    let api = Api::new();
    let token = api.signup("Ada").await;

    let initial = api.json(Method::GET, "/api/settings", Some(&token), None).await;
    assert_eq!(initial.status, StatusCode::OK);
    assert_eq!(initial.json()["data"]["preferences"]["theme"], "dark");

    let updated = api
        .json(Method::PUT, "/api/settings", Some(&token), Some(json!({ "theme": "light" })))
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.json()["data"]["preferences"]["theme"], "light");
    assert_eq!(updated.json()["data"]["preferences"]["emailNotifications"], true);
}
