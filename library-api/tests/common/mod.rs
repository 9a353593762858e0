#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use library_api::models::AdminRole;
use library_api::services::{LocalStorage, MemoryStore, MockAuthProvider};
use library_api::startup::{build_router, AppSettings, AppState};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const ADMIN_EMAIL: &str = "librarian@example.org";
pub const ADMIN_PASSWORD: &str = "correct horse battery staple";
pub const READER_EMAIL: &str = "reader@example.org";
pub const READER_PASSWORD: &str = "reader-password";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub auth: Arc<MockAuthProvider>,
    pub storage_dir: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::with_settings(AppSettings::default()).await
    }

    pub async fn with_settings(mut settings: AppSettings) -> Self {
        let storage_dir = tempfile::tempdir().expect("Failed to create storage dir");
        settings.files_dir = Some(storage_dir.path().to_path_buf());

        let storage = Arc::new(
            LocalStorage::new(storage_dir.path(), "http://localhost:8080")
                .await
                .expect("Failed to create local storage"),
        );
        let store = Arc::new(MemoryStore::new());
        let auth = Arc::new(MockAuthProvider::new());

        let admin = auth
            .add_user(ADMIN_EMAIL, ADMIN_PASSWORD)
            .expect("Failed to add admin user");
        store
            .add_admin(admin.id, ADMIN_EMAIL, AdminRole::Admin)
            .expect("Failed to add admin row");
        auth.add_user(READER_EMAIL, READER_PASSWORD)
            .expect("Failed to add reader");

        let state = AppState::new(store.clone(), storage, auth.clone(), settings);
        let router = build_router(state.clone());

        TestApp {
            router,
            state,
            store,
            auth,
            storage_dir,
        }
    }

    pub async fn request(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request")
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.request(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn token_for(&self, email: &str, password: &str) -> String {
        use library_api::services::AuthProvider;
        self.auth
            .sign_in(email, password)
            .await
            .expect("Failed to sign in")
            .access_token
    }

    pub async fn admin_token(&self) -> String {
        self.token_for(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    pub async fn reader_token(&self) -> String {
        self.token_for(READER_EMAIL, READER_PASSWORD).await
    }

    /// Create a document through the API and return its JSON.
    pub async fn create_document(&self, token: &str, title: &str) -> Value {
        let (content_type, body) = MultipartBody::new()
            .text("title", title)
            .text("author", "Ursula K. Le Guin")
            .text("category", "Fiction")
            .text("type", "book")
            .text("publication_year", "1969")
            .file("file", "book.pdf", "application/pdf", b"%PDF-1.7 library test")
            .build();

        let response = self
            .request(
                Request::post("/api/documents")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .header(header::CONTENT_TYPE, content_type)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await;

        assert_eq!(response.status(), 201, "document creation failed");
        body_json(response).await
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// Hand-built `multipart/form-data` body.
pub struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: "library-test-boundary-7MA4YWxkTrZu0gW".to_string(),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                self.boundary, name, file_name, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn build(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}
