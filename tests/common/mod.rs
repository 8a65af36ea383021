//! Router-level test harness backed by the in-memory store.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use axum_extra::headers::{Authorization, HeaderMapExt};
use catalog_service::{
    app::app_state::AppState,
    auth::PasswordHasher,
    models::CreateUserEntity,
    routes,
    seed::{self, SeedOptions, SeedSummary},
    store::{CatalogStore, InMemoryCatalogStore},
};
use serde_json::Value;
use tower::ServiceExt;

pub const JOHN: (&str, &str) = ("john_doe", "password");
pub const JANE: (&str, &str) = ("jane", "secret");
pub const ADMIN: (&str, &str) = ("admin", "admin");

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryCatalogStore>,
    pub seed: SeedSummary,
}

/// Seeded fixtures plus a second customer, `jane`, who owns nothing.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(|store| store as Arc<dyn CatalogStore>).await
}

/// Like [`spawn_app`], with the router served by `wrap(store)` instead.
pub async fn spawn_app_with(
    wrap: impl FnOnce(Arc<InMemoryCatalogStore>) -> Arc<dyn CatalogStore>,
) -> TestApp {
    let store = Arc::new(InMemoryCatalogStore::new());
    let hasher = PasswordHasher::fast();
    let seed = seed::populate(store.as_ref(), &hasher, SeedOptions { with_admin: true })
        .await
        .unwrap();
    store
        .create_user(CreateUserEntity {
            username: JANE.0.into(),
            email: "jane@example.com".into(),
            password_hash: hasher.hash(JANE.1).unwrap(),
            is_staff: false,
        })
        .await
        .unwrap();

    let state = AppState {
        store: wrap(store.clone()),
    };
    TestApp {
        router: routes::app(state),
        store,
        seed,
    }
}

impl TestApp {
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        credentials: Option<(&str, &str)>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if body.is_some() {
            request = request.header("content-type", "application/json");
        }
        let mut request = request
            .body(body.map_or_else(Body::empty, |body| Body::from(body.to_string())))
            .unwrap();
        if let Some((username, password)) = credentials {
            request
                .headers_mut()
                .typed_insert(Authorization::basic(username, password));
        }

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, credentials: Option<(&str, &str)>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, credentials, None).await
    }
}
