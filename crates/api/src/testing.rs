//! Router harness for route tests: in-memory store, manual clock, and the
//! real router driven through `oneshot`.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use catalog_core::clock::{Clock, ManualClock};
use catalog_core::events::EventBus;
use catalog_core::store::MemoryStore;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use tower::ServiceExt;

use crate::config::AppConfig;
use crate::extract::Claims;
use crate::routes::build_router;
use crate::state::AppState;

pub const WEBHOOK_SECRET: &str = "whsec_test";
pub const JWT_SECRET: &str = "jwt_test_secret";

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config = AppConfig {
            webhook_secret: WEBHOOK_SECRET.to_string(),
            jwt_secret: JWT_SECRET.to_string(),
            rate_limit_sweep_probability: 0.0,
            ..AppConfig::default()
        };
        tweak(&mut config);

        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let state = AppState::new(config, store.clone(), clock.clone(), EventBus::new(64));
        let router = build_router(state.clone());

        Self {
            state,
            store,
            clock,
            router,
        }
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get_raw(&self, path: &str, headers: &[(&str, &str)]) -> Response<Body> {
        self.send(request(Method::GET, path, headers, Body::empty()))
            .await
    }

    pub async fn get(&self, path: &str, headers: &[(&str, &str)]) -> (StatusCode, Value) {
        read(self.get_raw(path, headers).await).await
    }

    pub async fn post_json_raw(
        &self,
        path: &str,
        body: Value,
        headers: &[(&str, &str)],
    ) -> Response<Body> {
        let bytes = serde_json::to_vec(&body).expect("serializable body");
        let mut headers = headers.to_vec();
        headers.push(("content-type", "application/json"));
        self.send(request(Method::POST, path, &headers, Body::from(bytes)))
            .await
    }

    pub async fn post_json(
        &self,
        path: &str,
        body: Value,
        headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        read(self.post_json_raw(path, body, headers).await).await
    }

    pub async fn post_bytes(
        &self,
        path: &str,
        body: Vec<u8>,
        headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let length = body.len().to_string();
        let mut headers = headers.to_vec();
        headers.push(("content-type", "application/json"));
        headers.push(("content-length", length.as_str()));
        read(
            self.send(request(Method::POST, path, &headers, Body::from(body)))
                .await,
        )
        .await
    }
}

/// HS256 token for `user_id`, valid for an hour.
pub fn bearer_token(user_id: &str) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("token encodes")
}

fn request(method: Method, path: &str, headers: &[(&str, &str)], body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(body).expect("valid request")
}

async fn read(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}
