use std::sync::Arc;

use axum::{
    body::Body,
    http::{self, request, Request, StatusCode},
    Router,
};
use devconnect_api::{Claims, Error as ApiError, TokenKeys, UserId, DEFAULT_TOKEN_TTL};
use devconnect_mock_store::MockStore;
use serde_json::Value;
use tower::ServiceExt;

use crate::app;

mod profiles;

pub struct TestApp {
    pub app: Router,
    pub store: Arc<MockStore>,
    pub keys: TokenKeys,
}

/// Runs one request through the router and decodes its json body
pub async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.expect("running request");
    let status = resp.status();
    let bytes = hyper::body::to_bytes(resp.into_body())
        .await
        .expect("recovering resp bytes");
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|err| panic!("parsing resp body {bytes:?}: {err}"));
    (status, body)
}

impl TestApp {
    pub fn new() -> TestApp {
        let store = Arc::new(MockStore::new());
        let keys = TokenKeys::from_secret(b"test secret");
        TestApp {
            app: app(store.clone(), store.clone(), keys.clone()),
            store,
            keys,
        }
    }

    pub fn token(&self, user: UserId) -> String {
        self.keys
            .issue(&Claims::new(user, DEFAULT_TOKEN_TTL))
            .expect("issuing test token")
    }

    pub fn request(
        &self,
        method: &str,
        uri: &str,
        user: Option<UserId>,
        body: Option<Value>,
    ) -> Request<Body> {
        let req = request::Builder::new()
            .method(method)
            .uri(uri)
            .header(http::header::CONTENT_TYPE, "application/json");
        let req = match user {
            Some(user) => req.header(
                http::header::AUTHORIZATION,
                format!("Bearer {}", self.token(user)),
            ),
            None => req,
        };
        let body = match body {
            Some(body) => Body::from(serde_json::to_vec(&body).expect("serializing body")),
            None => Body::empty(),
        };
        req.body(body).expect("building request")
    }

    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        user: Option<UserId>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        send(self.app.clone(), self.request(method, uri, user, body)).await
    }

    pub async fn expect_ok(
        &self,
        method: &str,
        uri: &str,
        user: Option<UserId>,
        body: Option<Value>,
    ) -> Value {
        let (status, body) = self.call(method, uri, user, body).await;
        assert_eq!(status, StatusCode::OK, "{method} {uri} returned {body}");
        body
    }

    pub async fn expect_err(
        &self,
        method: &str,
        uri: &str,
        user: Option<UserId>,
        body: Option<Value>,
    ) -> (StatusCode, ApiError) {
        let (status, body) = self.call(method, uri, user, body).await;
        let err = ApiError::parse(&serde_json::to_vec(&body).unwrap())
            .unwrap_or_else(|err| panic!("parsing error body {body}: {err}"));
        assert_eq!(status, err.status_code());
        (status, err)
    }
}

/// Message reported for `field`, when `err` is a validation error
pub fn validation_error(err: ApiError, field: &str) -> Option<String> {
    match err {
        ApiError::Validation(errors) => errors.get(field).map(String::from),
        err => panic!("expected a validation error, got {err:?}"),
    }
}
