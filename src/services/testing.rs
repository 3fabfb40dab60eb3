//! Recording fake for `HttpTransport`, shared by service and route tests.
use super::transport::{HttpTransport, UpstreamRequest, UpstreamResponse};
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use bytes::Bytes;
use serde_json::{json, Value};
use std::sync::Mutex;

type Handler = Box<dyn Fn(&UpstreamRequest) -> AppResult<UpstreamResponse> + Send + Sync>;

pub struct FakeTransport {
    handler: Handler,
    requests: Mutex<Vec<UpstreamRequest>>,
}

impl FakeTransport {
    /// Answers token requests with a fresh token and everything else with
    /// `handler`.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&UpstreamRequest) -> AppResult<UpstreamResponse> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(move |req| {
                if is_token_request(req) {
                    Ok(json_response(200, json!({"access_token": "token-1", "expires_in": 3600})))
                } else {
                    handler(req)
                }
            }),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Sees every request, token exchanges included.
    pub fn raw<F>(handler: F) -> Self
    where
        F: Fn(&UpstreamRequest) -> AppResult<UpstreamResponse> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<UpstreamRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn token_calls(&self) -> usize {
        self.requests().iter().filter(|r| is_token_request(r)).count()
    }

    /// Requests other than token exchanges.
    pub fn api_calls(&self) -> Vec<UpstreamRequest> {
        self.requests()
            .into_iter()
            .filter(|r| !is_token_request(r))
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn execute(&self, request: UpstreamRequest) -> AppResult<UpstreamResponse> {
        self.requests.lock().unwrap().push(request.clone());
        (self.handler)(&request)
    }
}

pub fn is_token_request(request: &UpstreamRequest) -> bool {
    request.url.ends_with("/oauth/v2/token")
}

pub fn json_response(status: u16, body: Value) -> UpstreamResponse {
    let mut headers = HeaderMap::new();
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    UpstreamResponse {
        status: StatusCode::from_u16(status).unwrap(),
        headers,
        body: Bytes::from(body.to_string()),
    }
}

pub fn empty_response(status: u16) -> UpstreamResponse {
    UpstreamResponse {
        status: StatusCode::from_u16(status).unwrap(),
        headers: HeaderMap::new(),
        body: Bytes::new(),
    }
}

pub fn binary_response(body: &'static [u8], content_type: &str, disposition: &str) -> UpstreamResponse {
    let mut headers = HeaderMap::new();
    headers.insert("content-type", HeaderValue::from_str(content_type).unwrap());
    headers.insert(
        "content-disposition",
        HeaderValue::from_str(disposition).unwrap(),
    );
    UpstreamResponse {
        status: StatusCode::OK,
        headers,
        body: Bytes::from_static(body),
    }
}

pub fn network_error() -> AppError {
    AppError::Internal("connection refused".into())
}
