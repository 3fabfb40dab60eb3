/// Upstream HTTP transport
/// Every call to the token endpoint and the CRM / WorkDrive / Sheet APIs goes
/// through `HttpTransport`, so services can be exercised against a fake.
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use axum::http::{header, HeaderMap, Method, StatusCode};
use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl UpstreamRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn query(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query.push((name.to_string(), value.into()));
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = RequestBody::Form(fields);
        self
    }

    /// Value of a query parameter, if set.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// 204, or a 2xx with nothing in the body.
    pub fn is_no_content(&self) -> bool {
        self.status == StatusCode::NO_CONTENT || (self.is_success() && self.body.is_empty())
    }

    pub fn header_str(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body as JSON; an empty body reads as `null`.
    pub fn json_value(&self) -> Value {
        if self.body.is_empty() {
            return Value::Null;
        }
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&self.body).into_owned()))
    }

    pub fn json<T: DeserializeOwned>(&self) -> AppResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            error!("Failed to parse upstream response: {}", e);
            AppError::Internal(format!("Failed to parse upstream response: {}", e))
        })
    }

    /// Turn a non-2xx response into `AppError::Upstream`, keeping the body as
    /// details and `context` as the caller-facing message.
    pub fn error_for_status(self, context: &str) -> AppResult<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let details = self.json_value();
        error!("{}: {} - {}", context, self.status, details);
        Err(AppError::Upstream {
            status: self.status.as_u16(),
            message: context.to_string(),
            details: Some(details).filter(|d| !d.is_null()),
        })
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: UpstreamRequest) -> AppResult<UpstreamResponse>;
}

/// `HttpTransport` over a shared `reqwest::Client`.
pub struct ReqwestTransport {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client, max_body_bytes: usize) -> Self {
        Self {
            client,
            max_body_bytes,
        }
    }

    /// Client with connection pooling and a bounded per-request timeout.
    /// The timeout covers reading the body as well as the headers.
    pub fn build_client(timeout: Duration) -> AppResult<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .tcp_nodelay(true)
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?)
    }

    fn too_large(&self, url: &str) -> AppError {
        error!(
            "Upstream response from {} exceeds {} bytes",
            url, self.max_body_bytes
        );
        AppError::TooLarge(format!(
            "Upstream response exceeds {} bytes",
            self.max_body_bytes
        ))
    }
}

fn transport_error(url: &str, e: reqwest::Error) -> AppError {
    error!("Upstream request to {} failed: {}", url, e);
    if e.is_timeout() {
        AppError::Timeout(format!("Upstream request timed out: {}", url))
    } else {
        AppError::Http(e)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: UpstreamRequest) -> AppResult<UpstreamResponse> {
        debug!("{} {}", request.method, request.url);

        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(&body),
            RequestBody::Form(fields) => builder.form(&fields),
        };

        let mut response = builder
            .send()
            .await
            .map_err(|e| transport_error(&request.url, e))?;

        let status = response.status();
        let headers = response.headers().clone();

        if response
            .content_length()
            .is_some_and(|len| len > self.max_body_bytes as u64)
        {
            return Err(self.too_large(&request.url));
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| transport_error(&request.url, e))?
        {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(self.too_large(&request.url));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(UpstreamResponse {
            status,
            headers,
            body: body.freeze(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn response(status: u16, body: &str) -> UpstreamResponse {
        UpstreamResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn test_error_for_status_keeps_json_details() {
        let err = response(401, r#"{"code":"INVALID_TOKEN"}"#)
            .error_for_status("Failed to get record")
            .unwrap_err();

        match err {
            AppError::Upstream {
                status,
                message,
                details,
            } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Failed to get record");
                assert_eq!(details, Some(json!({"code": "INVALID_TOKEN"})));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_success_passes_through() {
        let ok = response(200, "{}").error_for_status("unused").unwrap();
        assert!(ok.is_success());
        assert!(!ok.is_no_content());
        assert!(response(200, "").is_no_content());
        assert!(!response(404, "").is_no_content());
    }

    #[test]
    fn test_json_value_handles_empty_and_text_bodies() {
        assert_eq!(response(204, "").json_value(), Value::Null);
        assert_eq!(response(502, "Bad Gateway").json_value(), json!("Bad Gateway"));
    }

    #[test]
    fn test_request_builder() {
        let request = UpstreamRequest::get("https://api.test/x")
            .query("limit", "10")
            .header("Authorization", "Zoho-oauthtoken t");

        assert_eq!(request.query_value("limit"), Some("10"));
        assert_eq!(request.header_value("authorization"), Some("Zoho-oauthtoken t"));
        assert_eq!(request.body, RequestBody::Empty);
    }

    /// Serves one connection with `reply`, then keeps the socket open.
    async fn serve_once(reply: &'static [u8], close_after: bool) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(reply).await;
            if close_after {
                let _ = socket.shutdown().await;
            } else {
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
        });
        format!("http://{}/file", addr)
    }

    fn transport(timeout: Duration, max_body_bytes: usize) -> ReqwestTransport {
        ReqwestTransport::new(
            ReqwestTransport::build_client(timeout).unwrap(),
            max_body_bytes,
        )
    }

    #[tokio::test]
    async fn test_stalled_body_is_timeout() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 100000\r\n\r\npartial",
            false,
        )
        .await;

        let err = transport(Duration::from_millis(300), 1024 * 1024)
            .execute(UpstreamRequest::get(url))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Timeout(_)), "got {:?}", err);
        assert_eq!(
            axum::response::IntoResponse::into_response(err).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[tokio::test]
    async fn test_silent_server_is_timeout() {
        let url = serve_once(b"", false).await;

        let err = transport(Duration::from_millis(300), 1024)
            .execute(UpstreamRequest::get(url))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Timeout(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_body_within_cap_is_read() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 7\r\nContent-Type: text/plain\r\n\r\ncontent",
            false,
        )
        .await;

        let response = transport(Duration::from_secs(5), 16)
            .execute(UpstreamRequest::get(url))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, Bytes::from_static(b"content"));
    }

    #[tokio::test]
    async fn test_declared_length_over_cap_is_rejected() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 64\r\n\r\n",
            false,
        )
        .await;

        let err = transport(Duration::from_secs(5), 16)
            .execute(UpstreamRequest::get(url))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::TooLarge(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_undeclared_length_over_cap_is_rejected() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n\
              0123456789abcdef0123456789abcdef",
            true,
        )
        .await;

        let err = transport(Duration::from_secs(5), 16)
            .execute(UpstreamRequest::get(url))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::TooLarge(_)), "got {:?}", err);
    }
}
