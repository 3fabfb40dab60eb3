use crate::services::transport::UpstreamResponse;
use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

static FILENAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"filename\*?=(?:UTF-8'')?(?:"([^"]*)"|([^;\n]*))"#).expect("valid regex")
});

/// How a binary response is presented to the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

impl Disposition {
    fn as_str(self) -> &'static str {
        match self {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        }
    }
}

/// Binary content fetched from upstream, with name and type taken from the
/// upstream response headers.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl DownloadedFile {
    pub fn from_response(response: UpstreamResponse, fallback_name: String) -> Self {
        let content_type = response
            .header_str(header::CONTENT_TYPE)
            .map(str::to_string)
            .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());
        let file_name = response
            .header_str(header::CONTENT_DISPOSITION)
            .and_then(filename_from_disposition)
            .unwrap_or(fallback_name);

        Self {
            file_name,
            content_type,
            bytes: response.body,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// JSON envelope for clients that cannot take raw binary.
    pub fn to_base64_envelope(&self) -> Value {
        json!({
            "success": true,
            "file_name": self.file_name,
            "content_type": self.content_type,
            "size_bytes": self.size(),
            "data_base64": STANDARD.encode(&self.bytes),
        })
    }

    /// Raw body with `Content-Type` and `Content-Disposition` set.
    pub fn into_binary_response(self, disposition: Disposition) -> Response {
        let content_type = HeaderValue::from_str(&self.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
        let safe_name: String = self
            .file_name
            .chars()
            .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
            .map(|c| if c.is_ascii() { c } else { '_' })
            .collect();
        let content_disposition =
            HeaderValue::from_str(&format!("{}; filename=\"{}\"", disposition.as_str(), safe_name))
                .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

        (
            [
                (header::CONTENT_TYPE, content_type),
                (header::CONTENT_DISPOSITION, content_disposition),
            ],
            self.bytes,
        )
            .into_response()
    }
}

/// File name from a `Content-Disposition` header value.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let captures = FILENAME_RE.captures(value)?;
    let raw = captures.get(1).or_else(|| captures.get(2))?.as_str().trim();
    let decoded = urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    let name = decoded.trim_matches(|c| c == '"' || c == '\'').to_string();
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::binary_response;
    use axum::http::StatusCode;

    #[test]
    fn test_filename_variants() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="report.pdf""#).as_deref(),
            Some("report.pdf")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=plain.txt").as_deref(),
            Some("plain.txt")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename*=UTF-8''r%C3%A9sum%C3%A9.docx")
                .as_deref(),
            Some("résumé.docx")
        );
        assert_eq!(filename_from_disposition("inline"), None);
    }

    #[test]
    fn test_from_response_falls_back() {
        let mut response = binary_response(b"abc", "text/plain", "attachment");
        response.headers.remove(header::CONTENT_TYPE);
        let file = DownloadedFile::from_response(response, "attachment_42".into());

        assert_eq!(file.file_name, "attachment_42");
        assert_eq!(file.content_type, "application/octet-stream");
        assert_eq!(file.size(), 3);
    }

    #[test]
    fn test_base64_envelope() {
        let response = binary_response(b"hello", "text/plain", r#"attachment; filename="a.txt""#);
        let envelope = DownloadedFile::from_response(response, "x".into()).to_base64_envelope();

        assert_eq!(envelope["file_name"], json!("a.txt"));
        assert_eq!(envelope["content_type"], json!("text/plain"));
        assert_eq!(envelope["size_bytes"], json!(5));
        assert_eq!(envelope["data_base64"], json!("aGVsbG8="));
    }

    #[test]
    fn test_binary_response_headers() {
        let response = binary_response(b"%PDF", "application/pdf", r#"attachment; filename="q.pdf""#);
        let response = DownloadedFile::from_response(response, "x".into())
            .into_binary_response(Disposition::Inline);

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "inline; filename=\"q.pdf\""
        );
    }
}
