/// WorkDrive gateway operations
/// Every request carries the organization header next to the token.
use super::token_manager::TokenManager;
use super::transport::{HttpTransport, UpstreamRequest, UpstreamResponse};
use crate::config::CredentialSet;
use crate::error::{AppError, AppResult};
use crate::models::{CanonicalItem, DownloadedFile, SearchPage};
use crate::utils::normalize::{normalize_item, normalize_items};
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

pub const ORGANIZATION_HEADER: &str = "X-WorkDrive-Organization";

#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub query: String,
    pub parent_id: Option<String>,
    pub limit: u32,
    pub offset: u32,
    pub include_folders: bool,
}

#[derive(Debug, Clone)]
pub struct SearchResults {
    pub page: SearchPage<CanonicalItem>,
    pub next_token: Option<String>,
}

impl SearchResults {
    pub fn to_envelope(&self) -> Value {
        let mut body = self.page.to_envelope();
        body["next_token"] = json!(self.next_token);
        body
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderListing {
    pub success: bool,
    pub count: usize,
    pub folder_id: String,
    pub next_token: Option<String>,
    pub data: Vec<CanonicalItem>,
}

pub struct WorkDriveService {
    tokens: TokenManager,
    transport: Arc<dyn HttpTransport>,
    organization_id: String,
    default_parent_id: Option<String>,
    public_base_url: String,
}

fn next_token(body: &Value) -> Option<String> {
    match body.pointer("/page_info/next_token")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl WorkDriveService {
    pub fn new(
        credentials: CredentialSet,
        public_base_url: String,
        transport: Arc<dyn HttpTransport>,
    ) -> AppResult<Self> {
        let organization_id = credentials.organization_id.clone().ok_or_else(|| {
            AppError::Config("ZOHO_WORKDRIVE_ORG_ID environment variable is required".into())
        })?;
        let default_parent_id = credentials.default_parent_id.clone();

        Ok(Self {
            tokens: TokenManager::new("Zoho WorkDrive", credentials, transport.clone()),
            transport,
            organization_id,
            default_parent_id,
            public_base_url,
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/workdrive/api/v1/{}",
            self.tokens.credentials().api_domain,
            path
        )
    }

    async fn send(&self, request: UpstreamRequest) -> AppResult<UpstreamResponse> {
        let authorization = self.tokens.authorization().await?;
        let request = request
            .header("Authorization", authorization)
            .header(ORGANIZATION_HEADER, self.organization_id.clone());
        self.transport.execute(request).await
    }

    pub async fn search(&self, params: SearchParams) -> AppResult<SearchResults> {
        let kinds = if params.include_folders {
            json!(["files", "folders"])
        } else {
            json!(["files"])
        };
        let mut payload = json!({
            "search_text": params.query,
            "page_info": { "offset": params.offset, "limit": params.limit },
            "filter_param": { "type": kinds },
        });
        if let Some(parent) = params.parent_id.or_else(|| self.default_parent_id.clone()) {
            payload["filter_param"]["parent_id"] = json!(parent);
        }
        debug!("WorkDrive search payload: {}", payload);

        let response = self.send(UpstreamRequest::post(self.url("search")).json(payload)).await?;
        if response.is_no_content() {
            return Ok(SearchResults {
                page: SearchPage::empty(),
                next_token: None,
            });
        }
        let body = response
            .error_for_status("Failed to search Zoho WorkDrive")?
            .json_value();

        let items = normalize_items(body.get("data").unwrap_or(&Value::Null), &self.public_base_url);
        let total = body
            .pointer("/summary/total_matches")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(items.len());
        let next_token = next_token(&body);
        let page = SearchPage::new(items, total, params.limit, next_token.is_some());

        info!("WorkDrive search returned {} of {} items", page.count, page.total);
        Ok(SearchResults { page, next_token })
    }

    pub async fn list_folder(
        &self,
        parent_id: Option<&str>,
        limit: u32,
        next_token_in: Option<&str>,
    ) -> AppResult<FolderListing> {
        let folder_id = parent_id
            .map(str::to_string)
            .or_else(|| self.default_parent_id.clone())
            .ok_or_else(|| {
                AppError::Validation(
                    "parentId is required (or set ZOHO_WORKDRIVE_DEFAULT_PARENT_ID)".into(),
                )
            })?;

        let mut request = UpstreamRequest::get(self.url(&format!("files/{}/files", folder_id)))
            .query("limit", limit.to_string());
        if let Some(token) = next_token_in.filter(|t| !t.is_empty()) {
            request = request.query("next_token", token);
        }

        let response = self.send(request).await?;
        let body = if response.is_no_content() {
            Value::Null
        } else {
            response
                .error_for_status("Failed to list WorkDrive folder")?
                .json_value()
        };

        let data = normalize_items(body.get("data").unwrap_or(&Value::Null), &self.public_base_url);
        Ok(FolderListing {
            success: true,
            count: data.len(),
            folder_id,
            next_token: next_token(&body),
            data,
        })
    }

    /// Single item, normalized. Falls back to the raw record when it cannot
    /// be normalized.
    pub async fn get_file(&self, file_id: &str) -> AppResult<Value> {
        let response = self
            .send(UpstreamRequest::get(self.url(&format!("files/{}", file_id))))
            .await?;
        if response.is_no_content() || response.status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound("File not found".into()));
        }
        let body = response
            .error_for_status("Failed to fetch WorkDrive file")?
            .json_value();

        let raw = match body.get("data") {
            Some(Value::Array(items)) => items.first().cloned().unwrap_or(Value::Null),
            Some(other) => other.clone(),
            None => Value::Null,
        };
        match normalize_item(&raw, &self.public_base_url) {
            Some(item) => serde_json::to_value(item)
                .map_err(|e| AppError::Internal(format!("Failed to serialize item: {}", e))),
            None => Ok(raw),
        }
    }

    pub async fn download(&self, file_id: &str) -> AppResult<DownloadedFile> {
        let response = self
            .send(UpstreamRequest::get(self.url(&format!("download/{}", file_id))))
            .await?
            .error_for_status("Failed to download WorkDrive file")?;

        Ok(DownloadedFile::from_response(
            response,
            format!("workdrive_{}", file_id),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::testing::{binary_response, empty_response, json_response, FakeTransport};
    use crate::services::transport::RequestBody;

    fn service(transport: &Arc<FakeTransport>) -> WorkDriveService {
        let config = Config::for_tests();
        WorkDriveService::new(
            config.workdrive.clone().unwrap(),
            config.public_base_url.clone(),
            transport.clone(),
        )
        .unwrap()
    }

    fn file(id: &str) -> Value {
        json!({"id": id, "type": "files", "attributes": {"name": format!("{}.txt", id)}})
    }

    #[test]
    fn test_requires_organization() {
        let mut credentials = Config::for_tests().workdrive.unwrap();
        credentials.organization_id = None;
        let transport = Arc::new(FakeTransport::new(|_| Ok(empty_response(204))));
        let result = WorkDriveService::new(credentials, "https://gateway.test".into(), transport);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_search_payload_and_paging() {
        let transport = Arc::new(FakeTransport::new(|_| {
            Ok(json_response(
                200,
                json!({
                    "data": [file("a"), file("b"), file("c")],
                    "summary": {"total_matches": 40},
                    "page_info": {"next_token": "t-2"}
                }),
            ))
        }));
        let workdrive = service(&transport);

        let results = workdrive
            .search(SearchParams {
                query: "budget".into(),
                parent_id: None,
                limit: 2,
                offset: 5,
                include_folders: false,
            })
            .await
            .unwrap();

        assert_eq!(results.page.count, 2);
        assert_eq!(results.page.total, 40);
        assert!(results.page.has_more);
        assert_eq!(results.next_token.as_deref(), Some("t-2"));
        assert_eq!(results.page.items[0].name.as_deref(), Some("a.txt"));

        let call = &transport.api_calls()[0];
        assert_eq!(call.url, "https://api.test/workdrive/api/v1/search");
        assert_eq!(call.header_value(ORGANIZATION_HEADER), Some("org-1"));
        match &call.body {
            RequestBody::Json(body) => {
                assert_eq!(body["search_text"], json!("budget"));
                assert_eq!(body["page_info"], json!({"offset": 5, "limit": 2}));
                assert_eq!(body["filter_param"]["type"], json!(["files"]));
                assert_eq!(body["filter_param"]["parent_id"], json!("root-folder"));
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_folder_defaults() {
        let transport = Arc::new(FakeTransport::new(|_| {
            Ok(json_response(200, json!({"data": [file("x")]})))
        }));
        let listing = service(&transport)
            .list_folder(None, 50, Some("next-1"))
            .await
            .unwrap();

        assert_eq!(listing.folder_id, "root-folder");
        assert_eq!(listing.count, 1);
        assert_eq!(listing.next_token, None);

        let call = &transport.api_calls()[0];
        assert_eq!(
            call.url,
            "https://api.test/workdrive/api/v1/files/root-folder/files"
        );
        assert_eq!(call.query_value("limit"), Some("50"));
        assert_eq!(call.query_value("next_token"), Some("next-1"));
    }

    #[tokio::test]
    async fn test_list_folder_without_any_folder() {
        let transport = Arc::new(FakeTransport::new(|_| Ok(empty_response(204))));
        let mut credentials = Config::for_tests().workdrive.unwrap();
        credentials.default_parent_id = None;
        let workdrive =
            WorkDriveService::new(credentials, "https://gateway.test".into(), transport.clone())
                .unwrap();

        let err = workdrive.list_folder(None, 50, None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_get_file_normalizes_array_or_object() {
        let transport = Arc::new(FakeTransport::new(|req| {
            if req.url.ends_with("/files/a") {
                Ok(json_response(200, json!({"data": [file("a")]})))
            } else {
                Ok(json_response(200, json!({"data": file("b")})))
            }
        }));
        let workdrive = service(&transport);

        let a = workdrive.get_file("a").await.unwrap();
        assert_eq!(a["name"], json!("a.txt"));
        assert_eq!(
            a["download_url"],
            json!("https://gateway.test/proxy-download?fileId=a")
        );
        let b = workdrive.get_file("b").await.unwrap();
        assert_eq!(b["id"], json!("b"));
    }

    #[tokio::test]
    async fn test_download_fallback_name() {
        let transport = Arc::new(FakeTransport::new(|_| {
            Ok(binary_response(b"data", "text/csv", "attachment"))
        }));
        let file = service(&transport).download("f9").await.unwrap();
        assert_eq!(file.file_name, "workdrive_f9");
        assert_eq!(file.content_type, "text/csv");
    }
}
