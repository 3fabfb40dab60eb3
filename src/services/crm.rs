/// CRM gateway operations
/// Search, record, notes, activity and attachment calls against the CRM v2
/// REST API, authorized through the CRM token manager.
use super::token_manager::TokenManager;
use super::transport::{HttpTransport, UpstreamRequest, UpstreamResponse};
use crate::cache_manager::TtlCache;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{ActivityBuckets, AttachmentSummary, DownloadedFile, SearchPage};
use crate::utils::normalize::{classify_activities, summarize_attachments};
use crate::utils::validation::CrmModule;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_NOTE_TITLE: &str = "Note from CRM Assistant";
pub const DEFAULT_TAG_MODULES: [&str; 3] = ["Leads", "Contacts", "Tasks"];

pub type SearchCache = TtlCache<SearchPage<Value>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTarget {
    Contacts,
    Leads,
}

impl SearchTarget {
    pub fn module(self) -> CrmModule {
        match self {
            SearchTarget::Contacts => CrmModule::Contacts,
            SearchTarget::Leads => CrmModule::Leads,
        }
    }

    fn fields(self) -> &'static [&'static str] {
        match self {
            SearchTarget::Contacts => &["First_Name", "Last_Name", "Email"],
            SearchTarget::Leads => &["First_Name", "Last_Name", "Email", "Company"],
        }
    }

    fn failure(self) -> &'static str {
        match self {
            SearchTarget::Contacts => "Failed to search contacts in Zoho CRM",
            SearchTarget::Leads => "Failed to search leads in Zoho CRM",
        }
    }

    /// `(Field:equals:term)or(...)` over every searchable field.
    pub fn criteria(self, term: &str) -> String {
        let term = escape_criteria(term);
        self.fields()
            .iter()
            .map(|field| format!("({}:equals:{})", field, term))
            .collect::<Vec<_>>()
            .join("or")
    }
}

/// Backslash-escape the characters that delimit criteria expressions.
fn escape_criteria(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.trim().chars() {
        if matches!(c, '\\' | '(' | ')' | ',') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub page: SearchPage<Value>,
    /// Set when the page was served from the search cache.
    pub cached_at: Option<DateTime<Utc>>,
}

impl SearchOutcome {
    pub fn to_envelope(&self) -> Value {
        let mut body = self.page.to_envelope();
        if let Some(cached_at) = self.cached_at {
            body["cached"] = json!(true);
            body["cached_at"] = json!(cached_at.to_rfc3339());
        }
        body
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedNote {
    pub note_id: Value,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleTagResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ModuleTagResult {
    fn found(records: Vec<Value>) -> Self {
        Self {
            success: true,
            count: Some(records.len()),
            records: Some(records),
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            success: false,
            count: None,
            records: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TagSearchResult {
    pub success: bool,
    pub tag: String,
    pub total_count: usize,
    pub results: BTreeMap<String, ModuleTagResult>,
}

pub struct CrmService {
    tokens: TokenManager,
    transport: Arc<dyn HttpTransport>,
    search_cache: Arc<SearchCache>,
    from_email: Option<String>,
    public_base_url: String,
}

fn records(body: &Value) -> Vec<Value> {
    body.get("data")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn is_absent(response: &UpstreamResponse) -> bool {
    response.is_no_content() || response.status == StatusCode::NOT_FOUND
}

impl CrmService {
    pub fn new(
        config: &Config,
        transport: Arc<dyn HttpTransport>,
        search_cache: Arc<SearchCache>,
    ) -> Self {
        Self {
            tokens: TokenManager::new("Zoho CRM", config.crm.clone(), transport.clone()),
            transport,
            search_cache,
            from_email: config.from_email.clone(),
            public_base_url: config.public_base_url.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/crm/v2/{}", self.tokens.credentials().api_domain, path)
    }

    async fn send(&self, request: UpstreamRequest) -> AppResult<UpstreamResponse> {
        let authorization = self.tokens.authorization().await?;
        self.transport
            .execute(request.header("Authorization", authorization))
            .await
    }

    pub async fn search_contacts(&self, term: &str, limit: u32) -> AppResult<SearchOutcome> {
        self.search(SearchTarget::Contacts, term, limit).await
    }

    pub async fn search_leads(&self, term: &str, limit: u32) -> AppResult<SearchOutcome> {
        self.search(SearchTarget::Leads, term, limit).await
    }

    /// Cached search over one module. Identical searches (term compared
    /// case-insensitively) within the TTL are answered without upstream.
    pub async fn search(
        &self,
        target: SearchTarget,
        term: &str,
        limit: u32,
    ) -> AppResult<SearchOutcome> {
        let module = target.module();
        let key = SearchCache::make_key(module.as_str(), term.trim(), limit);

        if let Some(entry) = self.search_cache.get(&key).await {
            debug!("Search cache hit: {}", key);
            return Ok(SearchOutcome {
                page: entry.payload,
                cached_at: Some(entry.cached_at),
            });
        }

        let request = UpstreamRequest::get(self.url(&format!("{}/search", module)))
            .query("criteria", target.criteria(term));
        let response = self.send(request).await?;

        let page = if response.is_no_content() {
            SearchPage::empty()
        } else {
            let body = response.error_for_status(target.failure())?.json_value();
            let items = records(&body);
            let more = body
                .pointer("/info/more_records")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let total = items.len();
            SearchPage::new(items, total, limit, more)
        };

        info!(
            "CRM search {} returned {} of {} results",
            module, page.count, page.total
        );
        self.search_cache.set(key, page.clone()).await;

        Ok(SearchOutcome {
            page,
            cached_at: None,
        })
    }

    pub async fn get_record(&self, module: CrmModule, record_id: &str) -> AppResult<Value> {
        let request = UpstreamRequest::get(self.url(&format!("{}/{}", module, record_id)));
        let response = self.send(request).await?;
        if is_absent(&response) {
            return Err(AppError::NotFound("Record not found".into()));
        }

        let body = response.error_for_status("Failed to fetch record")?.json_value();
        records(&body)
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("Record not found".into()))
    }

    pub async fn get_notes(&self, module: CrmModule, record_id: &str) -> AppResult<Vec<Value>> {
        let request = UpstreamRequest::get(self.url(&format!("{}/{}/Notes", module, record_id)));
        let response = self.send(request).await?;
        if is_absent(&response) {
            return Ok(Vec::new());
        }

        let body = response
            .error_for_status("Failed to get notes from Zoho CRM")?
            .json_value();
        Ok(records(&body))
    }

    pub async fn add_note(
        &self,
        module: &str,
        record_id: &str,
        title: Option<&str>,
        content: &str,
    ) -> AppResult<CreatedNote> {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_NOTE_TITLE);
        let payload = json!({
            "data": [{
                "Note_Title": title,
                "Note_Content": content,
                "se_module": module,
            }]
        });

        let request = UpstreamRequest::post(self.url(&format!("{}/{}/Notes", module, record_id)))
            .json(payload);
        let body = self
            .send(request)
            .await?
            .error_for_status("Failed to add note")?
            .json_value();

        let first = body.pointer("/data/0").cloned().unwrap_or(Value::Null);
        if first.get("code").and_then(Value::as_str) != Some("SUCCESS") {
            warn!("Note creation on {}/{} was not accepted", module, record_id);
            return Err(AppError::Rejected {
                message: "Failed to create note".into(),
                details: body,
            });
        }

        Ok(CreatedNote {
            note_id: first.pointer("/details/id").cloned().unwrap_or(Value::Null),
            data: first,
        })
    }

    pub async fn get_communications(
        &self,
        module: CrmModule,
        record_id: &str,
    ) -> AppResult<ActivityBuckets> {
        let request =
            UpstreamRequest::get(self.url(&format!("{}/{}/Activities", module, record_id)));
        let response = self.send(request).await?;
        if is_absent(&response) {
            return Ok(ActivityBuckets::default());
        }

        let body = response
            .error_for_status("Failed to fetch communications")?
            .json_value();
        Ok(classify_activities(&records(&body)))
    }

    pub async fn list_attachments(
        &self,
        module: &str,
        record_id: &str,
    ) -> AppResult<Vec<AttachmentSummary>> {
        let request =
            UpstreamRequest::get(self.url(&format!("{}/{}/Attachments", module, record_id)));
        let response = self.send(request).await?;
        if response.is_no_content() {
            return Ok(Vec::new());
        }

        let body = response
            .error_for_status("Failed to list attachments")?
            .json_value();
        Ok(summarize_attachments(
            &records(&body),
            &self.public_base_url,
            module,
            record_id,
        ))
    }

    pub async fn get_attachment(
        &self,
        module: &str,
        record_id: &str,
        attachment_id: &str,
    ) -> AppResult<DownloadedFile> {
        let request = UpstreamRequest::get(self.url(&format!(
            "{}/{}/Attachments/{}",
            module, record_id, attachment_id
        )));
        let response = self
            .send(request)
            .await?
            .error_for_status("Failed to fetch attachment")?;

        Ok(DownloadedFile::from_response(
            response,
            format!("attachment_{}", attachment_id),
        ))
    }

    /// Send an email through the CRM. `from` may be an address string or an
    /// upstream sender object; without one the configured sender is used.
    pub async fn send_email(
        &self,
        to: &str,
        subject: &str,
        content: &str,
        from: Option<&Value>,
    ) -> AppResult<Value> {
        let from = match from {
            Some(Value::String(address)) if !address.trim().is_empty() => {
                json!({ "email": address.trim() })
            }
            Some(sender @ Value::Object(_)) => sender.clone(),
            _ => match &self.from_email {
                Some(user_name) => json!({ "user_name": user_name }),
                None => {
                    return Err(AppError::Config(
                        "ZOHO_FROM_EMAIL is not configured and no fromAddress was given".into(),
                    ))
                }
            },
        };

        let payload = json!({
            "from": from,
            "to": [{ "email": to }],
            "subject": subject,
            "content": content,
        });
        let request = UpstreamRequest::post(self.url("Emails/actions/send")).json(payload);
        let body = self
            .send(request)
            .await?
            .error_for_status("Failed to send email via Zoho CRM")?
            .json_value();

        info!("Email sent to {}", to);
        Ok(body)
    }

    /// Search each module for records carrying `tag`. One module failing does
    /// not fail the others.
    pub async fn search_by_tag(&self, tag: &str, modules: &[String]) -> AppResult<TagSearchResult> {
        let authorization = self.tokens.authorization().await?;
        let criteria = format!("(Tag:equals:{})", escape_criteria(tag));
        let mut results = BTreeMap::new();

        for module in modules {
            let request = UpstreamRequest::get(self.url(&format!("{}/search", module)))
                .query("criteria", criteria.clone())
                .header("Authorization", authorization.clone());

            let result = match self.transport.execute(request).await {
                Ok(response)
                    if response.is_no_content() || response.status == StatusCode::BAD_REQUEST =>
                {
                    ModuleTagResult::found(Vec::new())
                }
                Ok(response) if response.is_success() => {
                    ModuleTagResult::found(records(&response.json_value()))
                }
                Ok(response) => {
                    let body = response.json_value();
                    let message = body
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("Upstream returned {}", response.status));
                    warn!("Tag search on {} failed: {}", module, message);
                    ModuleTagResult::failed(message)
                }
                Err(e) => {
                    warn!("Tag search on {} failed: {}", module, e);
                    ModuleTagResult::failed(e.to_string())
                }
            };
            results.insert(module.clone(), result);
        }

        let total_count = results.values().filter_map(|r| r.count).sum();
        Ok(TagSearchResult {
            success: true,
            tag: tag.to_string(),
            total_count,
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{
        binary_response, empty_response, json_response, network_error, FakeTransport,
    };
    use crate::services::transport::RequestBody;
    use std::time::Duration;

    fn service(transport: &Arc<FakeTransport>) -> CrmService {
        CrmService::new(
            &Config::for_tests(),
            transport.clone(),
            Arc::new(SearchCache::new(Duration::from_secs(300))),
        )
    }

    fn contacts(n: usize) -> Value {
        let data: Vec<Value> = (1..=n)
            .map(|i| json!({"id": i.to_string(), "Last_Name": "Smith"}))
            .collect();
        json!({"data": data, "info": {"more_records": false}})
    }

    #[test]
    fn test_criteria() {
        assert_eq!(
            SearchTarget::Contacts.criteria("john"),
            "(First_Name:equals:john)or(Last_Name:equals:john)or(Email:equals:john)"
        );
        assert!(SearchTarget::Leads
            .criteria("acme")
            .ends_with("or(Company:equals:acme)"));
        assert_eq!(escape_criteria("a(b),c"), r"a\(b\)\,c");
    }

    #[tokio::test]
    async fn test_search_truncates_and_reports_total() {
        let transport = Arc::new(FakeTransport::new(|_| Ok(json_response(200, contacts(15)))));
        let crm = service(&transport);

        let outcome = crm.search_contacts("john", 10).await.unwrap();
        assert_eq!(outcome.page.count, 10);
        assert_eq!(outcome.page.total, 15);
        assert!(outcome.page.has_more);
        assert!(outcome.page.message.is_some());
        assert!(outcome.cached_at.is_none());

        let calls = transport.api_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].url, "https://api.test/crm/v2/Contacts/search");
        assert_eq!(
            calls[0].header_value("Authorization"),
            Some("Zoho-oauthtoken token-1")
        );
    }

    #[tokio::test]
    async fn test_search_served_from_cache() {
        let transport = Arc::new(FakeTransport::new(|_| Ok(json_response(200, contacts(2)))));
        let crm = service(&transport);

        crm.search_leads("Acme", 10).await.unwrap();
        let second = crm.search_leads("ACME", 10).await.unwrap();

        assert!(second.cached_at.is_some());
        assert_eq!(second.page.count, 2);
        assert_eq!(transport.api_calls().len(), 1);
        let body = second.to_envelope();
        assert_eq!(body["cached"], json!(true));

        // A different limit is a different key.
        crm.search_leads("acme", 20).await.unwrap();
        assert_eq!(transport.api_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_search_no_content_is_empty() {
        let transport = Arc::new(FakeTransport::new(|_| Ok(empty_response(204))));
        let outcome = service(&transport).search_contacts("nobody", 10).await.unwrap();
        assert_eq!(outcome.page.count, 0);
        assert!(!outcome.page.has_more);
    }

    #[tokio::test]
    async fn test_search_upstream_error() {
        let transport = Arc::new(FakeTransport::new(|_| {
            Ok(json_response(401, json!({"code": "INVALID_TOKEN"})))
        }));
        let err = service(&transport).search_contacts("x", 10).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_get_record() {
        let transport = Arc::new(FakeTransport::new(|req| {
            if req.url.ends_with("/Leads/1") {
                Ok(json_response(200, json!({"data": [{"id": "1", "Company": "Acme"}]})))
            } else {
                Ok(empty_response(204))
            }
        }));
        let crm = service(&transport);

        let record = crm.get_record(CrmModule::Leads, "1").await.unwrap();
        assert_eq!(record["Company"], json!("Acme"));

        let missing = crm.get_record(CrmModule::Leads, "2").await.unwrap_err();
        assert!(matches!(missing, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_notes_absent_is_empty() {
        let transport = Arc::new(FakeTransport::new(|_| {
            Ok(json_response(404, json!({"code": "NOT_FOUND"})))
        }));
        let notes = service(&transport)
            .get_notes(CrmModule::Contacts, "9")
            .await
            .unwrap();
        assert!(notes.is_empty());
    }

    #[tokio::test]
    async fn test_add_note() {
        let transport = Arc::new(FakeTransport::new(|_| {
            Ok(json_response(
                201,
                json!({"data": [{"code": "SUCCESS", "details": {"id": "n-1"}}]}),
            ))
        }));
        let note = service(&transport)
            .add_note("Leads", "7", None, "Called back")
            .await
            .unwrap();
        assert_eq!(note.note_id, json!("n-1"));

        let calls = transport.api_calls();
        assert_eq!(calls[0].url, "https://api.test/crm/v2/Leads/7/Notes");
        match &calls[0].body {
            RequestBody::Json(body) => {
                assert_eq!(body["data"][0]["Note_Title"], json!(DEFAULT_NOTE_TITLE));
                assert_eq!(body["data"][0]["se_module"], json!("Leads"));
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_add_note_rejected() {
        let transport = Arc::new(FakeTransport::new(|_| {
            Ok(json_response(
                200,
                json!({"data": [{"code": "INVALID_DATA", "message": "bad"}]}),
            ))
        }));
        let err = service(&transport)
            .add_note("Leads", "7", Some("T"), "c")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_communications_no_content() {
        let transport = Arc::new(FakeTransport::new(|_| Ok(empty_response(204))));
        let buckets = service(&transport)
            .get_communications(CrmModule::Contacts, "1")
            .await
            .unwrap();
        assert!(buckets.is_empty());
        assert_eq!(buckets.counts().total, 0);
    }

    #[tokio::test]
    async fn test_attachments() {
        let transport = Arc::new(FakeTransport::new(|req| {
            if req.url.ends_with("/Attachments") {
                Ok(json_response(
                    200,
                    json!({"data": [{"id": "a1", "File_Name": "x.pdf", "Created_By": {"name": "Sam"}}]}),
                ))
            } else {
                Ok(binary_response(b"bytes", "application/pdf", "attachment"))
            }
        }));
        let crm = service(&transport);

        let list = crm.list_attachments("Deals", "5").await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(
            list[0].download_url.as_deref(),
            Some("https://gateway.test/api/get-attachment?module=Deals&record_id=5&attachment_id=a1")
        );

        let file = crm.get_attachment("Deals", "5", "a1").await.unwrap();
        assert_eq!(file.file_name, "attachment_a1");
        assert_eq!(file.content_type, "application/pdf");
    }

    #[tokio::test]
    async fn test_send_email_sender() {
        let transport = Arc::new(FakeTransport::new(|_| {
            Ok(json_response(200, json!({"data": [{"code": "SUCCESS"}]})))
        }));
        let crm = service(&transport);

        crm.send_email("a@example.com", "Hi", "Body", None).await.unwrap();
        crm.send_email("a@example.com", "Hi", "Body", Some(&json!("me@example.com")))
            .await
            .unwrap();

        let calls = transport.api_calls();
        let from = |i: usize| match &calls[i].body {
            RequestBody::Json(body) => body["from"].clone(),
            _ => Value::Null,
        };
        assert_eq!(from(0), json!({"user_name": "assistant@example.com"}));
        assert_eq!(from(1), json!({"email": "me@example.com"}));
        assert_eq!(calls[0].url, "https://api.test/crm/v2/Emails/actions/send");
    }

    #[tokio::test]
    async fn test_search_by_tag_per_module_outcomes() {
        let transport = Arc::new(FakeTransport::new(|req| {
            if req.url.contains("/Leads/") {
                Ok(json_response(200, json!({"data": [{"id": "1"}, {"id": "2"}]})))
            } else if req.url.contains("/Contacts/") {
                Ok(json_response(400, json!({"code": "INVALID_QUERY"})))
            } else {
                Err(network_error())
            }
        }));
        let crm = service(&transport);
        let modules: Vec<String> = DEFAULT_TAG_MODULES.iter().map(|m| m.to_string()).collect();

        let result = crm.search_by_tag("vip", &modules).await.unwrap();
        assert_eq!(result.total_count, 2);
        assert_eq!(result.results["Leads"].count, Some(2));
        assert_eq!(result.results["Contacts"].count, Some(0));
        assert!(!result.results["Tasks"].success);
        assert_eq!(transport.token_calls(), 1);
        assert_eq!(
            transport.api_calls()[0].query_value("criteria"),
            Some("(Tag:equals:vip)")
        );
    }
}
