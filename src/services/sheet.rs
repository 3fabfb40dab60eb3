/// Sheet gateway operation
/// Reads spreadsheet data and keeps the last successful read in a single
/// cache slot, which doubles as the fallback when upstream is unavailable.
use super::token_manager::TokenManager;
use super::transport::{HttpTransport, UpstreamRequest};
use crate::cache_manager::{Lookup, TtlCache};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const SLOT: &str = "sheet";

/// What to read from a workbook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetRequest {
    pub resource_id: String,
    pub worksheet: Option<String>,
    pub range: Option<String>,
    pub refresh: bool,
}

impl SheetRequest {
    /// Upstream method plus its extra form fields.
    fn method_fields(&self) -> Vec<(String, String)> {
        let mut fields = Vec::new();
        match (&self.worksheet, &self.range) {
            (Some(worksheet), Some(range)) => {
                fields.push(("method".into(), "range.content.get".into()));
                fields.push(("worksheet_name".into(), worksheet.clone()));
                fields.push(("range".into(), range.clone()));
            }
            (Some(worksheet), None) => {
                fields.push(("method".into(), "worksheet.content.get".into()));
                fields.push(("worksheet_name".into(), worksheet.clone()));
            }
            _ => fields.push(("method".into(), "workbook.data.get".into())),
        }
        fields
    }
}

#[derive(Debug, Clone)]
pub struct SheetSnapshot {
    pub resource_id: String,
    pub worksheet: Option<String>,
    pub range: Option<String>,
    pub data: Value,
}

impl SheetSnapshot {
    fn matches(&self, request: &SheetRequest) -> bool {
        self.resource_id == request.resource_id
            && self.worksheet == request.worksheet
            && self.range == request.range
    }
}

#[derive(Debug, Clone)]
pub struct SheetRead {
    pub resource_id: String,
    pub data: Value,
    pub cached: bool,
    pub cache_age: Option<Duration>,
    pub stale: bool,
}

impl SheetRead {
    pub fn to_envelope(&self) -> Value {
        let mut body = json!({
            "success": true,
            "data": self.data,
            "resourceId": self.resource_id,
            "cached": self.cached,
        });
        if let Some(age) = self.cache_age {
            body["cacheAge"] = json!(format!("{}s", age.as_secs()));
        }
        if self.stale {
            body["stale"] = json!(true);
            body["error"] = json!("Using stale cache due to fetch error");
        }
        body
    }
}

pub struct SheetService {
    tokens: TokenManager,
    transport: Arc<dyn HttpTransport>,
    cache: TtlCache<SheetSnapshot>,
}

impl SheetService {
    pub fn new(config: &Config, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            tokens: TokenManager::new("Zoho Sheet", config.sheet.clone(), transport.clone()),
            transport,
            cache: TtlCache::new(config.cache_ttl),
        }
    }

    pub async fn read(&self, request: SheetRequest) -> AppResult<SheetRead> {
        if !request.refresh {
            if let Lookup::Fresh(entry) = self.cache.lookup(SLOT).await {
                if entry.payload.matches(&request) {
                    debug!("Sheet cache hit for {}", request.resource_id);
                    return Ok(SheetRead {
                        resource_id: request.resource_id,
                        cache_age: Some(entry.age()),
                        data: entry.payload.data,
                        cached: true,
                        stale: false,
                    });
                }
            }
        }

        match self.fetch(&request).await {
            Ok(data) => {
                self.cache
                    .set(
                        SLOT,
                        SheetSnapshot {
                            resource_id: request.resource_id.clone(),
                            worksheet: request.worksheet.clone(),
                            range: request.range.clone(),
                            data: data.clone(),
                        },
                    )
                    .await;
                info!("Sheet {} fetched and cached", request.resource_id);
                Ok(SheetRead {
                    resource_id: request.resource_id,
                    data,
                    cached: false,
                    cache_age: None,
                    stale: false,
                })
            }
            Err(e) => match self.cache.lookup(SLOT).await {
                Lookup::Fresh(entry) | Lookup::Stale(entry) if entry.payload.matches(&request) => {
                    warn!(
                        "Serving stale sheet data for {} after fetch error: {}",
                        request.resource_id, e
                    );
                    Ok(SheetRead {
                        resource_id: request.resource_id,
                        cache_age: Some(entry.age()),
                        data: entry.payload.data,
                        cached: true,
                        stale: true,
                    })
                }
                _ => Err(e),
            },
        }
    }

    async fn fetch(&self, request: &SheetRequest) -> AppResult<Value> {
        let authorization = self.tokens.authorization().await?;
        let url = format!(
            "{}/api/v2/{}",
            self.tokens.credentials().api_domain,
            request.resource_id
        );
        let upstream = UpstreamRequest::post(url)
            .header("Authorization", authorization)
            .form(request.method_fields());

        let body = self
            .transport
            .execute(upstream)
            .await?
            .error_for_status("Failed to fetch sheet data")?
            .json_value();

        // Sheet reports some failures in a 200 body.
        if body.get("status").and_then(Value::as_str) == Some("failure") {
            return Err(AppError::Upstream {
                status: 200,
                message: "Failed to fetch sheet data".into(),
                details: Some(body),
            });
        }
        Ok(body)
    }
}
