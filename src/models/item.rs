use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A WorkDrive file or folder, in the shape returned to callers regardless of
/// which upstream variant it came from. Unresolved fields serialize as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalItem {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub parent_id: Option<String>,
    pub path: Option<String>,
    pub size: Option<Value>,
    pub mime_type: Option<String>,
    pub owner: Option<String>,
    pub created_time: Option<String>,
    pub modified_time: Option<String>,
    pub version: Option<Value>,
    pub checksum: Option<String>,
    pub preview_url: Option<String>,
    pub download_url: Option<String>,
}

/// Canonical fields filled from upstream probes. `id` and `download_url` are
/// handled separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemField {
    Name,
    Type,
    ParentId,
    Path,
    Size,
    MimeType,
    Owner,
    CreatedTime,
    ModifiedTime,
    Version,
    Checksum,
    PreviewUrl,
}

/// CRM attachment metadata with a gateway download link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachmentSummary {
    pub id: Value,
    pub file_name: Value,
    pub size: Value,
    #[serde(rename = "type")]
    pub file_type: Value,
    pub created_time: Value,
    pub created_by: Value,
    pub download_url: Option<String>,
}
