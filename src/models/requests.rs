//! Caller-facing request shapes. Field names follow what the assistant's
//! tool schema sends, so several are camelCase on the wire.
use crate::utils::validation::{crm_module, module_name, module_names, not_blank, path_segment};
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SearchQuery {
    #[serde(rename = "searchTerm", alias = "search_term")]
    #[validate(
        required(message = "searchTerm parameter is required"),
        custom(function = "not_blank", message = "searchTerm parameter is required")
    )]
    pub search_term: Option<String>,
    pub limit: Option<String>,
}

/// Module + record id, where the module must be one of the known CRM modules.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecordQuery {
    #[validate(
        required(message = "module parameter is required"),
        custom(function = "crm_module")
    )]
    pub module: Option<String>,
    #[serde(rename = "recordId", alias = "record_id")]
    #[validate(
        required(message = "recordId parameter is required"),
        custom(function = "path_segment", message = "recordId is not a valid identifier")
    )]
    pub record_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddNoteRequest {
    #[validate(
        required(message = "module is required"),
        custom(function = "module_name")
    )]
    pub module: Option<String>,
    #[serde(alias = "recordId")]
    #[validate(
        required(message = "record_id is required"),
        custom(function = "path_segment", message = "record_id is not a valid identifier")
    )]
    pub record_id: Option<String>,
    #[serde(alias = "noteTitle")]
    pub note_title: Option<String>,
    #[serde(alias = "noteContent")]
    #[validate(
        required(message = "note_content is required"),
        custom(function = "not_blank", message = "note_content is required")
    )]
    pub note_content: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AttachmentListRequest {
    #[validate(
        required(message = "module is required"),
        custom(function = "module_name")
    )]
    pub module: Option<String>,
    #[serde(alias = "recordId")]
    #[validate(
        required(message = "record_id is required"),
        custom(function = "path_segment", message = "record_id is not a valid identifier")
    )]
    pub record_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AttachmentRequest {
    #[validate(
        required(message = "module is required"),
        custom(function = "module_name")
    )]
    pub module: Option<String>,
    #[serde(alias = "recordId")]
    #[validate(
        required(message = "record_id is required"),
        custom(function = "path_segment", message = "record_id is not a valid identifier")
    )]
    pub record_id: Option<String>,
    #[serde(alias = "attachmentId")]
    #[validate(
        required(message = "attachment_id is required"),
        custom(function = "path_segment", message = "attachment_id is not a valid identifier")
    )]
    pub attachment_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendEmailRequest {
    #[serde(rename = "toAddress", alias = "to_address")]
    #[validate(
        required(message = "toAddress is required"),
        email(message = "toAddress must be an email address")
    )]
    pub to_address: Option<String>,
    #[validate(
        required(message = "subject is required"),
        custom(function = "not_blank", message = "subject is required")
    )]
    pub subject: Option<String>,
    #[validate(
        required(message = "body is required"),
        custom(function = "not_blank", message = "body is required")
    )]
    pub body: Option<String>,
    /// Either an address string or an upstream sender object.
    #[serde(rename = "fromAddress", alias = "from_address")]
    pub from_address: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TagSearchRequest {
    #[validate(
        required(message = "tag is required"),
        custom(function = "not_blank", message = "tag is required")
    )]
    pub tag: Option<String>,
    #[validate(custom(function = "module_names", message = "modules contains an invalid module name"))]
    pub modules: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct WorkDriveSearchQuery {
    #[validate(
        required(message = "query parameter is required"),
        custom(function = "not_blank", message = "query parameter is required")
    )]
    pub query: Option<String>,
    #[serde(rename = "parentId", alias = "parent_id")]
    #[validate(custom(function = "path_segment", message = "parentId is not a valid identifier"))]
    pub parent_id: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    #[serde(rename = "includeFolders", alias = "include_folders")]
    pub include_folders: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct WorkDriveListQuery {
    #[serde(rename = "parentId", alias = "parent_id")]
    #[validate(custom(function = "path_segment", message = "parentId is not a valid identifier"))]
    pub parent_id: Option<String>,
    pub limit: Option<String>,
    #[serde(rename = "nextToken", alias = "next_token")]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FileQuery {
    #[serde(rename = "fileId", alias = "file_id")]
    #[validate(
        required(message = "fileId parameter is required"),
        custom(function = "path_segment", message = "fileId is not a valid identifier")
    )]
    pub file_id: Option<String>,
    pub inline: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SheetQuery {
    #[serde(rename = "resourceId", alias = "resource_id")]
    #[validate(
        required(message = "Missing required parameter: resourceId (the Zoho Sheet ID)"),
        custom(function = "path_segment", message = "resourceId is not a valid identifier")
    )]
    pub resource_id: Option<String>,
    #[serde(alias = "worksheetName", alias = "worksheet_name")]
    pub worksheet: Option<String>,
    pub range: Option<String>,
    pub refresh: Option<String>,
}
