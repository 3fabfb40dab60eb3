use axum::{
    extract::{Query, State},
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::WithRejection;
use serde_json::{json, Value};
use std::sync::Arc;

use super::method_not_allowed;
use crate::error::{AppError, AppResult};
use crate::models::{
    AddNoteRequest, AttachmentListRequest, AttachmentRequest, Disposition, DownloadedFile,
    RecordQuery, SearchQuery, SendEmailRequest, TagSearchRequest,
};
use crate::services::crm::{TagSearchResult, DEFAULT_TAG_MODULES};
use crate::utils::validation::{field, validate_request, CrmModule, CRM_SEARCH_LIMIT};
use crate::AppState;

pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/search-contact",
            get(search_contact).fallback(method_not_allowed),
        )
        .route(
            "/api/search-lead",
            get(search_lead).fallback(method_not_allowed),
        )
        .route("/api/get-record", get(get_record).fallback(method_not_allowed))
        .route("/api/get-notes", get(get_notes).fallback(method_not_allowed))
        .route("/api/add-note", post(add_note).fallback(method_not_allowed))
        .route(
            "/api/get-communications",
            get(get_communications).fallback(method_not_allowed),
        )
        .route(
            "/api/list-attachments",
            get(list_attachments_query)
                .post(list_attachments_json)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/get-attachment",
            get(get_attachment_query)
                .post(get_attachment_json)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/attachment-download",
            get(download_attachment_query)
                .post(download_attachment_json)
                .fallback(method_not_allowed),
        )
        .route("/api/send-email", post(send_email).fallback(method_not_allowed))
        .route(
            "/api/search-by-tag",
            post(search_by_tag).fallback(method_not_allowed),
        )
}

type QueryOf<T> = WithRejection<Query<T>, AppError>;
type JsonOf<T> = WithRejection<Json<T>, AppError>;

fn parse_module(query: &RecordQuery) -> AppResult<CrmModule> {
    field(&query.module).parse()
}

async fn search_contact(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(query), _): QueryOf<SearchQuery>,
) -> AppResult<Json<Value>> {
    validate_request(&query)?;
    let limit = CRM_SEARCH_LIMIT.clamp(query.limit.as_deref());
    let outcome = state
        .crm
        .search_contacts(&field(&query.search_term), limit)
        .await?;
    Ok(Json(outcome.to_envelope()))
}

async fn search_lead(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(query), _): QueryOf<SearchQuery>,
) -> AppResult<Json<Value>> {
    validate_request(&query)?;
    let limit = CRM_SEARCH_LIMIT.clamp(query.limit.as_deref());
    let outcome = state
        .crm
        .search_leads(&field(&query.search_term), limit)
        .await?;
    Ok(Json(outcome.to_envelope()))
}

async fn get_record(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(query), _): QueryOf<RecordQuery>,
) -> AppResult<Json<Value>> {
    validate_request(&query)?;
    let module = parse_module(&query)?;
    let record = state
        .crm
        .get_record(module, &field(&query.record_id))
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": record,
    })))
}

async fn get_notes(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(query), _): QueryOf<RecordQuery>,
) -> AppResult<Json<Value>> {
    validate_request(&query)?;
    let module = parse_module(&query)?;
    let notes = state.crm.get_notes(module, &field(&query.record_id)).await?;

    Ok(Json(json!({
        "success": true,
        "count": notes.len(),
        "data": notes,
    })))
}

async fn add_note(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(payload), _): JsonOf<AddNoteRequest>,
) -> AppResult<Json<Value>> {
    validate_request(&payload)?;
    let note = state
        .crm
        .add_note(
            &field(&payload.module),
            &field(&payload.record_id),
            payload.note_title.as_deref(),
            &field(&payload.note_content),
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Note added successfully",
        "note_id": note.note_id,
        "data": note.data,
    })))
}

async fn get_communications(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(query), _): QueryOf<RecordQuery>,
) -> AppResult<Json<Value>> {
    validate_request(&query)?;
    let module = parse_module(&query)?;
    let buckets = state
        .crm
        .get_communications(module, &field(&query.record_id))
        .await?;

    let mut body = json!({
        "success": true,
        "count": buckets.counts(),
        "emails": buckets.emails,
        "calls": buckets.calls,
        "tasks": buckets.tasks,
        "events": buckets.events,
        "other": buckets.other,
    });
    if buckets.is_empty() {
        body["message"] = json!("No communications found for this record");
    }
    Ok(Json(body))
}

async fn list_attachments(state: &AppState, request: AttachmentListRequest) -> AppResult<Value> {
    validate_request(&request)?;
    let attachments = state
        .crm
        .list_attachments(&field(&request.module), &field(&request.record_id))
        .await?;

    let mut body = json!({
        "success": true,
        "count": attachments.len(),
        "attachments": attachments,
    });
    if attachments.is_empty() {
        body["message"] = json!("No attachments found for this record");
    }
    Ok(body)
}

async fn list_attachments_query(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(query), _): QueryOf<AttachmentListRequest>,
) -> AppResult<Json<Value>> {
    list_attachments(&state, query).await.map(Json)
}

async fn list_attachments_json(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(payload), _): JsonOf<AttachmentListRequest>,
) -> AppResult<Json<Value>> {
    list_attachments(&state, payload).await.map(Json)
}

async fn fetch_attachment(
    state: &AppState,
    request: AttachmentRequest,
) -> AppResult<DownloadedFile> {
    validate_request(&request)?;
    state
        .crm
        .get_attachment(
            &field(&request.module),
            &field(&request.record_id),
            &field(&request.attachment_id),
        )
        .await
}

async fn get_attachment_query(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(query), _): QueryOf<AttachmentRequest>,
) -> AppResult<Json<Value>> {
    let file = fetch_attachment(&state, query).await?;
    Ok(Json(file.to_base64_envelope()))
}

async fn get_attachment_json(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(payload), _): JsonOf<AttachmentRequest>,
) -> AppResult<Json<Value>> {
    let file = fetch_attachment(&state, payload).await?;
    Ok(Json(file.to_base64_envelope()))
}

async fn download_attachment_query(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(query), _): QueryOf<AttachmentRequest>,
) -> AppResult<Response> {
    let file = fetch_attachment(&state, query).await?;
    Ok(file.into_binary_response(Disposition::Attachment))
}

async fn download_attachment_json(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(payload), _): JsonOf<AttachmentRequest>,
) -> AppResult<Response> {
    let file = fetch_attachment(&state, payload).await?;
    Ok(file.into_binary_response(Disposition::Attachment))
}

async fn send_email(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(payload), _): JsonOf<SendEmailRequest>,
) -> AppResult<Json<Value>> {
    validate_request(&payload)?;
    let result = state
        .crm
        .send_email(
            &field(&payload.to_address),
            &field(&payload.subject),
            &field(&payload.body),
            payload.from_address.as_ref(),
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Email sent successfully",
        "data": result,
    })))
}

async fn search_by_tag(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(payload), _): JsonOf<TagSearchRequest>,
) -> AppResult<Json<TagSearchResult>> {
    validate_request(&payload)?;
    let modules: Vec<String> = match payload.modules {
        Some(modules) if !modules.is_empty() => {
            modules.iter().map(|m| m.trim().to_string()).collect()
        }
        _ => DEFAULT_TAG_MODULES.iter().map(|m| m.to_string()).collect(),
    };

    let result = state
        .crm
        .search_by_tag(&field(&payload.tag), &modules)
        .await?;
    Ok(Json(result))
}
