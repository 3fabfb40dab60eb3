/// Response Normalizer
/// Projects heterogeneous upstream records onto the shapes returned to
/// callers. Field resolution is table driven: each field lists the JSON
/// pointers to probe, in order, and the first present value wins.
use crate::models::activity::{
    ActivityBuckets, ActivityKind, CallActivity, EmailActivity, EventActivity, OtherActivity,
    TaskActivity,
};
use crate::models::{AttachmentSummary, CanonicalItem, ItemField};
use serde_json::Value;

pub struct FieldRule {
    pub field: ItemField,
    pub probes: &'static [&'static str],
}

pub const ITEM_ID_PROBES: &[&str] = &["/id", "/attributes/resource_id"];

pub const ITEM_FIELD_RULES: &[FieldRule] = &[
    FieldRule {
        field: ItemField::Name,
        probes: &["/attributes/name", "/attributes/display_name"],
    },
    FieldRule {
        field: ItemField::Type,
        probes: &["/attributes/type", "/type"],
    },
    FieldRule {
        field: ItemField::ParentId,
        probes: &["/attributes/parent_id", "/attributes/parent/id"],
    },
    FieldRule {
        field: ItemField::Path,
        probes: &["/attributes/path_display", "/attributes/display_path"],
    },
    FieldRule {
        field: ItemField::Size,
        probes: &[
            "/attributes/content_info/size",
            "/attributes/storage_info/size_in_bytes",
        ],
    },
    FieldRule {
        field: ItemField::MimeType,
        probes: &["/attributes/content_info/mime_type"],
    },
    FieldRule {
        field: ItemField::Owner,
        probes: &[
            "/attributes/owner_info/display_name",
            "/attributes/owner_info/name",
            "/attributes/created_by/display_name",
            "/attributes/created_by/name",
        ],
    },
    FieldRule {
        field: ItemField::CreatedTime,
        probes: &["/attributes/created_time", "/attributes/created_at"],
    },
    FieldRule {
        field: ItemField::ModifiedTime,
        probes: &[
            "/attributes/modified_time",
            "/attributes/recent_activity/modified_time",
        ],
    },
    FieldRule {
        field: ItemField::Version,
        probes: &[
            "/attributes/version_info/version_number",
            "/attributes/version_info/number",
        ],
    },
    FieldRule {
        field: ItemField::Checksum,
        probes: &["/attributes/content_info/checksum"],
    },
    FieldRule {
        field: ItemField::PreviewUrl,
        probes: &["/attributes/content_info/preview_url"],
    },
];

/// First probe that resolves to a non-null scalar. Empty strings count as
/// absent.
fn probe<'a>(raw: &'a Value, probes: &[&str]) -> Option<&'a Value> {
    probes.iter().find_map(|pointer| match raw.pointer(pointer) {
        Some(Value::String(s)) if s.is_empty() => None,
        Some(v @ (Value::String(_) | Value::Number(_) | Value::Bool(_))) => Some(v),
        _ => None,
    })
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl CanonicalItem {
    fn assign(&mut self, field: ItemField, value: &Value) {
        match field {
            ItemField::Name => self.name = Some(as_text(value)),
            ItemField::Type => self.item_type = Some(as_text(value)),
            ItemField::ParentId => self.parent_id = Some(as_text(value)),
            ItemField::Path => self.path = Some(as_text(value)),
            ItemField::Size => self.size = Some(value.clone()),
            ItemField::MimeType => self.mime_type = Some(as_text(value)),
            ItemField::Owner => self.owner = Some(as_text(value)),
            ItemField::CreatedTime => self.created_time = Some(as_text(value)),
            ItemField::ModifiedTime => self.modified_time = Some(as_text(value)),
            ItemField::Version => self.version = Some(value.clone()),
            ItemField::Checksum => self.checksum = Some(as_text(value)),
            ItemField::PreviewUrl => self.preview_url = Some(as_text(value)),
        }
    }
}

/// Gateway link that streams a WorkDrive file through `/proxy-download`.
pub fn proxy_download_url(public_base_url: &str, file_id: &str) -> String {
    format!(
        "{}/proxy-download?fileId={}",
        public_base_url,
        urlencoding::encode(file_id)
    )
}

/// Normalize one WorkDrive record. `None` for null or non-object input.
///
/// `download_url` always points at the gateway, never at upstream, since
/// upstream links can embed short-lived tokens.
pub fn normalize_item(raw: &Value, public_base_url: &str) -> Option<CanonicalItem> {
    if !raw.is_object() {
        return None;
    }

    let mut item = CanonicalItem {
        id: probe(raw, ITEM_ID_PROBES).map(as_text),
        ..CanonicalItem::default()
    };
    for rule in ITEM_FIELD_RULES {
        if let Some(value) = probe(raw, rule.probes) {
            item.assign(rule.field, value);
        }
    }
    item.download_url = item
        .id
        .as_deref()
        .map(|id| proxy_download_url(public_base_url, id));

    Some(item)
}

/// Normalize the `data` array of a WorkDrive list/search response, skipping
/// entries that are not records.
pub fn normalize_items(data: &Value, public_base_url: &str) -> Vec<CanonicalItem> {
    data.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|raw| normalize_item(raw, public_base_url))
                .collect()
        })
        .unwrap_or_default()
}

fn field(raw: &Value, pointer: &str) -> Value {
    raw.pointer(pointer).cloned().unwrap_or(Value::Null)
}

fn first_field(raw: &Value, pointers: &[&str]) -> Value {
    pointers
        .iter()
        .map(|p| field(raw, p))
        .find(|v| !v.is_null())
        .unwrap_or(Value::Null)
}

/// Partition CRM activities by `$se_module`, in a single pass and keeping
/// input order within each bucket.
pub fn classify_activities(raw_list: &[Value]) -> ActivityBuckets {
    let mut buckets = ActivityBuckets::default();

    for activity in raw_list {
        let discriminator = activity.get("$se_module").and_then(Value::as_str);
        match discriminator.and_then(ActivityKind::from_discriminator) {
            Some(ActivityKind::Email) => buckets.emails.push(EmailActivity {
                id: field(activity, "/id"),
                subject: field(activity, "/Subject"),
                from: field(activity, "/From"),
                to: field(activity, "/To"),
                cc: field(activity, "/CC"),
                date: first_field(activity, &["/Sent_Time", "/Created_Time"]),
                content: field(activity, "/Content"),
                status: field(activity, "/Mail_Status"),
            }),
            Some(ActivityKind::Call) => buckets.calls.push(CallActivity {
                id: field(activity, "/id"),
                subject: field(activity, "/Subject"),
                call_type: field(activity, "/Call_Type"),
                call_duration: field(activity, "/Call_Duration"),
                call_start_time: field(activity, "/Call_Start_Time"),
                description: field(activity, "/Description"),
                owner: field(activity, "/Owner/name"),
            }),
            Some(ActivityKind::Task) => buckets.tasks.push(TaskActivity {
                id: field(activity, "/id"),
                subject: field(activity, "/Subject"),
                status: field(activity, "/Status"),
                priority: field(activity, "/Priority"),
                due_date: field(activity, "/Due_Date"),
                description: field(activity, "/Description"),
            }),
            Some(ActivityKind::Event) => buckets.events.push(EventActivity {
                id: field(activity, "/id"),
                title: field(activity, "/Event_Title"),
                start_datetime: field(activity, "/Start_DateTime"),
                end_datetime: field(activity, "/End_DateTime"),
                location: field(activity, "/Venue"),
                description: field(activity, "/Description"),
            }),
            None => buckets.other.push(OtherActivity {
                id: field(activity, "/id"),
                activity_type: field(activity, "/$se_module"),
                record: activity.clone(),
            }),
        }
    }

    buckets
}

/// Project CRM attachment records, pointing downloads at the gateway.
pub fn summarize_attachments(
    raw_list: &[Value],
    public_base_url: &str,
    module: &str,
    record_id: &str,
) -> Vec<AttachmentSummary> {
    raw_list
        .iter()
        .map(|att| {
            let id = field(att, "/id");
            let download_url = id.as_str().map(str::to_string).or_else(|| {
                id.as_u64().map(|n| n.to_string())
            });
            AttachmentSummary {
                file_name: field(att, "/File_Name"),
                size: field(att, "/Size"),
                file_type: field(att, "/$file_type"),
                created_time: field(att, "/Created_Time"),
                created_by: field(att, "/Created_By/name"),
                download_url: download_url.map(|attachment_id| {
                    format!(
                        "{}/api/get-attachment?module={}&record_id={}&attachment_id={}",
                        public_base_url,
                        urlencoding::encode(module),
                        urlencoding::encode(record_id),
                        urlencoding::encode(&attachment_id)
                    )
                }),
                id,
            }
        })
        .collect()
}
