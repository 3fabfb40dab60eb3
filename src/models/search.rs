use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One page of search results, capped at the effective limit so responses
/// stay small enough for a model's context window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage<T> {
    pub items: Vec<T>,
    pub count: usize,
    pub total: usize,
    pub has_more: bool,
    pub message: Option<String>,
}

impl<T> SearchPage<T> {
    /// `total` is the number of matches upstream reported, `upstream_more`
    /// whether upstream itself has further pages.
    pub fn new(mut items: Vec<T>, total: usize, limit: u32, upstream_more: bool) -> Self {
        let limit = limit as usize;
        items.truncate(limit);
        let total = total.max(items.len());
        let has_more = total > limit || upstream_more;
        let count = items.len();

        let message = has_more.then(|| {
            format!(
                "Showing {} of {} results. Narrow your search term to see more specific matches.",
                count,
                if upstream_more && total <= limit {
                    format!("more than {}", total)
                } else {
                    total.to_string()
                }
            )
        });

        Self {
            items,
            count,
            total,
            has_more,
            message,
        }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            total: 0,
            has_more: false,
            message: None,
        }
    }
}

impl<T: Serialize> SearchPage<T> {
    /// Success envelope with the items under `data`.
    pub fn to_envelope(&self) -> Value {
        let mut body = json!({
            "success": true,
            "data": self.items,
            "count": self.count,
            "total": self.total,
            "has_more": self.has_more,
        });
        if let Some(message) = &self.message {
            body["message"] = json!(message);
        }
        body
    }
}
