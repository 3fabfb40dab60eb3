use serde::Serialize;
use serde_json::Value;

/// Activity category, from the upstream `$se_module` discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Email,
    Call,
    Task,
    Event,
}

impl ActivityKind {
    pub fn from_discriminator(value: &str) -> Option<Self> {
        match value {
            "Emails" => Some(ActivityKind::Email),
            "Calls" => Some(ActivityKind::Call),
            "Tasks" => Some(ActivityKind::Task),
            "Events" => Some(ActivityKind::Event),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailActivity {
    pub id: Value,
    pub subject: Value,
    pub from: Value,
    pub to: Value,
    pub cc: Value,
    pub date: Value,
    pub content: Value,
    pub status: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallActivity {
    pub id: Value,
    pub subject: Value,
    pub call_type: Value,
    pub call_duration: Value,
    pub call_start_time: Value,
    pub description: Value,
    pub owner: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskActivity {
    pub id: Value,
    pub subject: Value,
    pub status: Value,
    pub priority: Value,
    pub due_date: Value,
    pub description: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventActivity {
    pub id: Value,
    pub title: Value,
    pub start_datetime: Value,
    pub end_datetime: Value,
    pub location: Value,
    pub description: Value,
}

/// An activity whose discriminator is not one of the known categories. Kept
/// whole so nothing is lost.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OtherActivity {
    pub id: Value,
    pub activity_type: Value,
    pub record: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivityBuckets {
    pub emails: Vec<EmailActivity>,
    pub calls: Vec<CallActivity>,
    pub tasks: Vec<TaskActivity>,
    pub events: Vec<EventActivity>,
    pub other: Vec<OtherActivity>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActivityCounts {
    pub emails: usize,
    pub calls: usize,
    pub tasks: usize,
    pub events: usize,
    pub other: usize,
    /// Emails, calls, tasks and events; `other` is reported on its own.
    pub total: usize,
}

impl ActivityBuckets {
    pub fn counts(&self) -> ActivityCounts {
        let known = self.emails.len() + self.calls.len() + self.tasks.len() + self.events.len();
        ActivityCounts {
            emails: self.emails.len(),
            calls: self.calls.len(),
            tasks: self.tasks.len(),
            events: self.events.len(),
            other: self.other.len(),
            total: known,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts().total == 0 && self.other.is_empty()
    }
}
