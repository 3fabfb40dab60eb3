use crate::error::{AppError, AppResult};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use validator::{Validate, ValidationError};

/// Default and upper bound for a caller-supplied `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitSpec {
    pub default: u32,
    pub max: u32,
}

pub const CRM_SEARCH_LIMIT: LimitSpec = LimitSpec::new(10, 50);
pub const WORKDRIVE_SEARCH_LIMIT: LimitSpec = LimitSpec::new(20, 200);
pub const WORKDRIVE_LIST_LIMIT: LimitSpec = LimitSpec::new(50, 200);

impl LimitSpec {
    pub const fn new(default: u32, max: u32) -> Self {
        Self { default, max }
    }

    /// Missing or non-numeric values take the default; numbers are clamped
    /// into `[1, max]`.
    pub fn clamp(&self, raw: Option<&str>) -> u32 {
        let Some(parsed) = raw.and_then(|v| v.trim().parse::<i64>().ok()) else {
            return self.default;
        };
        parsed.clamp(1, i64::from(self.max)) as u32
    }
}

/// Offsets below zero or that fail to parse read as zero.
pub fn parse_offset(raw: Option<&str>) -> u32 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .map(|n| n.clamp(0, i64::from(u32::MAX)) as u32)
        .unwrap_or(0)
}

/// `"true"` (any case) or `"1"`; everything else is false.
pub fn parse_flag(raw: Option<&str>) -> bool {
    raw.map(|v| {
        let v = v.trim();
        v.eq_ignore_ascii_case("true") || v == "1"
    })
    .unwrap_or(false)
}

/// CRM modules accepted by the record, notes and communications operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrmModule {
    Contacts,
    Leads,
    Deals,
    Accounts,
}

impl CrmModule {
    pub const ALL: [CrmModule; 4] = [
        CrmModule::Contacts,
        CrmModule::Leads,
        CrmModule::Deals,
        CrmModule::Accounts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CrmModule::Contacts => "Contacts",
            CrmModule::Leads => "Leads",
            CrmModule::Deals => "Deals",
            CrmModule::Accounts => "Accounts",
        }
    }
}

impl fmt::Display for CrmModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CrmModule {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        CrmModule::ALL
            .into_iter()
            .find(|m| m.as_str() == value.trim())
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "Invalid module. Must be one of: {}",
                    CrmModule::ALL.map(|m| m.as_str()).join(", ")
                ))
            })
    }
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(invalid("blank", "must not be empty"));
    }
    Ok(())
}

pub fn crm_module(value: &str) -> Result<(), ValidationError> {
    value
        .parse::<CrmModule>()
        .map(|_| ())
        .map_err(|_| invalid("crm_module", "Invalid module. Must be one of: Contacts, Leads, Deals, Accounts"))
}

/// Any API module name: letters, digits and underscores only.
pub fn module_name(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid("module_name", "Invalid module name"));
    }
    Ok(())
}

pub fn module_names(values: &[String]) -> Result<(), ValidationError> {
    values.iter().try_for_each(|m| module_name(m))
}

/// Identifiers interpolated into upstream URL paths.
pub fn path_segment(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty()
        || value.contains(['/', '\\', '?', '#'])
        || value.contains("..")
        || value.chars().any(char::is_control)
    {
        return Err(invalid("path_segment", "Invalid identifier"));
    }
    Ok(())
}

/// Run the declarative checks on a request, joining failures into one
/// message.
pub fn validate_request<T: Validate>(request: &T) -> AppResult<()> {
    request.validate().map_err(|errors| {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let field = field.to_string();
                errs.iter()
                    .map(move |e| match &e.message {
                        Some(message) => message.to_string(),
                        None => format!("{} is invalid", field),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        messages.sort();
        messages.dedup();
        AppError::Validation(messages.join("; "))
    })
}

/// Trimmed value of a field that has already passed validation.
pub fn field(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}
