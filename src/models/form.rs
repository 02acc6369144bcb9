//! Dynamic form definitions: flow direction, payment mode and typed custom fields.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

use super::validate_not_blank;

// -- Enums matching PostgreSQL --

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "form_flow_type", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum FlowType {
    Inflow,
    Outflow,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "form_mode", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum InflowMode {
    Bank,
    Cash,
    Upi,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "form_field_type", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Spinner,
    Textarea,
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inflow => write!(f, "INFLOW"),
            Self::Outflow => write!(f, "OUTFLOW"),
        }
    }
}

impl fmt::Display for InflowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bank => write!(f, "BANK"),
            Self::Cash => write!(f, "CASH"),
            Self::Upi => write!(f, "UPI"),
        }
    }
}

// -- Rows --

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InflowForm {
    pub id: i64,
    pub flow_type: FlowType,
    pub mode: InflowMode,
    pub source: String,
    /// Whether entries against this form are expected to carry attachments.
    pub attachment: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FormField {
    pub id: i64,
    pub form_id: i64,
    pub field_key: String,
    pub label: String,
    pub field_type: FieldType,
    pub is_required: bool,
    pub options: Option<serde_json::Value>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

/// Form plus its fields ordered by (sort_order, id).
#[derive(Debug, Clone, Serialize)]
pub struct FormWithFields {
    #[serde(flatten)]
    pub form: InflowForm,
    pub fields: Vec<FormField>,
}

// -- Requests --

static FIELD_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"));

fn validate_field_key(key: &str) -> Result<(), ValidationError> {
    if FIELD_KEY_RE.is_match(key) {
        Ok(())
    } else {
        let mut err = ValidationError::new("field_key");
        err.message = Some(
            format!("'{key}' must start with a letter or underscore and contain only letters, digits and underscores")
                .into(),
        );
        Err(err)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateField {
    #[validate(length(min = 1, max = 100), custom(function = "validate_field_key"))]
    pub field_key: String,
    #[validate(length(min = 1, max = 150), custom(function = "validate_not_blank"))]
    pub label: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub is_required: bool,
    pub options: Option<serde_json::Value>,
    /// Position among the form's fields; appended after the last one when omitted.
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateForm {
    pub flow_type: FlowType,
    pub mode: InflowMode,
    #[validate(length(min = 1, max = 150), custom(function = "validate_not_blank"))]
    pub source: String,
    #[serde(default)]
    pub attachment: bool,
    #[serde(default)]
    #[validate(nested)]
    pub custom_fields: Vec<CreateField>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Validate)]
pub struct UpdateForm {
    pub flow_type: Option<FlowType>,
    pub mode: Option<InflowMode>,
    #[validate(length(min = 1, max = 150), custom(function = "validate_not_blank"))]
    pub source: Option<String>,
    pub attachment: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Validate)]
pub struct UpdateField {
    #[validate(length(min = 1, max = 100), custom(function = "validate_field_key"))]
    pub field_key: Option<String>,
    #[validate(length(min = 1, max = 150), custom(function = "validate_not_blank"))]
    pub label: Option<String>,
    pub field_type: Option<FieldType>,
    pub is_required: Option<bool>,
    pub options: Option<serde_json::Value>,
    pub sort_order: Option<i32>,
}

/// Query filters for listing forms.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FormFilters {
    pub flow_type: Option<FlowType>,
    pub mode: Option<InflowMode>,
}

/// Required `(flow_type, mode)` pair for the latest-form lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct FormPair {
    pub flow_type: FlowType,
    pub mode: InflowMode,
}
