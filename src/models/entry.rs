//! Captured entries: an arbitrary JSON payload against a form, plus attachments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Payload key whose string / string-list value names already-hosted files.
pub const HOSTED_FILES_KEY: &str = "file_urls";

/// Payload keys filled from the optional bank side-channel fields.
pub const BANK_NAME_KEY: &str = "bank_name";
pub const BANK_ACCOUNT_NUMBER_KEY: &str = "bank_account_number";

/// Payload key the mode filter matches against.
pub const MODE_KEY: &str = "mode";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InflowEntry {
    pub id: i64,
    pub company_id: i64,
    pub form_id: i64,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct EntryAttachment {
    pub id: i64,
    pub entry_id: i64,
    pub file_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryWithAttachments {
    #[serde(flatten)]
    pub entry: InflowEntry,
    pub attachments: Vec<EntryAttachment>,
}

/// One attachment input, before reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentSource {
    /// Bytes sent with the request, still to be uploaded.
    DeviceFile { file_name: String, bytes: Vec<u8> },
    /// A URL or key of an object that is already in the store.
    HostedReference(String),
}

/// JSON body of the URL-only create variant.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEntryJson {
    pub company_id: i64,
    pub form_id: i64,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub file_urls: Vec<String>,
}

/// A device file whose upload failed.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FailedUpload {
    pub file_name: String,
    pub error: String,
}

/// Outcome of an entry creation. Counts and attachments are authoritative;
/// `message` is a human-readable summary.
#[derive(Debug, Clone, Serialize)]
pub struct EntryResult {
    pub entry: EntryWithAttachments,
    pub uploaded_count: usize,
    pub linked_count: usize,
    pub skipped_files: Vec<String>,
    pub failed_files: Vec<FailedUpload>,
    pub message: String,
}

/// Query filters for listing entries.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EntryFilters {
    pub company_id: Option<i64>,
    pub form_id: Option<i64>,
    pub mode: Option<String>,
}

/// Body of the regenerate-by-URL call.
#[derive(Debug, Clone, Deserialize)]
pub struct PresignRequest {
    pub url: String,
}

/// An attachment whose URL was just re-issued.
#[derive(Debug, Clone, Serialize)]
pub struct RegeneratedAttachment {
    #[serde(flatten)]
    pub attachment: EntryAttachment,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Result of deleting an attachment row and its object.
#[derive(Debug, Clone, Serialize)]
pub struct DeletedAttachment {
    pub attachment: EntryAttachment,
    pub object_deleted: bool,
}
