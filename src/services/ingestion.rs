//! Entry ingestion: validates references, reconciles attachments and persists
//! an entry with its attachment rows as one unit of work.
//!
//! Device files are uploaded before the transaction opens, concurrently, and
//! only successful uploads get an attachment row. A failed upload is reported
//! in the result and never aborts the entry. Hosted references (already in the
//! store) are linked without an upload call.

use futures::future::join_all;
use serde_json::{Map, Value};
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::entry::{
    AttachmentSource, CreateEntryJson, EntryResult, FailedUpload, BANK_ACCOUNT_NUMBER_KEY,
    BANK_NAME_KEY, HOSTED_FILES_KEY,
};
use crate::services::{company, entry, form};
use crate::storage::StorageGateway;

/// Filenames browsers and mobile clients send for an empty file input.
const PLACEHOLDER_NAMES: [&str; 3] = ["blob", "undefined", "null"];

/// Failed file names listed in the summary before it switches to "and N more".
const MAX_NAMED_FAILURES: usize = 3;

/// Everything needed to create one entry.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub company_id: i64,
    pub form_id: i64,
    pub payload: Value,
    pub bank_name: Option<String>,
    pub bank_account_number: Option<String>,
    pub attachments: Vec<AttachmentSource>,
}

impl From<CreateEntryJson> for NewEntry {
    fn from(body: CreateEntryJson) -> Self {
        Self {
            company_id: body.company_id,
            form_id: body.form_id,
            payload: body.payload,
            bank_name: None,
            bank_account_number: None,
            attachments: body
                .file_urls
                .into_iter()
                .map(AttachmentSource::HostedReference)
                .collect(),
        }
    }
}

/// What happened to one attachment source.
#[derive(Debug, Clone, PartialEq)]
enum Outcome {
    Uploaded(String),
    Linked(String),
    Skipped(String),
    Failed(FailedUpload),
    Ignored,
}

/// Attachment reconciliation result, in input order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Reconciliation {
    /// URLs to persist as attachment rows, in input order.
    pub urls: Vec<String>,
    /// URLs of objects uploaded by this request (cleanup candidates on rollback).
    pub uploaded_urls: Vec<String>,
    pub linked_count: usize,
    pub skipped: Vec<String>,
    pub failed: Vec<FailedUpload>,
}

impl Reconciliation {
    pub fn uploaded_count(&self) -> usize {
        self.uploaded_urls.len()
    }

    pub fn attached_count(&self) -> usize {
        self.urls.len()
    }

    /// Files the caller actually supplied (placeholders excluded).
    pub fn supplied_count(&self) -> usize {
        self.attached_count() + self.failed.len() + self.skipped.len()
    }
}

/// Create an entry from a multipart submission or a JSON body.
pub async fn create_entry(
    pool: &PgPool,
    storage: &StorageGateway,
    request: NewEntry,
) -> Result<EntryResult, AppError> {
    let NewEntry {
        company_id,
        form_id,
        payload,
        bank_name,
        bank_account_number,
        attachments,
    } = request;

    // 1. Referential checks, before anything is written.
    if !company::exists(pool, company_id).await? {
        return Err(AppError::NotFound(format!("Company {company_id} not found")));
    }
    if !form::exists(pool, form_id).await? {
        return Err(AppError::NotFound(format!("Form {form_id} not found")));
    }

    // 2. Payload shape.
    let mut payload = ensure_object(payload)?;

    // 3. Side-channel bank details.
    merge_bank_details(&mut payload, bank_name.as_deref(), bank_account_number.as_deref());

    // 4. Uploads (outside the transaction) and hosted links.
    let sources = normalize_sources(attachments, hosted_references(&payload));
    let folder = format!("inflow/{company_id}/{form_id}");
    let reconciliation = reconcile_attachments(storage, &folder, sources).await;

    // 5. Entry + attachment rows, atomically.
    let payload = Value::Object(payload);
    let entry_id = match persist_entry(pool, company_id, form_id, &payload, &reconciliation.urls).await {
        Ok(id) => id,
        Err(e) => {
            for url in &reconciliation.uploaded_urls {
                if !storage.delete(url).await {
                    tracing::warn!(url = %url, "Orphaned object left after rolled-back entry");
                }
            }
            return Err(e);
        }
    };

    // 6. Respond with what the store actually holds.
    let entry = entry::find_by_id(pool, entry_id).await?;
    let message = summary_message(entry_id, &reconciliation);

    tracing::info!(
        entry_id,
        company_id,
        form_id,
        uploaded = reconciliation.uploaded_count(),
        linked = reconciliation.linked_count,
        failed = reconciliation.failed.len(),
        "Entry created"
    );

    Ok(EntryResult {
        entry,
        uploaded_count: reconciliation.uploaded_count(),
        linked_count: reconciliation.linked_count,
        skipped_files: reconciliation.skipped,
        failed_files: reconciliation.failed,
        message,
    })
}

/// Require a JSON object, naming the actual type otherwise.
pub fn ensure_object(payload: Value) -> Result<Map<String, Value>, AppError> {
    match payload {
        Value::Object(map) => Ok(map),
        other => Err(AppError::BadRequest(format!(
            "payload must be a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Copy non-blank bank details into the payload, overriding payload values.
pub fn merge_bank_details(
    payload: &mut Map<String, Value>,
    bank_name: Option<&str>,
    bank_account_number: Option<&str>,
) {
    for (key, value) in [
        (BANK_NAME_KEY, bank_name),
        (BANK_ACCOUNT_NUMBER_KEY, bank_account_number),
    ] {
        if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
            payload.insert(key.to_string(), Value::String(value.to_string()));
        }
    }
}

/// Hosted file references named by the payload's reserved key.
pub fn hosted_references(payload: &Map<String, Value>) -> Vec<String> {
    let values: Vec<&Value> = match payload.get(HOSTED_FILES_KEY) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single @ Value::String(_)) => vec![single],
        _ => Vec::new(),
    };

    values
        .into_iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
}

/// True for filenames that stand for "no file selected".
pub fn is_placeholder_name(file_name: &str) -> bool {
    let name = file_name.trim();
    name.is_empty() || PLACEHOLDER_NAMES.iter().any(|p| name.eq_ignore_ascii_case(p))
}

/// One ordered source list: device files, then payload references, then
/// explicitly supplied references.
pub fn normalize_sources(
    attachments: Vec<AttachmentSource>,
    payload_references: Vec<String>,
) -> Vec<AttachmentSource> {
    let (device, hosted): (Vec<_>, Vec<_>) = attachments
        .into_iter()
        .partition(|source| matches!(source, AttachmentSource::DeviceFile { .. }));

    device
        .into_iter()
        .chain(payload_references.into_iter().map(AttachmentSource::HostedReference))
        .chain(hosted)
        .collect()
}

/// Upload device files concurrently and link hosted references, keeping input order.
pub async fn reconcile_attachments(
    storage: &StorageGateway,
    folder: &str,
    sources: Vec<AttachmentSource>,
) -> Reconciliation {
    let outcomes = join_all(
        sources
            .into_iter()
            .map(|source| resolve_source(storage, folder, source)),
    )
    .await;

    let mut result = Reconciliation::default();
    for outcome in outcomes {
        match outcome {
            Outcome::Uploaded(url) => {
                result.uploaded_urls.push(url.clone());
                result.urls.push(url);
            }
            Outcome::Linked(url) => {
                result.linked_count += 1;
                result.urls.push(url);
            }
            Outcome::Skipped(name) => result.skipped.push(name),
            Outcome::Failed(failure) => result.failed.push(failure),
            Outcome::Ignored => {}
        }
    }
    result
}

async fn resolve_source(storage: &StorageGateway, folder: &str, source: AttachmentSource) -> Outcome {
    match source {
        AttachmentSource::HostedReference(url) => {
            let url = url.trim();
            if url.is_empty() {
                Outcome::Ignored
            } else {
                Outcome::Linked(url.to_string())
            }
        }
        AttachmentSource::DeviceFile { file_name, .. } if is_placeholder_name(&file_name) => {
            Outcome::Ignored
        }
        AttachmentSource::DeviceFile { file_name, bytes } if bytes.is_empty() => {
            tracing::debug!(file_name = %file_name, "Skipping empty file");
            Outcome::Skipped(file_name)
        }
        AttachmentSource::DeviceFile { file_name, bytes } => {
            match storage.upload(bytes, &file_name, folder).await {
                Ok(issued) => Outcome::Uploaded(issued.url),
                Err(e) => {
                    tracing::warn!(file_name = %file_name, error = %e, "Attachment upload failed");
                    Outcome::Failed(FailedUpload {
                        file_name,
                        error: e.to_string(),
                    })
                }
            }
        }
    }
}

/// Insert the entry and its attachment rows in one transaction.
async fn persist_entry(
    pool: &PgPool,
    company_id: i64,
    form_id: i64,
    payload: &Value,
    urls: &[String],
) -> Result<i64, AppError> {
    let mut tx = pool.begin().await?;

    let entry_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO inflow_entries (company_id, form_id, payload) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(company_id)
    .bind(form_id)
    .bind(payload)
    .fetch_one(&mut *tx)
    .await?;

    for url in urls {
        sqlx::query("INSERT INTO entry_attachments (entry_id, file_url) VALUES ($1, $2)")
            .bind(entry_id)
            .bind(url)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(entry_id)
}

/// Human-readable summary of an entry creation.
pub fn summary_message(entry_id: i64, reconciliation: &Reconciliation) -> String {
    let mut parts = vec![format!("Entry {entry_id} created.")];

    let attached = reconciliation.attached_count();
    if attached > 0 {
        parts.push(format!(
            "{attached} file(s) attached ({} uploaded, {} linked).",
            reconciliation.uploaded_count(),
            reconciliation.linked_count
        ));
    }

    if !reconciliation.failed.is_empty() {
        let names: Vec<&str> = reconciliation
            .failed
            .iter()
            .take(MAX_NAMED_FAILURES)
            .map(|f| f.file_name.as_str())
            .collect();
        let mut listed = names.join(", ");
        let remaining = reconciliation.failed.len().saturating_sub(MAX_NAMED_FAILURES);
        if remaining > 0 {
            listed.push_str(&format!(" and {remaining} more"));
        }
        parts.push(format!(
            "{} file(s) failed to upload: {listed}.",
            reconciliation.failed.len()
        ));
    }

    if !reconciliation.skipped.is_empty() {
        parts.push(format!("{} empty file(s) skipped.", reconciliation.skipped.len()));
    }

    let supplied = reconciliation.supplied_count();
    if supplied > 0 && attached == 0 {
        parts.push(format!(
            "Warning: {supplied} file(s) were supplied but none could be attached."
        ));
    }

    parts.join(" ")
}
