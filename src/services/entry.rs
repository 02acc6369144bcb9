//! Entry query engine and attachment maintenance.

use std::collections::HashMap;

use sqlx::{PgPool, Postgres};

use crate::errors::AppError;
use crate::models::entry::{
    DeletedAttachment, EntryAttachment, EntryFilters, EntryWithAttachments, InflowEntry,
    RegeneratedAttachment, MODE_KEY,
};
use crate::models::pagination::{PagedResult, Pagination};
use crate::storage::StorageGateway;

/// SQLSTATE for "undefined function/operator".
const UNDEFINED_FUNCTION: &str = "42883";

/// How the payload's mode key is read in SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModeAccessor {
    Operator,
    ExtractPath,
}

impl ModeAccessor {
    fn expr(self) -> String {
        match self {
            Self::Operator => format!("payload ->> '{MODE_KEY}'"),
            Self::ExtractPath => format!("jsonb_extract_path_text(payload, '{MODE_KEY}')"),
        }
    }
}

fn mode_filter(filters: &EntryFilters) -> Option<&str> {
    filters
        .mode
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
}

/// WHERE clause for the given filters. Parameter order: company, form, mode.
fn where_clause(filters: &EntryFilters, accessor: ModeAccessor) -> String {
    let mut conditions: Vec<String> = Vec::new();
    let mut param_index = 0u32;

    if filters.company_id.is_some() {
        param_index += 1;
        conditions.push(format!("company_id = ${param_index}"));
    }
    if filters.form_id.is_some() {
        param_index += 1;
        conditions.push(format!("form_id = ${param_index}"));
    }
    if mode_filter(filters).is_some() {
        param_index += 1;
        conditions.push(format!("{} = ${param_index}", accessor.expr()));
    }

    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

/// List entries with a total count, newest first.
pub async fn list_page(
    pool: &PgPool,
    filters: &EntryFilters,
    pagination: &Pagination,
) -> Result<PagedResult<EntryWithAttachments>, AppError> {
    let (total, entries) = fetch_entries(pool, filters, pagination, true).await?;
    let items = attach(pool, entries).await?;
    Ok(PagedResult::new(items, total.unwrap_or_default(), pagination))
}

/// List entries without counting, newest first.
pub async fn list(
    pool: &PgPool,
    filters: &EntryFilters,
    pagination: &Pagination,
) -> Result<Vec<EntryWithAttachments>, AppError> {
    let (_, entries) = fetch_entries(pool, filters, pagination, false).await?;
    attach(pool, entries).await
}

/// Find one entry with its attachments.
pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<EntryWithAttachments, AppError> {
    let entry = sqlx::query_as::<_, InflowEntry>("SELECT * FROM inflow_entries WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Entry {id} not found")))?;

    let attachments = list_attachments(pool, id).await?;
    Ok(EntryWithAttachments { entry, attachments })
}

/// Attachments of one entry in insertion order.
pub async fn list_attachments<'e, E>(executor: E, entry_id: i64) -> Result<Vec<EntryAttachment>, AppError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let attachments = sqlx::query_as::<_, EntryAttachment>(
        "SELECT * FROM entry_attachments WHERE entry_id = $1 ORDER BY id",
    )
    .bind(entry_id)
    .fetch_all(executor)
    .await?;
    Ok(attachments)
}

pub async fn find_attachment(pool: &PgPool, id: i64) -> Result<EntryAttachment, AppError> {
    sqlx::query_as::<_, EntryAttachment>("SELECT * FROM entry_attachments WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Attachment {id} not found")))
}

/// Presign a fresh URL for the attachment's object and store it on the row.
pub async fn regenerate_attachment_url(
    pool: &PgPool,
    storage: &StorageGateway,
    id: i64,
) -> Result<RegeneratedAttachment, AppError> {
    let current = find_attachment(pool, id).await?;
    let issued = storage.regenerate_presigned_url(&current.file_url).await?;

    let attachment = sqlx::query_as::<_, EntryAttachment>(
        "UPDATE entry_attachments SET file_url = $2 WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&issued.url)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Attachment {id} not found")))?;

    tracing::info!(attachment_id = id, entry_id = attachment.entry_id, "Attachment URL regenerated");
    Ok(RegeneratedAttachment {
        attachment,
        expires_at: issued.expires_at,
    })
}

/// Delete the attachment row, then its object (best-effort).
pub async fn delete_attachment(
    pool: &PgPool,
    storage: &StorageGateway,
    id: i64,
) -> Result<DeletedAttachment, AppError> {
    let attachment = sqlx::query_as::<_, EntryAttachment>(
        "DELETE FROM entry_attachments WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Attachment {id} not found")))?;

    let object_deleted = storage.delete(&attachment.file_url).await;

    tracing::info!(attachment_id = id, object_deleted, "Attachment deleted");
    Ok(DeletedAttachment {
        attachment,
        object_deleted,
    })
}

// -- Private helpers ----------------------------------------------------------

async fn fetch_entries(
    pool: &PgPool,
    filters: &EntryFilters,
    pagination: &Pagination,
    with_total: bool,
) -> Result<(Option<i64>, Vec<InflowEntry>), AppError> {
    match query_entries(pool, filters, pagination, ModeAccessor::Operator, with_total).await {
        Ok(page) => Ok(page),
        Err(e) if mode_filter(filters).is_some() && is_undefined_function(&e) => {
            tracing::warn!(error = %e, "JSON operator rejected, retrying mode filter with jsonb_extract_path_text");
            Ok(query_entries(pool, filters, pagination, ModeAccessor::ExtractPath, with_total).await?)
        }
        Err(e) => Err(e.into()),
    }
}

fn is_undefined_function(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(UNDEFINED_FUNCTION),
        _ => false,
    }
}

async fn query_entries(
    pool: &PgPool,
    filters: &EntryFilters,
    pagination: &Pagination,
    accessor: ModeAccessor,
    with_total: bool,
) -> Result<(Option<i64>, Vec<InflowEntry>), sqlx::Error> {
    let where_clause = where_clause(filters, accessor);

    let count_sql = format!("SELECT COUNT(*) FROM inflow_entries {where_clause}");
    let data_sql = format!(
        "SELECT * FROM inflow_entries {where_clause} \
         ORDER BY created_at DESC, id DESC \
         LIMIT {} OFFSET {}",
        pagination.limit(),
        pagination.offset()
    );

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    let mut data_query = sqlx::query_as::<_, InflowEntry>(&data_sql);

    macro_rules! bind_both {
        ($val:expr) => {
            count_query = count_query.bind($val);
            data_query = data_query.bind($val);
        };
    }

    if let Some(company_id) = filters.company_id {
        bind_both!(company_id);
    }
    if let Some(form_id) = filters.form_id {
        bind_both!(form_id);
    }
    if let Some(mode) = mode_filter(filters) {
        bind_both!(mode);
    }

    let total = if with_total {
        Some(count_query.fetch_one(pool).await?)
    } else {
        None
    };
    let entries = data_query.fetch_all(pool).await?;

    Ok((total, entries))
}

/// Load the attachments of a page of entries in one query.
async fn attach(pool: &PgPool, entries: Vec<InflowEntry>) -> Result<Vec<EntryWithAttachments>, AppError> {
    if entries.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
    let rows = sqlx::query_as::<_, EntryAttachment>(
        "SELECT * FROM entry_attachments WHERE entry_id = ANY($1) ORDER BY entry_id, id",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut by_entry: HashMap<i64, Vec<EntryAttachment>> = HashMap::new();
    for row in rows {
        by_entry.entry(row.entry_id).or_default().push(row);
    }

    Ok(entries
        .into_iter()
        .map(|entry| {
            let attachments = by_entry.remove(&entry.id).unwrap_or_default();
            EntryWithAttachments { entry, attachments }
        })
        .collect())
}
