//! Form schema store: form definitions and their ordered custom fields.

use std::collections::HashSet;

use sqlx::{PgConnection, PgPool};
use validator::Validate;

use crate::errors::AppError;
use crate::models::form::{
    CreateField, CreateForm, FlowType, FormField, FormFilters, FormWithFields, InflowForm,
    InflowMode, UpdateField, UpdateForm,
};
use crate::models::pagination::Pagination;

/// Reject a field list that repeats a key, naming the first repeat.
pub fn ensure_unique_keys(fields: &[CreateField]) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    for field in fields {
        if !seen.insert(field.field_key.as_str()) {
            return Err(AppError::Conflict(format!(
                "Field key '{}' is repeated in the form definition",
                field.field_key
            )));
        }
    }
    Ok(())
}

/// Create a form and all of its fields in one transaction.
///
/// Each field's `sort_order` is its position in the submitted list.
pub async fn create_form(pool: &PgPool, input: &CreateForm) -> Result<FormWithFields, AppError> {
    input.validate()?;
    ensure_unique_keys(&input.custom_fields)?;

    let mut tx = pool.begin().await?;

    let form = sqlx::query_as::<_, InflowForm>(
        r#"
        INSERT INTO inflow_forms (flow_type, mode, source, attachment)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(input.flow_type)
    .bind(input.mode)
    .bind(input.source.trim())
    .bind(input.attachment)
    .fetch_one(&mut *tx)
    .await?;

    for (position, field) in input.custom_fields.iter().enumerate() {
        insert_field(&mut tx, form.id, field, position as i32).await?;
    }

    let fields = fetch_fields(&mut tx, form.id).await?;
    tx.commit().await?;

    tracing::info!(
        form_id = form.id,
        flow_type = %form.flow_type,
        mode = %form.mode,
        fields = fields.len(),
        "Form created"
    );
    Ok(FormWithFields { form, fields })
}

/// Find form by ID, with fields ordered by (sort_order, id).
pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<FormWithFields, AppError> {
    let form = sqlx::query_as::<_, InflowForm>("SELECT * FROM inflow_forms WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Form {id} not found")))?;

    let mut conn = pool.acquire().await?;
    let fields = fetch_fields(&mut conn, id).await?;
    Ok(FormWithFields { form, fields })
}

/// Whether a form row exists.
pub async fn exists(pool: &PgPool, id: i64) -> Result<bool, AppError> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM inflow_forms WHERE id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

/// List forms, most recently updated first, optionally narrowed to a flow type and mode.
pub async fn list(
    pool: &PgPool,
    filters: &FormFilters,
    pagination: &Pagination,
) -> Result<Vec<FormWithFields>, AppError> {
    let forms = sqlx::query_as::<_, InflowForm>(
        r#"
        SELECT * FROM inflow_forms
        WHERE ($1::form_flow_type IS NULL OR flow_type = $1)
          AND ($2::form_mode IS NULL OR mode = $2)
        ORDER BY updated_at DESC, id DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(filters.flow_type)
    .bind(filters.mode)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(pool)
    .await?;

    let mut conn = pool.acquire().await?;
    let mut items = Vec::with_capacity(forms.len());
    for form in forms {
        let fields = fetch_fields(&mut conn, form.id).await?;
        items.push(FormWithFields { form, fields });
    }
    Ok(items)
}

/// The most recently updated form for a `(flow_type, mode)` pair.
pub async fn find_latest(
    pool: &PgPool,
    flow_type: FlowType,
    mode: InflowMode,
) -> Result<FormWithFields, AppError> {
    let form = sqlx::query_as::<_, InflowForm>(
        "SELECT * FROM inflow_forms WHERE flow_type = $1 AND mode = $2 \
         ORDER BY updated_at DESC, id DESC LIMIT 1",
    )
    .bind(flow_type)
    .bind(mode)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("No {flow_type} form for mode {mode}")))?;

    let mut conn = pool.acquire().await?;
    let fields = fetch_fields(&mut conn, form.id).await?;
    Ok(FormWithFields { form, fields })
}

/// Update only the supplied form attributes.
pub async fn update_form(pool: &PgPool, id: i64, input: &UpdateForm) -> Result<FormWithFields, AppError> {
    input.validate()?;

    let form = sqlx::query_as::<_, InflowForm>(
        r#"
        UPDATE inflow_forms SET
            flow_type = COALESCE($2, flow_type),
            mode = COALESCE($3, mode),
            source = COALESCE($4, source),
            attachment = COALESCE($5, attachment),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(input.flow_type)
    .bind(input.mode)
    .bind(input.source.as_deref().map(str::trim))
    .bind(input.attachment)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Form {id} not found")))?;

    let mut conn = pool.acquire().await?;
    let fields = fetch_fields(&mut conn, id).await?;
    Ok(FormWithFields { form, fields })
}

/// Delete a form; its fields cascade.
pub async fn delete_form(pool: &PgPool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM inflow_forms WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Form {id} not found")));
    }

    tracing::info!(form_id = id, "Form deleted");
    Ok(())
}

/// Add one field to an existing form.
pub async fn create_field(pool: &PgPool, form_id: i64, input: &CreateField) -> Result<FormField, AppError> {
    input.validate()?;

    let mut tx = pool.begin().await?;

    // Locks the parent so concurrent appends compute distinct positions.
    let form_exists = sqlx::query_scalar::<_, i64>("SELECT id FROM inflow_forms WHERE id = $1 FOR UPDATE")
        .bind(form_id)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();
    if !form_exists {
        return Err(AppError::NotFound(format!("Form {form_id} not found")));
    }

    let sort_order = match input.sort_order {
        Some(order) => order,
        None => {
            sqlx::query_scalar::<_, i32>(
                "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM inflow_form_fields WHERE form_id = $1",
            )
            .bind(form_id)
            .fetch_one(&mut *tx)
            .await?
        }
    };

    let field = insert_field(&mut tx, form_id, input, sort_order).await?;
    touch_form(&mut tx, form_id).await?;
    tx.commit().await?;

    tracing::info!(form_id, field_id = field.id, field_key = %field.field_key, "Field created");
    Ok(field)
}

/// Find field by ID.
pub async fn find_field(pool: &PgPool, id: i64) -> Result<FormField, AppError> {
    sqlx::query_as::<_, FormField>("SELECT * FROM inflow_form_fields WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Field {id} not found")))
}

/// Update only the supplied field attributes.
pub async fn update_field(pool: &PgPool, id: i64, input: &UpdateField) -> Result<FormField, AppError> {
    input.validate()?;

    let mut tx = pool.begin().await?;

    let field = sqlx::query_as::<_, FormField>(
        r#"
        UPDATE inflow_form_fields SET
            field_key = COALESCE($2, field_key),
            label = COALESCE($3, label),
            field_type = COALESCE($4, field_type),
            is_required = COALESCE($5, is_required),
            options = COALESCE($6, options),
            sort_order = COALESCE($7, sort_order)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(input.field_key.as_deref())
    .bind(input.label.as_deref())
    .bind(input.field_type)
    .bind(input.is_required)
    .bind(&input.options)
    .bind(input.sort_order)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| {
        AppError::conflict_on_unique(e, || {
            format!(
                "Field key '{}' already exists on this form",
                input.field_key.as_deref().unwrap_or_default()
            )
        })
    })?
    .ok_or_else(|| AppError::NotFound(format!("Field {id} not found")))?;

    touch_form(&mut tx, field.form_id).await?;
    tx.commit().await?;

    Ok(field)
}

/// Delete a single field.
pub async fn delete_field(pool: &PgPool, id: i64) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let form_id = sqlx::query_scalar::<_, i64>("DELETE FROM inflow_form_fields WHERE id = $1 RETURNING form_id")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Field {id} not found")))?;

    touch_form(&mut tx, form_id).await?;
    tx.commit().await?;

    tracing::info!(form_id, field_id = id, "Field deleted");
    Ok(())
}

// -- Private helpers ----------------------------------------------------------

async fn insert_field(
    conn: &mut PgConnection,
    form_id: i64,
    field: &CreateField,
    sort_order: i32,
) -> Result<FormField, AppError> {
    sqlx::query_as::<_, FormField>(
        r#"
        INSERT INTO inflow_form_fields
            (form_id, field_key, label, field_type, is_required, options, sort_order)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(form_id)
    .bind(&field.field_key)
    .bind(field.label.trim())
    .bind(field.field_type)
    .bind(field.is_required)
    .bind(&field.options)
    .bind(sort_order)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        AppError::conflict_on_unique(e, || {
            format!("Field key '{}' already exists on form {form_id}", field.field_key)
        })
    })
}

async fn fetch_fields(conn: &mut PgConnection, form_id: i64) -> Result<Vec<FormField>, AppError> {
    let fields = sqlx::query_as::<_, FormField>(
        "SELECT * FROM inflow_form_fields WHERE form_id = $1 ORDER BY sort_order, id",
    )
    .bind(form_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(fields)
}

async fn touch_form(conn: &mut PgConnection, form_id: i64) -> Result<(), AppError> {
    sqlx::query("UPDATE inflow_forms SET updated_at = NOW() WHERE id = $1")
        .bind(form_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
