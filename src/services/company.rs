//! Company registry service: CRUD with bank-account list reconciliation.

use std::collections::HashSet;

use sqlx::{PgConnection, PgPool};
use validator::Validate;

use crate::errors::AppError;
use crate::models::company::{
    BankAccount, BankAccountInput, Company, CompanyWithAccounts, CreateCompany, UpdateCompany,
};
use crate::models::pagination::{PagedResult, Pagination};

/// How a submitted account list maps onto the stored one.
#[derive(Debug, Default)]
pub struct AccountPlan<'a> {
    pub update: Vec<&'a BankAccountInput>,
    pub insert: Vec<&'a BankAccountInput>,
    pub delete: Vec<i64>,
}

/// Split a submitted account list into updates (by id), inserts (no id) and
/// deletions (stored ids the list no longer mentions).
///
/// Fails when the list references an id the company does not own.
pub fn plan_accounts<'a>(
    company_id: i64,
    existing_ids: &[i64],
    submitted: &'a [BankAccountInput],
) -> Result<AccountPlan<'a>, AppError> {
    let existing: HashSet<i64> = existing_ids.iter().copied().collect();
    let mut kept = HashSet::new();
    let mut plan = AccountPlan::default();

    for account in submitted {
        match account.id {
            Some(id) if existing.contains(&id) => {
                if !kept.insert(id) {
                    return Err(AppError::BadRequest(format!(
                        "Bank account {id} appears more than once"
                    )));
                }
                plan.update.push(account);
            }
            Some(id) => {
                return Err(AppError::NotFound(format!(
                    "Bank account {id} not found for company {company_id}"
                )));
            }
            None => plan.insert.push(account),
        }
    }

    plan.delete = existing_ids
        .iter()
        .copied()
        .filter(|id| !kept.contains(id))
        .collect();

    Ok(plan)
}

/// Create a company and its initial bank accounts in one transaction.
pub async fn create(pool: &PgPool, input: &CreateCompany) -> Result<CompanyWithAccounts, AppError> {
    input.validate()?;

    let mut tx = pool.begin().await?;

    let company = sqlx::query_as::<_, Company>(
        "INSERT INTO companies (company_name) VALUES ($1) RETURNING *",
    )
    .bind(input.company_name.trim())
    .fetch_one(&mut *tx)
    .await?;

    for account in &input.bank_accounts {
        insert_account(&mut tx, company.id, account).await?;
    }

    let bank_accounts = fetch_accounts(&mut tx, company.id).await?;
    tx.commit().await?;

    tracing::info!(company_id = company.id, accounts = bank_accounts.len(), "Company created");
    Ok(CompanyWithAccounts {
        company,
        bank_accounts,
    })
}

/// Find company by ID, with its accounts.
pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<CompanyWithAccounts, AppError> {
    let company = sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Company {id} not found")))?;

    let mut conn = pool.acquire().await?;
    let bank_accounts = fetch_accounts(&mut conn, id).await?;

    Ok(CompanyWithAccounts {
        company,
        bank_accounts,
    })
}

/// Whether a company row exists.
pub async fn exists(pool: &PgPool, id: i64) -> Result<bool, AppError> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM companies WHERE id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

/// List companies newest first.
pub async fn list(
    pool: &PgPool,
    pagination: &Pagination,
) -> Result<PagedResult<CompanyWithAccounts>, AppError> {
    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM companies")
        .fetch_one(pool)
        .await?;

    let companies = sqlx::query_as::<_, Company>(
        "SELECT * FROM companies ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
    )
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(pool)
    .await?;

    let mut conn = pool.acquire().await?;
    let mut items = Vec::with_capacity(companies.len());
    for company in companies {
        let bank_accounts = fetch_accounts(&mut conn, company.id).await?;
        items.push(CompanyWithAccounts {
            company,
            bank_accounts,
        });
    }

    Ok(PagedResult::new(items, total, pagination))
}

/// Update a company's name and, when supplied, reconcile its bank accounts
/// to exactly the submitted list.
pub async fn update(
    pool: &PgPool,
    id: i64,
    input: &UpdateCompany,
) -> Result<CompanyWithAccounts, AppError> {
    input.validate()?;

    let mut tx = pool.begin().await?;

    let company = sqlx::query_as::<_, Company>(
        "UPDATE companies SET company_name = COALESCE($2, company_name) WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(input.company_name.as_deref().map(str::trim))
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Company {id} not found")))?;

    if let Some(submitted) = &input.bank_accounts {
        let existing_ids = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM company_bank_accounts WHERE company_id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let plan = plan_accounts(id, &existing_ids, submitted)?;

        if !plan.delete.is_empty() {
            sqlx::query("DELETE FROM company_bank_accounts WHERE company_id = $1 AND id = ANY($2)")
                .bind(id)
                .bind(&plan.delete)
                .execute(&mut *tx)
                .await?;
        }

        for account in &plan.update {
            sqlx::query(
                "UPDATE company_bank_accounts SET bank_name = $3, account_number = $4 \
                 WHERE id = $1 AND company_id = $2",
            )
            .bind(account.id)
            .bind(id)
            .bind(account.bank_name.trim())
            .bind(account.account_number.trim())
            .execute(&mut *tx)
            .await?;
        }

        for account in &plan.insert {
            insert_account(&mut tx, id, account).await?;
        }

        tracing::info!(
            company_id = id,
            updated = plan.update.len(),
            inserted = plan.insert.len(),
            deleted = plan.delete.len(),
            "Bank accounts reconciled"
        );
    }

    let bank_accounts = fetch_accounts(&mut tx, id).await?;
    tx.commit().await?;

    Ok(CompanyWithAccounts {
        company,
        bank_accounts,
    })
}

/// Delete a company; its bank accounts cascade.
pub async fn delete(pool: &PgPool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM companies WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Company {id} not found")));
    }

    tracing::info!(company_id = id, "Company deleted");
    Ok(())
}

// -- Private helpers ----------------------------------------------------------

async fn insert_account(
    conn: &mut PgConnection,
    company_id: i64,
    account: &BankAccountInput,
) -> Result<BankAccount, AppError> {
    let account = sqlx::query_as::<_, BankAccount>(
        "INSERT INTO company_bank_accounts (company_id, bank_name, account_number) \
         VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(company_id)
    .bind(account.bank_name.trim())
    .bind(account.account_number.trim())
    .fetch_one(&mut *conn)
    .await?;
    Ok(account)
}

async fn fetch_accounts(conn: &mut PgConnection, company_id: i64) -> Result<Vec<BankAccount>, AppError> {
    let accounts = sqlx::query_as::<_, BankAccount>(
        "SELECT * FROM company_bank_accounts WHERE company_id = $1 ORDER BY id",
    )
    .bind(company_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(accounts)
}
