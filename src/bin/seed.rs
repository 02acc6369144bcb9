//! Seed script for development: populates a fresh database with a demo company
//! and one inflow form per mode.
//!
//! Usage: `cargo run --bin seed`
//!
//! Requires `DATABASE_URL` (reads .env).

use anyhow::Context;
use inflowdesk::models::company::{BankAccountInput, CreateCompany};
use inflowdesk::models::form::{CreateField, CreateForm, FieldType, FlowType, InflowMode};
use inflowdesk::services::{company, form};
use serde_json::json;
use sqlx::PgPool;

const DEMO_COMPANY: &str = "Demo Traders Pvt Ltd";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let db_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = inflowdesk::db::create_pool(&db_url, 5).await?;

    inflowdesk::db::run_migrations(&pool).await?;

    println!("=== Inflow Seed Script ===");

    seed_company(&pool).await?;
    seed_forms(&pool).await?;

    println!("\n=== Seed complete! ===");
    Ok(())
}

async fn seed_company(pool: &PgPool) -> anyhow::Result<()> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM companies WHERE company_name = $1)")
            .bind(DEMO_COMPANY)
            .fetch_one(pool)
            .await?;

    if exists {
        println!("[skip] Company '{DEMO_COMPANY}' already exists");
        return Ok(());
    }

    let created = company::create(
        pool,
        &CreateCompany {
            company_name: DEMO_COMPANY.to_string(),
            bank_accounts: vec![
                account("HDFC Bank", "50100012345678"),
                account("State Bank of India", "30987654321"),
            ],
        },
    )
    .await?;

    println!(
        "[done] Created company {} with {} bank accounts",
        created.company.id,
        created.bank_accounts.len()
    );
    Ok(())
}

async fn seed_forms(pool: &PgPool) -> anyhow::Result<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inflow_forms")
        .fetch_one(pool)
        .await?;

    if count > 0 {
        println!("[skip] {count} forms already exist");
        return Ok(());
    }

    let forms = [
        (
            InflowMode::Bank,
            "Bank transfer",
            true,
            vec![
                field("amount", "Amount", FieldType::Number, true, None),
                field("transaction_date", "Transaction date", FieldType::Date, true, None),
                field("utr_number", "UTR / reference number", FieldType::Text, true, None),
                field("remarks", "Remarks", FieldType::Textarea, false, None),
            ],
        ),
        (
            InflowMode::Cash,
            "Counter cash",
            false,
            vec![
                field("amount", "Amount", FieldType::Number, true, None),
                field("received_on", "Received on", FieldType::Date, true, None),
                field("received_by", "Received by", FieldType::Text, false, None),
            ],
        ),
        (
            InflowMode::Upi,
            "UPI collection",
            true,
            vec![
                field("amount", "Amount", FieldType::Number, true, None),
                field(
                    "upi_app",
                    "UPI app",
                    FieldType::Spinner,
                    true,
                    Some(json!(["GPay", "PhonePe", "Paytm", "BHIM", "Other"])),
                ),
                field("upi_reference", "UPI reference", FieldType::Text, true, None),
            ],
        ),
    ];

    for (mode, source, attachment, custom_fields) in forms {
        let created = form::create_form(
            pool,
            &CreateForm {
                flow_type: FlowType::Inflow,
                mode,
                source: source.to_string(),
                attachment,
                custom_fields,
            },
        )
        .await?;
        println!(
            "[done] Created {mode} form {} with {} fields",
            created.form.id,
            created.fields.len()
        );
    }

    Ok(())
}

fn account(bank_name: &str, account_number: &str) -> BankAccountInput {
    BankAccountInput {
        id: None,
        bank_name: bank_name.to_string(),
        account_number: account_number.to_string(),
    }
}

fn field(
    key: &str,
    label: &str,
    field_type: FieldType,
    is_required: bool,
    options: Option<serde_json::Value>,
) -> CreateField {
    CreateField {
        field_key: key.to_string(),
        label: label.to_string(),
        field_type,
        is_required,
        options,
        sort_order: None,
    }
}
