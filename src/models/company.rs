//! Company registry model with owned bank accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::validate_not_blank;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: i64,
    pub company_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct BankAccount {
    pub id: i64,
    pub company_id: i64,
    pub bank_name: String,
    pub account_number: String,
    pub created_at: DateTime<Utc>,
}

/// Company plus its accounts, ordered by id.
#[derive(Debug, Clone, Serialize)]
pub struct CompanyWithAccounts {
    #[serde(flatten)]
    pub company: Company,
    pub bank_accounts: Vec<BankAccount>,
}

/// Bank account in a create/update request. `id: None` means "new account".
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BankAccountInput {
    pub id: Option<i64>,
    #[validate(length(min = 1, max = 150), custom(function = "validate_not_blank"))]
    pub bank_name: String,
    #[validate(length(min = 1, max = 50), custom(function = "validate_not_blank"))]
    pub account_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCompany {
    #[validate(length(min = 1, max = 200), custom(function = "validate_not_blank"))]
    pub company_name: String,
    #[serde(default)]
    #[validate(nested)]
    pub bank_accounts: Vec<BankAccountInput>,
}

/// Partial company update. A supplied `bank_accounts` list replaces the
/// company's account set exactly; an omitted one leaves accounts untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Default, Validate)]
pub struct UpdateCompany {
    #[validate(length(min = 1, max = 200), custom(function = "validate_not_blank"))]
    pub company_name: Option<String>,
    #[validate(nested)]
    pub bank_accounts: Option<Vec<BankAccountInput>>,
}
