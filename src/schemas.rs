use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = String;
pub type PoolId = String;
pub type ExpenseId = String;
pub type TransactionId = String;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMethod {
    #[default]
    Equal,
    Percentage,
    Manual,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Pool {
    pub id: PoolId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_by: UserId,
    pub is_active: bool,
    #[serde(default)]
    pub default_split_method: SplitMethod,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Membership of a user in a pool. There is at most one record per
/// (user, pool); removing a member only clears `is_active`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Member {
    pub user_id: UserId,
    pub pool_id: PoolId,
    pub email: Option<String>,
    pub upi_id: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
    pub joined_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub pool_id: PoolId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub amount: Decimal,
    pub paid_by: UserId,
    pub created_by: UserId,
    pub split_method: SplitMethod,
    pub expense_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    // Embedded so that replacing the splits is a single write.
    #[serde(default)]
    pub splits: Vec<ExpenseSplit>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ExpenseSplit {
    pub user_id: UserId,
    pub amount: Decimal,
    pub percentage: Option<Decimal>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Upi,
    Cash,
    BankTransfer,
    Other,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub pool_id: PoolId,
    pub from_user: UserId,
    pub to_user: UserId,
    pub amount: Decimal,
    pub status: TransactionStatus,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub upi_transaction_id: Option<String>,
    #[serde(default)]
    pub notes: String,
    pub is_settled: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn pending(
        pool_id: PoolId,
        from_user: UserId,
        to_user: UserId,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Transaction {
            id: new_id(),
            pool_id,
            from_user,
            to_user,
            amount,
            status: TransactionStatus::Pending,
            payment_method: PaymentMethod::default(),
            upi_transaction_id: None,
            notes: String::new(),
            is_settled: false,
            created_at: now,
            completed_at: None,
            settled_at: None,
        }
    }
}
