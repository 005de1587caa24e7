//! Storage port for pools and everything that hangs off them.
//!
//! Implementations must make each call atomic on its own; in particular
//! [`PoolStore::replace_splits`] must never expose a half-replaced split set.

use async_trait::async_trait;

use crate::error::Result;
use crate::schemas::{Expense, ExpenseSplit, Member, Pool, Transaction};

pub mod memory;
pub mod mongo;

pub use memory::InMemoryStore;
pub use mongo::MongoStore;

#[async_trait]
pub trait PoolStore: Send + Sync {
    async fn insert_pool(&self, pool: &Pool) -> Result<()>;
    async fn update_pool(&self, pool: &Pool) -> Result<()>;
    async fn pool(&self, pool_id: &str) -> Result<Option<Pool>>;

    /// All members, active or not.
    async fn members(&self, pool_id: &str) -> Result<Vec<Member>>;
    /// Inserts or replaces the record for (pool, user).
    async fn upsert_member(&self, member: &Member) -> Result<()>;
    /// Every membership record of a user, across pools.
    async fn memberships(&self, user_id: &str) -> Result<Vec<Member>>;

    async fn expenses(&self, pool_id: &str) -> Result<Vec<Expense>>;
    async fn expense(&self, expense_id: &str) -> Result<Option<Expense>>;
    async fn insert_expense(&self, expense: &Expense) -> Result<()>;
    /// Replaces the whole expense document, splits included. Returns false
    /// when the expense does not exist.
    async fn update_expense(&self, expense: &Expense) -> Result<bool>;
    /// Returns false when the expense does not exist.
    async fn replace_splits(&self, expense_id: &str, splits: &[ExpenseSplit]) -> Result<bool>;
    async fn delete_expense(&self, expense_id: &str) -> Result<bool>;

    async fn insert_transactions(&self, transactions: &[Transaction]) -> Result<()>;
    async fn transaction(&self, transaction_id: &str) -> Result<Option<Transaction>>;
    async fn update_transaction(&self, transaction: &Transaction) -> Result<()>;
    async fn transactions(&self, pool_id: &str) -> Result<Vec<Transaction>>;
    /// Pending transactions in which the user pays or gets paid.
    async fn pending_transactions_for(&self, user_id: &str) -> Result<Vec<Transaction>>;
}
