use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::PoolStore;
use crate::error::Result;
use crate::schemas::{
    Expense, ExpenseId, ExpenseSplit, Member, Pool, PoolId, Transaction, TransactionId,
    TransactionStatus, UserId,
};

#[derive(Default)]
struct Tables {
    pools: HashMap<PoolId, Pool>,
    members: HashMap<(PoolId, UserId), Member>,
    expenses: HashMap<ExpenseId, Expense>,
    transactions: HashMap<TransactionId, Transaction>,
}

/// Process-local store used by tests and single-node demos.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PoolStore for InMemoryStore {
    async fn insert_pool(&self, pool: &Pool) -> Result<()> {
        self.tables
            .write()
            .await
            .pools
            .insert(pool.id.clone(), pool.clone());
        Ok(())
    }

    async fn update_pool(&self, pool: &Pool) -> Result<()> {
        self.insert_pool(pool).await
    }

    async fn pool(&self, pool_id: &str) -> Result<Option<Pool>> {
        Ok(self.tables.read().await.pools.get(pool_id).cloned())
    }

    async fn members(&self, pool_id: &str) -> Result<Vec<Member>> {
        let tables = self.tables.read().await;
        let mut members: Vec<Member> = tables
            .members
            .values()
            .filter(|m| m.pool_id == pool_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(members)
    }

    async fn upsert_member(&self, member: &Member) -> Result<()> {
        self.tables.write().await.members.insert(
            (member.pool_id.clone(), member.user_id.clone()),
            member.clone(),
        );
        Ok(())
    }

    async fn memberships(&self, user_id: &str) -> Result<Vec<Member>> {
        let tables = self.tables.read().await;
        let mut members: Vec<Member> = tables
            .members
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.pool_id.cmp(&b.pool_id));
        Ok(members)
    }

    async fn expenses(&self, pool_id: &str) -> Result<Vec<Expense>> {
        let tables = self.tables.read().await;
        let mut expenses: Vec<Expense> = tables
            .expenses
            .values()
            .filter(|e| e.pool_id == pool_id)
            .cloned()
            .collect();
        expenses.sort_by(|a, b| {
            b.expense_date
                .cmp(&a.expense_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(expenses)
    }

    async fn expense(&self, expense_id: &str) -> Result<Option<Expense>> {
        Ok(self.tables.read().await.expenses.get(expense_id).cloned())
    }

    async fn insert_expense(&self, expense: &Expense) -> Result<()> {
        self.tables
            .write()
            .await
            .expenses
            .insert(expense.id.clone(), expense.clone());
        Ok(())
    }

    async fn update_expense(&self, expense: &Expense) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.expenses.get_mut(&expense.id) {
            Some(stored) => {
                *stored = expense.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn replace_splits(&self, expense_id: &str, splits: &[ExpenseSplit]) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.expenses.get_mut(expense_id) {
            Some(expense) => {
                expense.splits = splits.to_vec();
                expense.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_expense(&self, expense_id: &str) -> Result<bool> {
        Ok(self
            .tables
            .write()
            .await
            .expenses
            .remove(expense_id)
            .is_some())
    }

    async fn insert_transactions(&self, transactions: &[Transaction]) -> Result<()> {
        let mut tables = self.tables.write().await;
        for transaction in transactions {
            tables
                .transactions
                .insert(transaction.id.clone(), transaction.clone());
        }
        Ok(())
    }

    async fn transaction(&self, transaction_id: &str) -> Result<Option<Transaction>> {
        Ok(self
            .tables
            .read()
            .await
            .transactions
            .get(transaction_id)
            .cloned())
    }

    async fn update_transaction(&self, transaction: &Transaction) -> Result<()> {
        self.tables
            .write()
            .await
            .transactions
            .insert(transaction.id.clone(), transaction.clone());
        Ok(())
    }

    async fn transactions(&self, pool_id: &str) -> Result<Vec<Transaction>> {
        let tables = self.tables.read().await;
        let mut transactions: Vec<Transaction> = tables
            .transactions
            .values()
            .filter(|t| t.pool_id == pool_id)
            .cloned()
            .collect();
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(transactions)
    }

    async fn pending_transactions_for(&self, user_id: &str) -> Result<Vec<Transaction>> {
        let tables = self.tables.read().await;
        let mut transactions: Vec<Transaction> = tables
            .transactions
            .values()
            .filter(|t| t.status == TransactionStatus::Pending)
            .filter(|t| t.from_user == user_id || t.to_user == user_id)
            .cloned()
            .collect();
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::{new_id, SplitMethod};
    use rust_decimal_macros::dec;

    fn expense() -> Expense {
        let now = Utc::now();
        Expense {
            id: new_id(),
            pool_id: "p".to_string(),
            title: "taxi".to_string(),
            description: String::new(),
            amount: dec!(20),
            paid_by: "a".to_string(),
            created_by: "a".to_string(),
            split_method: SplitMethod::Equal,
            expense_date: now,
            created_at: now,
            updated_at: now,
            splits: vec![],
        }
    }

    #[tokio::test]
    async fn replaces_splits_of_existing_expense_only() {
        let store = InMemoryStore::new();
        let expense = expense();
        store.insert_expense(&expense).await.unwrap();

        let splits = vec![ExpenseSplit {
            user_id: "a".to_string(),
            amount: dec!(20),
            percentage: Some(dec!(100)),
        }];
        assert!(store.replace_splits(&expense.id, &splits).await.unwrap());
        assert_eq!(store.expense(&expense.id).await.unwrap().unwrap().splits, splits);
        assert!(!store.replace_splits("missing", &splits).await.unwrap());
    }

    #[tokio::test]
    async fn updates_only_existing_expenses() {
        let store = InMemoryStore::new();
        let mut stored = expense();
        assert!(!store.update_expense(&stored).await.unwrap());

        store.insert_expense(&stored).await.unwrap();
        stored.title = "airport taxi".to_string();
        assert!(store.update_expense(&stored).await.unwrap());
        assert_eq!(store.expense(&stored.id).await.unwrap().unwrap().title, "airport taxi");
    }

    #[tokio::test]
    async fn expenses_are_scoped_by_pool() {
        let store = InMemoryStore::new();
        let mut other = expense();
        other.pool_id = "q".to_string();
        store.insert_expense(&expense()).await.unwrap();
        store.insert_expense(&other).await.unwrap();
        assert_eq!(store.expenses("p").await.unwrap().len(), 1);
        assert!(store.delete_expense(&other.id).await.unwrap());
        assert!(store.expenses("q").await.unwrap().is_empty());
    }
}
