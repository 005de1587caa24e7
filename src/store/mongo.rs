//! MongoDB adapter. Splits live inside their expense document, so replacing
//! them is a single-document update and therefore atomic.

use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::options::{FindOptions, ReplaceOptions};
use mongodb::{bson::doc, Client, Collection, Database};

use super::PoolStore;
use crate::error::Result;
use crate::schemas::{Expense, ExpenseSplit, Member, Pool, Transaction};

#[derive(Clone)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        let store = Self {
            database: client.database(database),
        };
        tracing::info!(database, "connected to MongoDB");
        Ok(store)
    }

    fn pools(&self) -> Collection<Pool> {
        self.database.collection("Pools")
    }

    fn members_collection(&self) -> Collection<Member> {
        self.database.collection("Members")
    }

    fn expenses_collection(&self) -> Collection<Expense> {
        self.database.collection("Expenses")
    }

    fn transactions_collection(&self) -> Collection<Transaction> {
        self.database.collection("Transactions")
    }
}

#[async_trait]
impl PoolStore for MongoStore {
    async fn insert_pool(&self, pool: &Pool) -> Result<()> {
        self.pools().insert_one(pool, None).await?;
        Ok(())
    }

    async fn update_pool(&self, pool: &Pool) -> Result<()> {
        self.pools()
            .replace_one(doc! { "id": pool.id.as_str() }, pool, None)
            .await?;
        Ok(())
    }

    async fn pool(&self, pool_id: &str) -> Result<Option<Pool>> {
        Ok(self.pools().find_one(doc! { "id": pool_id }, None).await?)
    }

    async fn members(&self, pool_id: &str) -> Result<Vec<Member>> {
        let options = FindOptions::builder().sort(doc! { "user_id": 1 }).build();
        let cursor = self
            .members_collection()
            .find(doc! { "pool_id": pool_id }, options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn upsert_member(&self, member: &Member) -> Result<()> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.members_collection()
            .replace_one(
                doc! { "pool_id": member.pool_id.as_str(), "user_id": member.user_id.as_str() },
                member,
                options,
            )
            .await?;
        Ok(())
    }

    async fn memberships(&self, user_id: &str) -> Result<Vec<Member>> {
        let options = FindOptions::builder().sort(doc! { "pool_id": 1 }).build();
        let cursor = self
            .members_collection()
            .find(doc! { "user_id": user_id }, options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn expenses(&self, pool_id: &str) -> Result<Vec<Expense>> {
        let options = FindOptions::builder()
            .sort(doc! { "expense_date": -1, "created_at": -1 })
            .build();
        let cursor = self
            .expenses_collection()
            .find(doc! { "pool_id": pool_id }, options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn expense(&self, expense_id: &str) -> Result<Option<Expense>> {
        Ok(self
            .expenses_collection()
            .find_one(doc! { "id": expense_id }, None)
            .await?)
    }

    async fn insert_expense(&self, expense: &Expense) -> Result<()> {
        self.expenses_collection().insert_one(expense, None).await?;
        Ok(())
    }

    async fn update_expense(&self, expense: &Expense) -> Result<bool> {
        let result = self
            .expenses_collection()
            .replace_one(doc! { "id": expense.id.as_str() }, expense, None)
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn replace_splits(&self, expense_id: &str, splits: &[ExpenseSplit]) -> Result<bool> {
        let result = self
            .expenses_collection()
            .update_one(
                doc! { "id": expense_id },
                doc! { "$set": {
                    "splits": bson::to_bson(splits)?,
                    "updated_at": bson::to_bson(&Utc::now())?,
                }},
                None,
            )
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn delete_expense(&self, expense_id: &str) -> Result<bool> {
        let result = self
            .expenses_collection()
            .delete_one(doc! { "id": expense_id }, None)
            .await?;
        Ok(result.deleted_count == 1)
    }

    async fn insert_transactions(&self, transactions: &[Transaction]) -> Result<()> {
        if transactions.is_empty() {
            return Ok(());
        }
        self.transactions_collection()
            .insert_many(transactions, None)
            .await?;
        Ok(())
    }

    async fn transaction(&self, transaction_id: &str) -> Result<Option<Transaction>> {
        Ok(self
            .transactions_collection()
            .find_one(doc! { "id": transaction_id }, None)
            .await?)
    }

    async fn update_transaction(&self, transaction: &Transaction) -> Result<()> {
        self.transactions_collection()
            .replace_one(
                doc! { "id": transaction.id.as_str() },
                transaction,
                None,
            )
            .await?;
        Ok(())
    }

    async fn transactions(&self, pool_id: &str) -> Result<Vec<Transaction>> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let cursor = self
            .transactions_collection()
            .find(doc! { "pool_id": pool_id }, options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn pending_transactions_for(&self, user_id: &str) -> Result<Vec<Transaction>> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let cursor = self
            .transactions_collection()
            .find(
                doc! {
                    "status": "pending",
                    "$or": [ { "from_user": user_id }, { "to_user": user_id } ],
                },
                options,
            )
            .await?;
        Ok(cursor.try_collect().await?)
    }
}
