//! Pool operations on top of a [`PoolStore`].
//!
//! This is where authorization, cache invalidation and notification happen.
//! Balances and settlement suggestions are always recomputed from storage.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::balance::{compute_balances, BalanceSheet};
use crate::cache::{pool_summary_key, user_pools_key, SummaryCache};
use crate::error::{Error, Result};
use crate::exchange::suggest_settlements;
use crate::money::validate_amount;
use crate::notify::{Notifier, PoolEvent};
use crate::schemas::{
    new_id, Expense, ExpenseSplit, Member, Pool, PoolId, SplitMethod, Transaction,
    TransactionStatus, UserId,
};
use crate::split::{allocate_splits, Share, SplitRequest};
use crate::upi;

const RECENT_EXPENSES: usize = 5;
const DASHBOARD_EXPENSES: usize = 10;

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
            .unwrap_or_else(|error| panic!("email regex failed to compile: {error}"))
    })
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewPool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default_split_method: SplitMethod,
}

/// Fields left out keep their current value.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PoolUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub default_split_method: Option<SplitMethod>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewMember {
    pub user_id: UserId,
    pub email: Option<String>,
    pub upi_id: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewExpense {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub amount: Decimal,
    pub paid_by: UserId,
    /// Falls back to the pool's default method, as an equal split.
    pub split: Option<SplitRequest>,
    pub expense_date: Option<DateTime<Utc>>,
}

/// Fields left out keep their current value. A new `split` replaces the
/// stored one; without it the stored split is redone for a changed amount.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ExpenseUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub paid_by: Option<UserId>,
    pub expense_date: Option<DateTime<Utc>>,
    pub split: Option<SplitRequest>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SuggestedSettlement {
    pub from_user: UserId,
    pub to_user: UserId,
    pub amount: Decimal,
    pub transaction_id: String,
}

impl From<&Transaction> for SuggestedSettlement {
    fn from(transaction: &Transaction) -> Self {
        SuggestedSettlement {
            from_user: transaction.from_user.clone(),
            to_user: transaction.to_user.clone(),
            amount: transaction.amount,
            transaction_id: transaction.id.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoolSummary {
    pub pool_id: PoolId,
    pub pool_name: String,
    pub total_expenses: Decimal,
    pub member_count: usize,
    pub expense_count: usize,
    pub pending_transactions: usize,
    pub unsettled_members: usize,
    pub recent_expenses: Vec<Expense>,
}

/// A user's view across all of their pools.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Dashboard {
    pub pools: Vec<Pool>,
    pub recent_expenses: Vec<Expense>,
    pub pending_transactions: Vec<Transaction>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PaymentRequest {
    pub transaction_id: String,
    pub payment_link: String,
    pub recipient_upi: String,
    pub amount: Decimal,
    pub note: String,
    pub transaction_ref: String,
}

#[derive(Clone, Debug)]
pub struct ServiceOptions {
    pub summary_ttl: Duration,
    pub reuse_pending: bool,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            summary_ttl: Duration::from_secs(300),
            reuse_pending: false,
        }
    }
}

pub struct PoolService {
    store: Arc<dyn crate::store::PoolStore>,
    cache: Arc<dyn SummaryCache>,
    notifier: Arc<dyn Notifier>,
    options: ServiceOptions,
    settle_locks: DashMap<PoolId, Arc<Mutex<()>>>,
}

impl PoolService {
    pub fn new(
        store: Arc<dyn crate::store::PoolStore>,
        cache: Arc<dyn SummaryCache>,
        notifier: Arc<dyn Notifier>,
        options: ServiceOptions,
    ) -> Self {
        Self {
            store,
            cache,
            notifier,
            options,
            settle_locks: DashMap::new(),
        }
    }

    // Pools

    pub async fn create_pool(&self, pool_id: &str, request: NewPool, by: &str) -> Result<Pool> {
        if request.name.trim().is_empty() {
            return Err(Error::Validation("pool name is required".to_string()));
        }
        if self.store.pool(pool_id).await?.is_some() {
            return Err(Error::Validation(format!("pool {pool_id} already exists")));
        }
        let now = Utc::now();
        let pool = Pool {
            id: pool_id.to_string(),
            name: request.name,
            description: request.description,
            created_by: by.to_string(),
            is_active: true,
            default_split_method: request.default_split_method,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_pool(&pool).await?;
        self.store
            .upsert_member(&Member {
                user_id: by.to_string(),
                pool_id: pool.id.clone(),
                email: None,
                upi_id: None,
                is_active: true,
                is_admin: true,
                joined_at: now,
            })
            .await?;
        self.cache.invalidate(&user_pools_key(by));
        tracing::info!(pool = %pool.id, created_by = by, "pool created");
        Ok(pool)
    }

    /// Only the creator may edit a pool.
    pub async fn update_pool(&self, pool_id: &str, update: PoolUpdate, by: &str) -> Result<Pool> {
        let mut pool = self.active_pool(pool_id).await?;
        if pool.created_by != by {
            return Err(Error::Authorization(
                "only the pool creator can edit it".to_string(),
            ));
        }
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(Error::Validation("pool name is required".to_string()));
            }
            pool.name = name;
        }
        if let Some(description) = update.description {
            pool.description = description;
        }
        if let Some(method) = update.default_split_method {
            pool.default_split_method = method;
        }
        pool.updated_at = Utc::now();
        self.store.update_pool(&pool).await?;
        self.invalidate_pool_views(pool_id).await?;
        tracing::info!(pool = pool_id, "pool updated");
        Ok(pool)
    }

    /// Soft delete. Only the creator may close a pool. Its transactions are
    /// frozen from then on.
    pub async fn close_pool(&self, pool_id: &str, by: &str) -> Result<Pool> {
        let mut pool = self.active_pool(pool_id).await?;
        if pool.created_by != by {
            return Err(Error::Authorization(
                "only the pool creator can delete it".to_string(),
            ));
        }
        pool.is_active = false;
        pool.updated_at = Utc::now();
        self.store.update_pool(&pool).await?;
        self.settle_locks.remove(pool_id);
        self.invalidate_pool_views(pool_id).await?;
        tracing::info!(pool = pool_id, "pool closed");
        Ok(pool)
    }

    /// Active pools the user is an active member of.
    pub async fn user_pools(&self, user: &str) -> Result<Vec<Pool>> {
        let key = user_pools_key(user);
        if let Some(pools) = self
            .cache
            .get(&key)
            .and_then(|value| serde_json::from_value(value).ok())
        {
            return Ok(pools);
        }

        let mut pools = Vec::new();
        for membership in self.store.memberships(user).await? {
            if !membership.is_active {
                continue;
            }
            match self.store.pool(&membership.pool_id).await? {
                Some(pool) if pool.is_active => pools.push(pool),
                _ => {}
            }
        }
        match serde_json::to_value(&pools) {
            Ok(value) => self.cache.set(&key, value, self.options.summary_ttl),
            Err(e) => tracing::warn!(user, "could not cache pools: {}", e),
        }
        Ok(pools)
    }

    /// The user's pools, the latest expenses across them and the pending
    /// transactions the user takes part in.
    pub async fn dashboard(&self, user: &str) -> Result<Dashboard> {
        let pools = self.user_pools(user).await?;
        let mut recent_expenses = Vec::new();
        for pool in &pools {
            recent_expenses.extend(self.store.expenses(&pool.id).await?);
        }
        recent_expenses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent_expenses.truncate(DASHBOARD_EXPENSES);

        let mut pending_transactions = self.store.pending_transactions_for(user).await?;
        pending_transactions.retain(|t| pools.iter().any(|p| p.id == t.pool_id));
        Ok(Dashboard {
            pools,
            recent_expenses,
            pending_transactions,
        })
    }

    /// Emails an invitation to join the pool. Admins only.
    pub async fn invite(&self, pool_id: &str, email: &str, by: &str) -> Result<()> {
        let pool = self.active_pool(pool_id).await?;
        self.require_admin(&pool, by).await?;
        if !email_regex().is_match(email) {
            return Err(Error::Validation(format!("{email} is not a valid email address")));
        }
        tracing::info!(pool = pool_id, invited_by = by, "pool invite sent");
        self.notifier.dispatch(PoolEvent::PoolInvite {
            pool_name: pool.name,
            description: pool.description,
            invited_by: by.to_string(),
            email: email.to_string(),
        });
        Ok(())
    }

    // Members

    pub async fn add_member(&self, pool_id: &str, request: NewMember, by: &str) -> Result<Member> {
        let pool = self.active_pool(pool_id).await?;
        self.require_admin(&pool, by).await?;
        if let Some(upi_id) = &request.upi_id {
            upi::validate_upi_id(upi_id)?;
        }

        let existing = self
            .store
            .members(pool_id)
            .await?
            .into_iter()
            .find(|m| m.user_id == request.user_id);
        let member = match existing {
            Some(member) if member.is_active => {
                return Err(Error::Validation(format!(
                    "{} is already a member of this pool",
                    request.user_id
                )));
            }
            Some(member) => Member {
                is_active: true,
                is_admin: request.is_admin,
                email: request.email.or(member.email),
                upi_id: request.upi_id.or(member.upi_id),
                ..member
            },
            None => Member {
                user_id: request.user_id,
                pool_id: pool_id.to_string(),
                email: request.email,
                upi_id: request.upi_id,
                is_active: true,
                is_admin: request.is_admin,
                joined_at: Utc::now(),
            },
        };
        self.store.upsert_member(&member).await?;
        self.invalidate(pool_id);
        self.cache.invalidate(&user_pools_key(&member.user_id));
        tracing::info!(pool = pool_id, user = %member.user_id, "member added");

        self.notifier.dispatch(PoolEvent::MemberAdded {
            pool_name: pool.name,
            invited_by: by.to_string(),
            user_id: member.user_id.clone(),
            email: member.email.clone(),
        });
        Ok(member)
    }

    /// Deactivates the membership. Their history stays but no longer counts
    /// towards balances.
    pub async fn remove_member(&self, pool_id: &str, user_id: &str, by: &str) -> Result<Member> {
        let pool = self.active_pool(pool_id).await?;
        self.require_admin(&pool, by).await?;
        let mut member = self
            .store
            .members(pool_id)
            .await?
            .into_iter()
            .find(|m| m.user_id == user_id && m.is_active)
            .ok_or_else(|| Error::not_found("Member", user_id))?;
        member.is_active = false;
        self.store.upsert_member(&member).await?;
        self.invalidate(pool_id);
        self.cache.invalidate(&user_pools_key(user_id));
        tracing::info!(pool = pool_id, user = user_id, "member removed");
        Ok(member)
    }

    pub async fn active_members(&self, pool_id: &str) -> Result<Vec<Member>> {
        let mut members = self.store.members(pool_id).await?;
        members.retain(|m| m.is_active);
        Ok(members)
    }

    /// Fails unless `user` is an active member of the pool.
    pub async fn require_member(&self, pool_id: &str, user: &str) -> Result<Member> {
        self.active_pool(pool_id).await?;
        self.store
            .members(pool_id)
            .await?
            .into_iter()
            .find(|m| m.user_id == user && m.is_active)
            .ok_or_else(|| {
                Error::Authorization(format!("{user} is not a member of pool {pool_id}"))
            })
    }

    async fn require_admin(&self, pool: &Pool, user: &str) -> Result<()> {
        if pool.created_by == user {
            return Ok(());
        }
        let member = self.require_member(&pool.id, user).await?;
        if member.is_admin {
            Ok(())
        } else {
            Err(Error::Authorization(format!(
                "{user} is not an admin of pool {}",
                pool.id
            )))
        }
    }

    // Expenses

    pub async fn add_expense(&self, pool_id: &str, request: NewExpense, by: &str) -> Result<Expense> {
        let pool = self.active_pool(pool_id).await?;
        self.require_member(pool_id, by).await?;
        if request.title.trim().is_empty() {
            return Err(Error::Validation("expense title is required".to_string()));
        }
        let amount = validate_amount(request.amount)?;

        let members = self.active_members(pool_id).await?;
        if !members.iter().any(|m| m.user_id == request.paid_by) {
            return Err(Error::Validation(format!(
                "payer {} is not an active member of this pool",
                request.paid_by
            )));
        }
        let split = request.split.unwrap_or_default();
        let splits = allocate_splits(amount, &split, &members)?;

        let now = Utc::now();
        let expense = Expense {
            id: new_id(),
            pool_id: pool_id.to_string(),
            title: request.title,
            description: request.description,
            amount,
            paid_by: request.paid_by,
            created_by: by.to_string(),
            split_method: split.method(),
            expense_date: request.expense_date.unwrap_or(now),
            created_at: now,
            updated_at: now,
            splits,
        };
        self.store.insert_expense(&expense).await?;
        self.invalidate(pool_id);
        tracing::info!(
            pool = pool_id,
            expense = %expense.id,
            amount = %expense.amount,
            method = ?expense.split_method,
            "expense added"
        );

        let recipients = members
            .iter()
            .filter(|m| m.user_id != by)
            .filter_map(|m| m.email.clone())
            .collect();
        self.notifier.dispatch(PoolEvent::ExpenseAdded {
            pool_name: pool.name,
            title: expense.title.clone(),
            amount: expense.amount,
            paid_by: expense.paid_by.clone(),
            recipients,
        });
        Ok(expense)
    }

    pub async fn expenses(&self, pool_id: &str) -> Result<Vec<Expense>> {
        self.store.expenses(pool_id).await
    }

    /// Recomputes and replaces the splits of an expense. Only its creator may
    /// do this; the old splits stay untouched unless the new ones are valid.
    pub async fn allocate_splits(
        &self,
        expense_id: &str,
        request: SplitRequest,
        by: &str,
    ) -> Result<Vec<ExpenseSplit>> {
        let expense = self.owned_expense(expense_id, by).await?;
        let members = self.active_members(&expense.pool_id).await?;
        let splits = allocate_splits(expense.amount, &request, &members)?;
        if !self.store.replace_splits(expense_id, &splits).await? {
            return Err(Error::not_found("Expense", expense_id));
        }
        self.invalidate(&expense.pool_id);
        tracing::info!(
            expense = expense_id,
            method = ?request.method(),
            splits = splits.len(),
            "expense splits replaced"
        );
        Ok(splits)
    }

    pub async fn delete_expense(&self, expense_id: &str, by: &str) -> Result<()> {
        let expense = self.owned_expense(expense_id, by).await?;
        if !self.store.delete_expense(expense_id).await? {
            return Err(Error::not_found("Expense", expense_id));
        }
        self.invalidate(&expense.pool_id);
        tracing::info!(pool = %expense.pool_id, expense = expense_id, "expense deleted");
        Ok(())
    }

    /// Edits an expense. Only its creator may do this. The splits always
    /// end up adding to the (possibly new) amount.
    pub async fn update_expense(
        &self,
        expense_id: &str,
        update: ExpenseUpdate,
        by: &str,
    ) -> Result<Expense> {
        let mut expense = self.owned_expense(expense_id, by).await?;
        self.active_pool(&expense.pool_id).await?;
        let members = self.active_members(&expense.pool_id).await?;

        if let Some(title) = update.title {
            if title.trim().is_empty() {
                return Err(Error::Validation("expense title is required".to_string()));
            }
            expense.title = title;
        }
        if let Some(description) = update.description {
            expense.description = description;
        }
        if let Some(paid_by) = update.paid_by {
            if !members.iter().any(|m| m.user_id == paid_by) {
                return Err(Error::Validation(format!(
                    "payer {paid_by} is not an active member of this pool"
                )));
            }
            expense.paid_by = paid_by;
        }
        if let Some(expense_date) = update.expense_date {
            expense.expense_date = expense_date;
        }

        let amount = match update.amount {
            Some(amount) => validate_amount(amount)?,
            None => expense.amount,
        };
        let split = match update.split {
            Some(split) => Some(split),
            None if amount != expense.amount => Some(Self::stored_split(&expense)?),
            None => None,
        };
        expense.amount = amount;
        if let Some(split) = split {
            expense.splits = allocate_splits(amount, &split, &members)?;
            expense.split_method = split.method();
        }
        expense.updated_at = Utc::now();

        if !self.store.update_expense(&expense).await? {
            return Err(Error::not_found("Expense", expense_id));
        }
        self.invalidate(&expense.pool_id);
        tracing::info!(
            expense = expense_id,
            amount = %expense.amount,
            method = ?expense.split_method,
            "expense updated"
        );
        Ok(expense)
    }

    /// Split request that reproduces the stored split for a new amount.
    /// Manual figures cannot be carried over.
    fn stored_split(expense: &Expense) -> Result<SplitRequest> {
        match expense.split_method {
            SplitMethod::Equal => Ok(SplitRequest::Equal),
            SplitMethod::Percentage => Ok(SplitRequest::Percentage(
                expense
                    .splits
                    .iter()
                    .map(|split| Share {
                        user_id: split.user_id.clone(),
                        value: split.percentage.unwrap_or_default(),
                    })
                    .collect(),
            )),
            SplitMethod::Manual => Err(Error::Validation(
                "changing the amount of a manually split expense needs new splits".to_string(),
            )),
        }
    }

    async fn owned_expense(&self, expense_id: &str, by: &str) -> Result<Expense> {
        let expense = self
            .store
            .expense(expense_id)
            .await?
            .ok_or_else(|| Error::not_found("Expense", expense_id))?;
        if expense.created_by != by {
            return Err(Error::Authorization(
                "only the creator of an expense can modify it".to_string(),
            ));
        }
        Ok(expense)
    }

    // Balances and settlement

    pub async fn compute_balances(&self, pool_id: &str) -> Result<BalanceSheet> {
        self.active_pool(pool_id).await?;
        let members = self.store.members(pool_id).await?;
        let expenses = self.store.expenses(pool_id).await?;
        Ok(compute_balances(&members, &expenses))
    }

    /// Suggests transfers that settle the pool and stores each of them as a
    /// pending transaction.
    ///
    /// Calls on the same pool run one at a time. Calling again without any
    /// change in between stores the same suggestions a second time, unless
    /// the service was configured to reuse pending transactions.
    pub async fn suggest_and_persist_settlements(
        &self,
        pool_id: &str,
    ) -> Result<Vec<SuggestedSettlement>> {
        let lock = self
            .settle_locks
            .entry(pool_id.to_string())
            .or_default()
            .clone();
        let _guard = lock.lock().await;

        if self.options.reuse_pending {
            let pending: Vec<SuggestedSettlement> = self
                .store
                .transactions(pool_id)
                .await?
                .iter()
                .filter(|t| t.status == TransactionStatus::Pending)
                .map(SuggestedSettlement::from)
                .collect();
            if !pending.is_empty() {
                tracing::info!(pool = pool_id, count = pending.len(), "reusing pending settlements");
                return Ok(pending);
            }
        }

        let balances = self.compute_balances(pool_id).await?;
        let exchanges = suggest_settlements(&balances)?;
        let now = Utc::now();
        let transactions: Vec<Transaction> = exchanges
            .into_iter()
            .map(|e| Transaction::pending(pool_id.to_string(), e.from_user, e.to_user, e.amount, now))
            .collect();
        self.store.insert_transactions(&transactions).await?;
        self.invalidate(pool_id);
        tracing::info!(pool = pool_id, count = transactions.len(), "settlements suggested");
        Ok(transactions.iter().map(SuggestedSettlement::from).collect())
    }

    pub async fn transactions(&self, pool_id: &str) -> Result<Vec<Transaction>> {
        self.store.transactions(pool_id).await
    }

    pub async fn transaction(&self, transaction_id: &str) -> Result<Transaction> {
        self.store
            .transaction(transaction_id)
            .await?
            .ok_or_else(|| Error::not_found("Transaction", transaction_id))
    }

    /// Transaction of an active pool. Transactions of closed pools are
    /// frozen and reported as missing.
    async fn open_transaction(&self, transaction_id: &str) -> Result<(Transaction, Pool)> {
        let transaction = self.transaction(transaction_id).await?;
        let pool = self.active_pool(&transaction.pool_id).await?;
        Ok((transaction, pool))
    }

    /// Creditor confirms receipt. The notification goes out only after the
    /// new state is stored and cannot undo it.
    pub async fn mark_settled(&self, transaction_id: &str, by: &str) -> Result<Transaction> {
        let (mut transaction, pool) = self.open_transaction(transaction_id).await?;
        transaction.mark_settled(by, Utc::now())?;
        self.store.update_transaction(&transaction).await?;
        self.invalidate(&transaction.pool_id);
        tracing::info!(
            transaction = transaction_id,
            from = %transaction.from_user,
            to = %transaction.to_user,
            amount = %transaction.amount,
            "transaction settled"
        );

        match self.settlement_event(pool, &transaction).await {
            Ok(event) => self.notifier.dispatch(event),
            Err(e) => tracing::warn!(transaction = transaction_id, "skipping notification: {}", e),
        }
        Ok(transaction)
    }

    pub async fn mark_completed(&self, transaction_id: &str) -> Result<Transaction> {
        let (mut transaction, _) = self.open_transaction(transaction_id).await?;
        transaction.mark_completed(Utc::now())?;
        self.store.update_transaction(&transaction).await?;
        self.invalidate(&transaction.pool_id);
        tracing::info!(transaction = transaction_id, "transaction completed");
        Ok(transaction)
    }

    /// Either party or a pool admin may cancel.
    pub async fn cancel_transaction(&self, transaction_id: &str, by: &str) -> Result<Transaction> {
        let (mut transaction, pool) = self.open_transaction(transaction_id).await?;
        if transaction.from_user != by && transaction.to_user != by {
            self.require_admin(&pool, by).await?;
        }
        transaction.cancel()?;
        self.store.update_transaction(&transaction).await?;
        self.invalidate(&transaction.pool_id);
        tracing::info!(transaction = transaction_id, by, "transaction cancelled");
        Ok(transaction)
    }

    async fn settlement_event(&self, pool: Pool, transaction: &Transaction) -> Result<PoolEvent> {
        let members = self.store.members(&transaction.pool_id).await?;
        let email_of = |user: &str| {
            members
                .iter()
                .find(|m| m.user_id == user)
                .and_then(|m| m.email.clone())
        };
        Ok(PoolEvent::TransactionSettled {
            pool_name: pool.name,
            from_user: transaction.from_user.clone(),
            to_user: transaction.to_user.clone(),
            amount: transaction.amount,
            from_email: email_of(&transaction.from_user),
            to_email: email_of(&transaction.to_user),
        })
    }

    /// UPI deep link for the debtor of a pending transaction.
    pub async fn payment_request(&self, transaction_id: &str) -> Result<PaymentRequest> {
        let (transaction, pool) = self.open_transaction(transaction_id).await?;
        if transaction.status != TransactionStatus::Pending {
            return Err(Error::InvalidTransition(format!(
                "transaction {transaction_id} is no longer pending"
            )));
        }
        let recipient_upi = self
            .store
            .members(&pool.id)
            .await?
            .into_iter()
            .find(|m| m.user_id == transaction.to_user)
            .and_then(|m| m.upi_id)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "{} does not have a UPI ID configured",
                    transaction.to_user
                ))
            })?;
        let note = format!("PoolSplit payment for {}", pool.name);
        let transaction_ref = format!(
            "FS{}{}{}",
            pool.id, transaction.from_user, transaction.to_user
        );
        let payment_link = upi::payment_link(
            &recipient_upi,
            transaction.amount,
            Some(&note),
            Some(&transaction_ref),
        )?;
        Ok(PaymentRequest {
            transaction_id: transaction.id,
            payment_link,
            recipient_upi,
            amount: transaction.amount,
            note,
            transaction_ref,
        })
    }

    // Summary

    pub async fn pool_summary(&self, pool_id: &str) -> Result<PoolSummary> {
        let key = pool_summary_key(pool_id);
        if let Some(summary) = self
            .cache
            .get(&key)
            .and_then(|value| serde_json::from_value(value).ok())
        {
            return Ok(summary);
        }

        let pool = self.active_pool(pool_id).await?;
        let members = self.store.members(pool_id).await?;
        let mut expenses = self.store.expenses(pool_id).await?;
        let balances = compute_balances(&members, &expenses);
        let pending_transactions = self
            .store
            .transactions(pool_id)
            .await?
            .iter()
            .filter(|t| t.status == TransactionStatus::Pending)
            .count();

        expenses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let summary = PoolSummary {
            pool_id: pool.id,
            pool_name: pool.name,
            total_expenses: expenses.iter().map(|e| e.amount).sum(),
            member_count: balances.len(),
            expense_count: expenses.len(),
            pending_transactions,
            unsettled_members: balances.values().filter(|b| !b.is_settled()).count(),
            recent_expenses: expenses.into_iter().take(RECENT_EXPENSES).collect(),
        };
        match serde_json::to_value(&summary) {
            Ok(value) => self.cache.set(&key, value, self.options.summary_ttl),
            Err(e) => tracing::warn!(pool = pool_id, "could not cache summary: {}", e),
        }
        Ok(summary)
    }

    async fn active_pool(&self, pool_id: &str) -> Result<Pool> {
        match self.store.pool(pool_id).await? {
            Some(pool) if pool.is_active => Ok(pool),
            _ => Err(Error::not_found("Pool", pool_id)),
        }
    }

    fn invalidate(&self, pool_id: &str) {
        self.cache.invalidate(&pool_summary_key(pool_id));
    }

    /// Drops the summary and every member's pool list.
    async fn invalidate_pool_views(&self, pool_id: &str) -> Result<()> {
        self.invalidate(pool_id);
        for member in self.store.members(pool_id).await? {
            self.cache.invalidate(&user_pools_key(&member.user_id));
        }
        Ok(())
    }
}
