//! Lifecycle of settlement transactions.
//!
//! ```text
//! pending ──mark_completed / mark_settled──▶ completed
//!    └──────────────cancel────────────────▶ cancelled
//! ```
//! Completed and cancelled are terminal.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::schemas::{Transaction, TransactionStatus};

impl Transaction {
    pub fn can_be_settled_by(&self, user: &str) -> bool {
        self.to_user == user && self.status == TransactionStatus::Pending && !self.is_settled
    }

    /// Administrative closure.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_pending("complete")?;
        self.status = TransactionStatus::Completed;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Confirmation by the creditor that the money arrived.
    pub fn mark_settled(&mut self, by_user: &str, now: DateTime<Utc>) -> Result<()> {
        if by_user != self.to_user {
            return Err(Error::Authorization(
                "only the creditor can mark a transaction as settled".to_string(),
            ));
        }
        if self.is_settled {
            return Err(Error::InvalidTransition(format!(
                "transaction {} is already settled",
                self.id
            )));
        }
        self.ensure_pending("settle")?;
        self.is_settled = true;
        self.status = TransactionStatus::Completed;
        self.settled_at = Some(now);
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<()> {
        self.ensure_pending("cancel")?;
        self.status = TransactionStatus::Cancelled;
        Ok(())
    }

    fn ensure_pending(&self, action: &str) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::InvalidTransition(format!(
                "cannot {action} transaction {} in status {:?}",
                self.id, self.status
            )));
        }
        Ok(())
    }
}
