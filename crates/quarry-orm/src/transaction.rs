//! Transactions.

use tracing::warn;

use crate::connection::Connection;
use crate::error::{DbError, Result};

/// An open transaction or savepoint.
///
/// Commit or roll back explicitly; a transaction dropped while active is
/// rolled back before the connection's next statement.
#[derive(Debug)]
#[must_use = "a transaction is rolled back unless committed"]
pub struct Transaction<'c> {
    connection: &'c Connection,
    level: usize,
    active: bool,
}

impl<'c> Transaction<'c> {
    pub(crate) const fn new(connection: &'c Connection, level: usize) -> Self {
        Self {
            connection,
            level,
            active: true,
        }
    }

    /// Nesting level: 1 for the outermost transaction.
    #[must_use]
    pub const fn level(&self) -> usize {
        self.level
    }

    /// Whether commit or rollback is still pending.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Commits, or releases the savepoint of a nested transaction.
    pub async fn commit(&mut self) -> Result<()> {
        if !self.active {
            return Err(DbError::Transaction(String::from(
                "Failed to commit transaction: transaction was inactive.",
            )));
        }
        self.finish(true).await
    }

    /// Rolls back, or rolls back to the savepoint of a nested transaction.
    pub async fn rollback(&mut self) -> Result<()> {
        if !self.active {
            return Err(DbError::Transaction(String::from(
                "Failed to roll back transaction: transaction was inactive.",
            )));
        }
        self.finish(false).await
    }

    async fn finish(&mut self, commit: bool) -> Result<()> {
        let result = self.connection.end_transaction(self.level, commit).await;
        // A nesting error leaves the transaction untouched.
        if !matches!(result, Err(DbError::Transaction(_))) {
            self.active = false;
        }
        result
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.active {
            warn!(level = self.level, "transaction dropped while active; rolling it back");
            self.connection.orphan_transaction(self.level);
        }
    }
}
