/// Append-only audit log
///
/// Every balance or status mutation writes exactly one entry here, inside
/// the same transaction as the mutation. Entries are never updated or
/// deleted; per-account order follows the autoincrement id.
use crate::{
    db::models::{Currency, EntryKind, LedgerEntry},
    error::AppResult,
};
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};

/// A ledger entry about to be written
#[derive(Debug, Clone)]
pub struct NewEntry<'a> {
    pub account_id: &'a str,
    pub actor_id: &'a str,
    pub kind: EntryKind,
    pub currency: Option<Currency>,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub reason: &'a str,
}

/// Append an entry within the caller's transaction
pub async fn append(tx: &mut Transaction<'_, Sqlite>, entry: NewEntry<'_>) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO ledger_entry
         (account_id, actor_id, kind, currency, amount, balance_before, balance_after, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(entry.account_id)
    .bind(entry.actor_id)
    .bind(entry.kind.as_str())
    .bind(entry.currency.map(|c| c.as_str()))
    .bind(entry.amount)
    .bind(entry.balance_before)
    .bind(entry.balance_after)
    .bind(entry.reason)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Read access to the audit log
#[derive(Clone)]
pub struct AuditLog {
    db: SqlitePool,
}

impl AuditLog {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Audit history for an account, newest first
    pub async fn history(&self, account_id: &str, limit: i64) -> AppResult<Vec<LedgerEntry>> {
        let rows = sqlx::query(
            "SELECT id, account_id, actor_id, kind, currency, amount,
                    balance_before, balance_after, reason, created_at
             FROM ledger_entry
             WHERE account_id = ?1
             ORDER BY id DESC
             LIMIT ?2",
        )
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(LedgerEntry::from_row).collect()
    }
}
