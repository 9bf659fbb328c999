/// Credit ledger
///
/// Owns the per-account image/video balances. Every read-modify-write plus
/// its audit entry happens in one transaction, serialized per account: an
/// async mutex keyed by account id orders concurrent callers in-process, and
/// the balance arithmetic is re-checked in the UPDATE's WHERE clause so a
/// deduction can never observe a stale balance that permits an overdraft.
use crate::{
    audit::{self, NewEntry},
    db::models::{Account, Currency, EntryKind},
    error::{AppError, AppResult},
};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Per-account serialization points
///
/// Distinct accounts never block each other; the map only ever grows by one
/// small entry per account seen.
#[derive(Default)]
pub struct AccountLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or create) the lock for one account
    pub fn for_account(&self, account_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(account_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Credit ledger service
pub struct CreditLedger {
    db: SqlitePool,
    locks: Arc<AccountLocks>,
}

impl CreditLedger {
    pub fn new(db: SqlitePool, locks: Arc<AccountLocks>) -> Self {
        Self { db, locks }
    }

    /// Increase a balance; counts toward `total_granted`
    pub async fn grant(
        &self,
        account_id: &str,
        currency: Currency,
        amount: i64,
        reason: &str,
        actor_id: &str,
    ) -> AppResult<i64> {
        if amount <= 0 {
            return Err(AppError::InvalidAmount(amount));
        }

        let lock = self.locks.for_account(account_id);
        let _guard = lock.lock().await;

        let account = self.fetch(account_id).await?;
        let before = account.balance(currency);

        let mut tx = self.db.begin().await?;

        let sql = format!(
            "UPDATE account SET {col} = {col} + ?1, total_granted = total_granted + ?1
             WHERE id = ?2 RETURNING {col}",
            col = currency.column()
        );
        let new_balance: i64 = sqlx::query_scalar(&sql)
            .bind(amount)
            .bind(account_id)
            .fetch_one(&mut *tx)
            .await?;

        audit::append(
            &mut tx,
            NewEntry {
                account_id,
                actor_id,
                kind: EntryKind::Grant,
                currency: Some(currency),
                amount,
                balance_before: before,
                balance_after: new_balance,
                reason,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(account_id, currency = currency.as_str(), amount, "Credits granted");

        Ok(new_balance)
    }

    /// Admin deduction; fails with `InsufficientCredits` unless the target
    /// is an admin account (admins succeed without mutating the balance)
    pub async fn deduct(
        &self,
        account_id: &str,
        currency: Currency,
        amount: i64,
        reason: &str,
        actor_id: &str,
    ) -> AppResult<i64> {
        self.debit(account_id, currency, amount, reason, actor_id, EntryKind::Deduct)
            .await
    }

    /// Self-service deduction, invoked after a confirmed successful
    /// generation; identical semantics to `deduct` but audited as `spend`
    pub async fn spend(
        &self,
        account_id: &str,
        currency: Currency,
        amount: i64,
        reason: &str,
        actor_id: &str,
    ) -> AppResult<i64> {
        self.debit(account_id, currency, amount, reason, actor_id, EntryKind::Spend)
            .await
    }

    async fn debit(
        &self,
        account_id: &str,
        currency: Currency,
        amount: i64,
        reason: &str,
        actor_id: &str,
        kind: EntryKind,
    ) -> AppResult<i64> {
        if amount <= 0 {
            return Err(AppError::InvalidAmount(amount));
        }

        let lock = self.locks.for_account(account_id);
        let _guard = lock.lock().await;

        let account = self.fetch(account_id).await?;
        let before = account.balance(currency);

        if account.is_admin() {
            // Admin accounts are exempt from balance checks; the call still
            // produces its audit row, with the balance left untouched.
            let mut tx = self.db.begin().await?;
            audit::append(
                &mut tx,
                NewEntry {
                    account_id,
                    actor_id,
                    kind,
                    currency: Some(currency),
                    amount: -amount,
                    balance_before: before,
                    balance_after: before,
                    reason,
                },
            )
            .await?;
            tx.commit().await?;
            return Ok(before);
        }

        let mut tx = self.db.begin().await?;

        let sql = format!(
            "UPDATE account SET {col} = {col} - ?1, total_used = total_used + ?1
             WHERE id = ?2 AND {col} >= ?1 RETURNING {col}",
            col = currency.column()
        );
        let new_balance: Option<i64> = sqlx::query_scalar(&sql)
            .bind(amount)
            .bind(account_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(new_balance) = new_balance else {
            // Precondition failed: no mutation, no audit row.
            tx.rollback().await?;
            return Err(AppError::InsufficientCredits {
                currency: currency.as_str().to_string(),
                balance: before,
                requested: amount,
            });
        };

        audit::append(
            &mut tx,
            NewEntry {
                account_id,
                actor_id,
                kind,
                currency: Some(currency),
                amount: -amount,
                balance_before: before,
                balance_after: new_balance,
                reason,
            },
        )
        .await?;

        tx.commit().await?;

        Ok(new_balance)
    }

    /// Admin-only override setting a balance to an exact value; the signed
    /// delta is what lands in the audit log
    pub async fn set_exact(
        &self,
        account_id: &str,
        currency: Currency,
        amount: i64,
        reason: &str,
        actor_id: &str,
    ) -> AppResult<i64> {
        if amount < 0 {
            return Err(AppError::InvalidAmount(amount));
        }

        let lock = self.locks.for_account(account_id);
        let _guard = lock.lock().await;

        let account = self.fetch(account_id).await?;
        let before = account.balance(currency);
        let delta = amount - before;

        // Keep total_granted - total_used == image + video: an upward set
        // counts as granted, a downward set as used.
        let granted_delta = delta.max(0);
        let used_delta = (-delta).max(0);

        let mut tx = self.db.begin().await?;

        let sql = format!(
            "UPDATE account SET {col} = ?1, total_granted = total_granted + ?2,
             total_used = total_used + ?3 WHERE id = ?4 RETURNING {col}",
            col = currency.column()
        );
        let new_balance: i64 = sqlx::query_scalar(&sql)
            .bind(amount)
            .bind(granted_delta)
            .bind(used_delta)
            .bind(account_id)
            .fetch_one(&mut *tx)
            .await?;

        audit::append(
            &mut tx,
            NewEntry {
                account_id,
                actor_id,
                kind: if delta < 0 { EntryKind::Deduct } else { EntryKind::Grant },
                currency: Some(currency),
                amount: delta,
                balance_before: before,
                balance_after: new_balance,
                reason,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            account_id,
            currency = currency.as_str(),
            balance = new_balance,
            "Balance set by admin"
        );

        Ok(new_balance)
    }

    async fn fetch(&self, account_id: &str) -> AppResult<Account> {
        let sql = format!("SELECT {} FROM account WHERE id = ?1", Account::COLUMNS);
        let row = sqlx::query(&sql)
            .bind(account_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(account_id.to_string()))?;

        Account::from_row(&row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{file_pool, insert_account, memory_pool};

    async fn setup() -> CreditLedger {
        let pool = memory_pool().await;
        insert_account(&pool, "acct-1", "user@example.com", "user").await;
        insert_account(&pool, "admin-1", "root@example.com", "admin").await;
        CreditLedger::new(pool, Arc::new(AccountLocks::new()))
    }

    #[tokio::test]
    async fn test_grant_then_spend() {
        let ledger = setup().await;

        let balance = ledger
            .grant("acct-1", Currency::Image, 10, "promo", "admin-1")
            .await
            .unwrap();
        assert_eq!(balance, 10);

        let balance = ledger
            .spend("acct-1", Currency::Image, 3, "generation", "acct-1")
            .await
            .unwrap();
        assert_eq!(balance, 7);

        let account = ledger.fetch("acct-1").await.unwrap();
        assert_eq!(account.image_credits, 7);
        assert_eq!(account.total_granted, 10);
        assert_eq!(account.total_used, 3);
    }

    #[tokio::test]
    async fn test_deduct_insufficient_writes_no_audit_row() {
        let ledger = setup().await;

        ledger
            .grant("acct-1", Currency::Image, 2, "promo", "admin-1")
            .await
            .unwrap();

        let err = ledger
            .spend("acct-1", Currency::Image, 5, "generation", "acct-1")
            .await
            .unwrap_err();
        match err {
            AppError::InsufficientCredits { balance, requested, .. } => {
                assert_eq!(balance, 2);
                assert_eq!(requested, 5);
            }
            other => panic!("Expected InsufficientCredits, got {:?}", other),
        }

        // Only the grant was audited
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ledger_entry WHERE account_id = 'acct-1'")
                .fetch_one(&ledger.db)
                .await
                .unwrap();
        assert_eq!(count, 1);

        let account = ledger.fetch("acct-1").await.unwrap();
        assert_eq!(account.image_credits, 2);
    }

    #[tokio::test]
    async fn test_spend_returns_its_own_outcome() {
        let ledger = setup().await;

        ledger
            .grant("acct-1", Currency::Image, 10, "promo", "admin-1")
            .await
            .unwrap();

        let balance = ledger
            .spend("acct-1", Currency::Image, 3, "generation", "acct-1")
            .await
            .unwrap();
        assert_eq!(balance, 7);

        // A later mutation must not change what the spend reported: its
        // return value matches the balance its own audit row recorded.
        ledger
            .grant("acct-1", Currency::Image, 100, "promo", "admin-1")
            .await
            .unwrap();

        let recorded: i64 = sqlx::query_scalar(
            "SELECT balance_after FROM ledger_entry
             WHERE account_id = 'acct-1' AND kind = 'spend'",
        )
        .fetch_one(&ledger.db)
        .await
        .unwrap();
        assert_eq!(recorded, balance);
    }

    #[tokio::test]
    async fn test_invalid_amounts() {
        let ledger = setup().await;

        assert!(matches!(
            ledger
                .grant("acct-1", Currency::Image, 0, "promo", "admin-1")
                .await,
            Err(AppError::InvalidAmount(0))
        ));
        assert!(matches!(
            ledger
                .spend("acct-1", Currency::Video, -3, "generation", "acct-1")
                .await,
            Err(AppError::InvalidAmount(-3))
        ));
        assert!(matches!(
            ledger
                .set_exact("acct-1", Currency::Image, -1, "fix", "admin-1")
                .await,
            Err(AppError::InvalidAmount(-1))
        ));
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let ledger = setup().await;

        assert!(matches!(
            ledger
                .grant("nobody", Currency::Image, 5, "promo", "admin-1")
                .await,
            Err(AppError::AccountNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_deduct_is_unlimited_and_non_mutating() {
        let ledger = setup().await;

        let balance = ledger
            .deduct("admin-1", Currency::Video, 100, "generation", "admin-1")
            .await
            .unwrap();
        assert_eq!(balance, 0);

        let account = ledger.fetch("admin-1").await.unwrap();
        assert_eq!(account.video_credits, 0);
        assert_eq!(account.total_used, 0);

        // The call is still audited
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ledger_entry WHERE account_id = 'admin-1'")
                .fetch_one(&ledger.db)
                .await
                .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_currencies_are_independent() {
        let ledger = setup().await;

        ledger
            .grant("acct-1", Currency::Image, 5, "promo", "admin-1")
            .await
            .unwrap();

        let account = ledger.fetch("acct-1").await.unwrap();
        assert_eq!(account.image_credits, 5);
        assert_eq!(account.video_credits, 0);

        let err = ledger
            .spend("acct-1", Currency::Video, 1, "generation", "acct-1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientCredits { .. }));
    }

    #[tokio::test]
    async fn test_set_exact_records_signed_delta() {
        let ledger = setup().await;

        ledger
            .grant("acct-1", Currency::Image, 4, "promo", "admin-1")
            .await
            .unwrap();

        let balance = ledger
            .set_exact("acct-1", Currency::Image, 9, "correction", "admin-1")
            .await
            .unwrap();
        assert_eq!(balance, 9);

        let balance = ledger
            .set_exact("acct-1", Currency::Image, 2, "correction", "admin-1")
            .await
            .unwrap();
        assert_eq!(balance, 2);

        let amounts: Vec<i64> = sqlx::query_scalar(
            "SELECT amount FROM ledger_entry WHERE account_id = 'acct-1' ORDER BY id",
        )
        .fetch_all(&ledger.db)
        .await
        .unwrap();
        assert_eq!(amounts, vec![4, 5, -7]);

        // Conservation holds across grant/set sequences
        let account = ledger.fetch("acct-1").await.unwrap();
        assert_eq!(
            account.total_granted - account.total_used,
            account.image_credits + account.video_credits
        );
    }

    #[tokio::test]
    async fn test_concurrent_deducts_never_overdraft() {
        let dir = tempfile::tempdir().unwrap();
        let pool = file_pool(&dir.path().join("ledger.sqlite")).await;
        insert_account(&pool, "acct-1", "user@example.com", "user").await;

        let ledger = Arc::new(CreditLedger::new(pool.clone(), Arc::new(AccountLocks::new())));
        ledger
            .grant("acct-1", Currency::Image, 5, "promo", "admin-1")
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger
                    .spend("acct-1", Currency::Image, 1, "generation", "acct-1")
                    .await
            }));
        }

        let mut successes = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(AppError::InsufficientCredits { .. }) => insufficient += 1,
                Err(other) => panic!("Unexpected error: {:?}", other),
            }
        }

        assert_eq!(successes, 5);
        assert_eq!(insufficient, 5);

        let account = ledger.fetch("acct-1").await.unwrap();
        assert_eq!(account.image_credits, 0);
        assert_eq!(
            account.total_granted - account.total_used,
            account.image_credits + account.video_credits
        );

        // One audit row per successful call, in serialization order
        let amounts: Vec<i64> = sqlx::query_scalar(
            "SELECT amount FROM ledger_entry WHERE account_id = 'acct-1' ORDER BY id",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(amounts, vec![5, -1, -1, -1, -1, -1]);
    }
}
