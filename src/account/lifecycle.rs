/// Account status state machine
///
/// Four explicit transitions, each with its own guard clauses:
/// `active -> suspended -> active` (unsuspend) and
/// `active|suspended -> deleted -> active` (reactivate). Deletion is soft;
/// the row is never removed. Every successful transition writes exactly one
/// `status-change` audit entry in the same transaction. Guards fail closed:
/// nothing is written when a precondition is violated.
use crate::{
    audit::{self, NewEntry},
    db::models::{Account, AccountStatus, EntryKind},
    error::{AppError, AppResult},
    ledger::AccountLocks,
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Account lifecycle service
pub struct AccountLifecycle {
    db: SqlitePool,
    locks: Arc<AccountLocks>,
}

impl AccountLifecycle {
    pub fn new(db: SqlitePool, locks: Arc<AccountLocks>) -> Self {
        Self { db, locks }
    }

    /// Suspend an active account
    pub async fn suspend(&self, account_id: &str, reason: &str, actor_id: &str) -> AppResult<()> {
        if actor_id == account_id {
            return Err(AppError::SelfActionForbidden);
        }

        let lock = self.locks.for_account(account_id);
        let _guard = lock.lock().await;

        let account = self.fetch(account_id).await?;
        if account.is_admin() {
            return Err(AppError::AdminAccountProtected);
        }

        self.apply(
            &account,
            AccountStatus::Suspended,
            &[AccountStatus::Active],
            Some(reason),
            actor_id,
            "suspend",
        )
        .await
    }

    /// Lift a suspension
    pub async fn unsuspend(&self, account_id: &str, actor_id: &str) -> AppResult<()> {
        let lock = self.locks.for_account(account_id);
        let _guard = lock.lock().await;

        let account = self.fetch(account_id).await?;

        self.apply(
            &account,
            AccountStatus::Active,
            &[AccountStatus::Suspended],
            None,
            actor_id,
            "unsuspend",
        )
        .await
    }

    /// Soft-delete an account (active or suspended)
    pub async fn delete(&self, account_id: &str, reason: &str, actor_id: &str) -> AppResult<()> {
        if actor_id == account_id {
            return Err(AppError::SelfActionForbidden);
        }

        let lock = self.locks.for_account(account_id);
        let _guard = lock.lock().await;

        let account = self.fetch(account_id).await?;
        if account.is_admin() {
            return Err(AppError::AdminAccountProtected);
        }

        self.apply(
            &account,
            AccountStatus::Deleted,
            &[AccountStatus::Active, AccountStatus::Suspended],
            Some(reason),
            actor_id,
            "delete",
        )
        .await
    }

    /// Restore a soft-deleted account to active
    pub async fn reactivate(&self, account_id: &str, actor_id: &str) -> AppResult<()> {
        let lock = self.locks.for_account(account_id);
        let _guard = lock.lock().await;

        let account = self.fetch(account_id).await?;

        self.apply(
            &account,
            AccountStatus::Active,
            &[AccountStatus::Deleted],
            None,
            actor_id,
            "reactivate",
        )
        .await
    }

    /// Run one guarded transition plus its audit entry in one transaction
    async fn apply(
        &self,
        account: &Account,
        to: AccountStatus,
        from: &[AccountStatus],
        reason: Option<&str>,
        actor_id: &str,
        action: &str,
    ) -> AppResult<()> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        // The WHERE clause re-checks the current state, so a raced
        // transition surfaces as zero affected rows rather than a lost
        // update.
        let placeholders = from
            .iter()
            .map(|s| format!("'{}'", s.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE account
             SET status = ?1, status_reason = ?2, status_actor = ?3, status_at = ?4
             WHERE id = ?5 AND status IN ({placeholders})"
        );
        let result = sqlx::query(&sql)
            .bind(to.as_str())
            .bind(reason)
            .bind(actor_id)
            .bind(now)
            .bind(&account.id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(AppError::InvalidStateTransition {
                current: account.status.as_str().to_string(),
                action: action.to_string(),
            });
        }

        // Status events carry no currency amount.
        audit::append(
            &mut tx,
            NewEntry {
                account_id: &account.id,
                actor_id,
                kind: EntryKind::StatusChange,
                currency: None,
                amount: 0,
                balance_before: 0,
                balance_after: 0,
                reason: reason.unwrap_or(action),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            account_id = %account.id,
            action,
            actor_id,
            "Account status changed"
        );

        Ok(())
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
    use crate::db::testing::{insert_account, memory_pool};

    async fn setup() -> AccountLifecycle {
        let pool = memory_pool().await;
        insert_account(&pool, "acct-1", "user@example.com", "user").await;
        insert_account(&pool, "admin-1", "root@example.com", "admin").await;
        insert_account(&pool, "admin-2", "ops@example.com", "admin").await;
        AccountLifecycle::new(pool, Arc::new(AccountLocks::new()))
    }

    #[tokio::test]
    async fn test_suspend_and_unsuspend() {
        let lifecycle = setup().await;

        lifecycle.suspend("acct-1", "abuse", "admin-1").await.unwrap();

        let account = lifecycle.fetch("acct-1").await.unwrap();
        assert_eq!(account.status, AccountStatus::Suspended);
        assert_eq!(account.status_reason.as_deref(), Some("abuse"));
        assert_eq!(account.status_actor.as_deref(), Some("admin-1"));
        assert!(account.status_at.is_some());

        lifecycle.unsuspend("acct-1", "admin-1").await.unwrap();

        let account = lifecycle.fetch("acct-1").await.unwrap();
        assert_eq!(account.status, AccountStatus::Active);
        assert_eq!(account.status_reason, None);
    }

    #[tokio::test]
    async fn test_double_suspend_is_invalid() {
        let lifecycle = setup().await;

        lifecycle.suspend("acct-1", "abuse", "admin-1").await.unwrap();

        let err = lifecycle
            .suspend("acct-1", "abuse again", "admin-1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn test_self_action_forbidden() {
        let lifecycle = setup().await;

        assert!(matches!(
            lifecycle.suspend("admin-1", "oops", "admin-1").await,
            Err(AppError::SelfActionForbidden)
        ));
        assert!(matches!(
            lifecycle.delete("acct-1", "cleanup", "acct-1").await,
            Err(AppError::SelfActionForbidden)
        ));
    }

    #[tokio::test]
    async fn test_admin_accounts_are_protected() {
        let lifecycle = setup().await;

        assert!(matches!(
            lifecycle.suspend("admin-1", "abuse", "admin-2").await,
            Err(AppError::AdminAccountProtected)
        ));
        assert!(matches!(
            lifecycle.delete("admin-1", "cleanup", "admin-2").await,
            Err(AppError::AdminAccountProtected)
        ));
    }

    #[tokio::test]
    async fn test_delete_from_suspended_then_reactivate() {
        let lifecycle = setup().await;

        lifecycle.suspend("acct-1", "abuse", "admin-1").await.unwrap();
        lifecycle.delete("acct-1", "terms", "admin-1").await.unwrap();

        let account = lifecycle.fetch("acct-1").await.unwrap();
        assert_eq!(account.status, AccountStatus::Deleted);

        // Unsuspend does not apply to deleted accounts
        assert!(matches!(
            lifecycle.unsuspend("acct-1", "admin-1").await,
            Err(AppError::InvalidStateTransition { .. })
        ));

        lifecycle.reactivate("acct-1", "admin-1").await.unwrap();

        let account = lifecycle.fetch("acct-1").await.unwrap();
        assert_eq!(account.status, AccountStatus::Active);
        assert_eq!(account.status_reason, None);
    }

    #[tokio::test]
    async fn test_each_transition_writes_one_status_entry() {
        let lifecycle = setup().await;

        lifecycle.suspend("acct-1", "abuse", "admin-1").await.unwrap();
        lifecycle.unsuspend("acct-1", "admin-1").await.unwrap();

        let rows: Vec<(String, i64, i64, i64)> = sqlx::query_as(
            "SELECT kind, amount, balance_before, balance_after
             FROM ledger_entry WHERE account_id = 'acct-1' ORDER BY id",
        )
        .fetch_all(&lifecycle.db)
        .await
        .unwrap();

        assert_eq!(rows.len(), 2);
        for (kind, amount, before, after) in rows {
            assert_eq!(kind, "status-change");
            assert_eq!(amount, 0);
            assert_eq!(before, 0);
            assert_eq!(after, 0);
        }
    }

    #[tokio::test]
    async fn test_suspension_freezes_spending() {
        let lifecycle = setup().await;
        let ledger = crate::ledger::CreditLedger::new(
            lifecycle.db.clone(),
            Arc::new(AccountLocks::new()),
        );

        sqlx::query("UPDATE account SET image_credits = 5, total_granted = 5 WHERE id = 'acct-1'")
            .execute(&lifecycle.db)
            .await
            .unwrap();

        let balance = ledger
            .grant("acct-1", crate::db::models::Currency::Image, 10, "promo", "admin-1")
            .await
            .unwrap();
        assert_eq!(balance, 15);

        let balance = ledger
            .spend("acct-1", crate::db::models::Currency::Image, 1, "generation", "acct-1")
            .await
            .unwrap();
        assert_eq!(balance, 14);

        lifecycle.suspend("acct-1", "abuse", "admin-1").await.unwrap();

        // A suspended caller is turned away at the authentication boundary,
        // so the balance and the ledger see nothing further.
        let account = lifecycle.fetch("acct-1").await.unwrap();
        assert_ne!(account.status, AccountStatus::Active);
        assert_eq!(account.image_credits, 14);

        let entries: Vec<(String, i64)> = sqlx::query_as(
            "SELECT kind, amount FROM ledger_entry WHERE account_id = 'acct-1' ORDER BY id",
        )
        .fetch_all(&lifecycle.db)
        .await
        .unwrap();
        assert_eq!(
            entries,
            vec![
                ("grant".to_string(), 10),
                ("spend".to_string(), -1),
                ("status-change".to_string(), 0),
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let lifecycle = setup().await;

        assert!(matches!(
            lifecycle.suspend("nobody", "abuse", "admin-1").await,
            Err(AppError::AccountNotFound(_))
        ));
    }
}
