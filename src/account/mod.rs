/// Account management
///
/// Accounts are provisioned on first successful authentication and are
/// never physically removed; deletion is a status handled by
/// [`lifecycle::AccountLifecycle`]. Balances are mutated only through the
/// credit ledger, status only through the lifecycle service.

pub mod lifecycle;

use crate::{
    db::models::{Account, Role},
    error::{AppError, AppResult},
};
use chrono::Utc;
use sqlx::SqlitePool;

/// Account manager service
#[derive(Clone)]
pub struct AccountManager {
    db: SqlitePool,
}

/// Balance snapshot for one account
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub image_credits: i64,
    pub video_credits: i64,
}

impl AccountManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Fetch an account, creating it on first sight
    ///
    /// The identity (id, email, role) comes from the authenticator; it is
    /// trusted and not re-verified here.
    pub async fn ensure_account(&self, id: &str, email: &str, role: Role) -> AppResult<Account> {
        if let Some(account) = self.find(id).await? {
            return Ok(account);
        }

        // INSERT OR IGNORE keeps a concurrent first-login race harmless.
        sqlx::query(
            "INSERT OR IGNORE INTO account (id, email, role, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(id)
        .bind(email)
        .bind(role.as_str())
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        tracing::info!(account_id = id, role = role.as_str(), "Account provisioned");

        self.get_account(id).await
    }

    /// Get account by id
    pub async fn get_account(&self, id: &str) -> AppResult<Account> {
        self.find(id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(id.to_string()))
    }

    /// Current balances for both currencies
    pub async fn get_balance(&self, id: &str) -> AppResult<Balance> {
        let account = self.get_account(id).await?;

        Ok(Balance {
            image_credits: account.image_credits,
            video_credits: account.video_credits,
        })
    }

    /// List accounts with cursor pagination, ordered by id
    pub async fn list_accounts(
        &self,
        cursor: Option<&str>,
        limit: i64,
    ) -> AppResult<Vec<Account>> {
        let sql = if cursor.is_some() {
            format!(
                "SELECT {} FROM account WHERE id > ?1 ORDER BY id LIMIT ?2",
                Account::COLUMNS
            )
        } else {
            format!("SELECT {} FROM account ORDER BY id LIMIT ?1", Account::COLUMNS)
        };

        let query = if let Some(cursor) = cursor {
            sqlx::query(&sql).bind(cursor.to_string()).bind(limit)
        } else {
            sqlx::query(&sql).bind(limit)
        };

        let rows = query.fetch_all(&self.db).await?;

        rows.iter().map(Account::from_row).collect()
    }

    async fn find(&self, id: &str) -> AppResult<Option<Account>> {
        let sql = format!("SELECT {} FROM account WHERE id = ?1", Account::COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.db).await?;

        row.as_ref().map(Account::from_row).transpose()
    }
}
