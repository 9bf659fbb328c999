/// Database models for accounts, ledger entries, and media assets
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};

/// Credit currency: two independent pools per account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Image,
    Video,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Image => "image",
            Currency::Video => "video",
        }
    }

    /// Column holding this currency's balance
    pub fn column(&self) -> &'static str {
        match self {
            Currency::Image => "image_credits",
            Currency::Video => "video_credits",
        }
    }

    pub fn parse(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "image" => Ok(Currency::Image),
            "video" => Ok(Currency::Video),
            _ => Err(AppError::Validation(format!("Invalid currency: {}", s))),
        }
    }
}

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(AppError::Validation(format!("Invalid role: {}", s))),
        }
    }
}

/// Account status state machine: active is the only state that can move to
/// suspended or deleted; both return to active via their reverse transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
    Deleted,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Suspended => "suspended",
            AccountStatus::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "suspended" => Ok(AccountStatus::Suspended),
            "deleted" => Ok(AccountStatus::Deleted),
            _ => Err(AppError::Validation(format!("Invalid status: {}", s))),
        }
    }
}

/// Audit log entry kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    /// Admin credit grant
    Grant,
    /// Admin credit deduction
    Deduct,
    /// Self-service deduction on successful generation
    Spend,
    /// Account status transition
    StatusChange,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Grant => "grant",
            EntryKind::Deduct => "deduct",
            EntryKind::Spend => "spend",
            EntryKind::StatusChange => "status-change",
        }
    }

    pub fn parse(s: &str) -> AppResult<Self> {
        match s {
            "grant" => Ok(EntryKind::Grant),
            "deduct" => Ok(EntryKind::Deduct),
            "spend" => Ok(EntryKind::Spend),
            "status-change" => Ok(EntryKind::StatusChange),
            _ => Err(AppError::Validation(format!("Invalid entry kind: {}", s))),
        }
    }
}

/// Generated media content type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Image,
    Video,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Image => "image",
            ContentType::Video => "video",
        }
    }

    /// Maximum retention extensions for non-admin owners
    pub fn max_extensions(&self) -> i64 {
        match self {
            ContentType::Image => 3,
            ContentType::Video => 1,
        }
    }

    pub fn parse(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "image" => Ok(ContentType::Image),
            "video" => Ok(ContentType::Video),
            _ => Err(AppError::Validation(format!("Invalid content type: {}", s))),
        }
    }
}

/// Account record in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub image_credits: i64,
    pub video_credits: i64,
    pub total_granted: i64,
    pub total_used: i64,
    pub status: AccountStatus,
    pub status_reason: Option<String>,
    pub status_actor: Option<String>,
    pub status_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn balance(&self, currency: Currency) -> i64 {
        match currency {
            Currency::Image => self.image_credits,
            Currency::Video => self.video_credits,
        }
    }

    /// Columns selected by [`Account::from_row`]
    pub const COLUMNS: &'static str = "id, email, role, image_credits, video_credits, \
         total_granted, total_used, status, status_reason, status_actor, status_at, created_at";

    pub fn from_row(row: &SqliteRow) -> AppResult<Self> {
        let role: String = row.try_get("role")?;
        let status: String = row.try_get("status")?;

        Ok(Account {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            role: Role::parse(&role)?,
            image_credits: row.try_get("image_credits")?,
            video_credits: row.try_get("video_credits")?,
            total_granted: row.try_get("total_granted")?,
            total_used: row.try_get("total_used")?,
            status: AccountStatus::parse(&status)?,
            status_reason: row.try_get("status_reason")?,
            status_actor: row.try_get("status_actor")?,
            status_at: row.try_get("status_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Immutable audit log record; one per successful balance or status mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub account_id: String,
    pub actor_id: String,
    pub kind: EntryKind,
    pub currency: Option<Currency>,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn from_row(row: &SqliteRow) -> AppResult<Self> {
        let kind: String = row.try_get("kind")?;
        let currency: Option<String> = row.try_get("currency")?;

        Ok(LedgerEntry {
            id: row.try_get("id")?,
            account_id: row.try_get("account_id")?,
            actor_id: row.try_get("actor_id")?,
            kind: EntryKind::parse(&kind)?,
            currency: currency.as_deref().map(Currency::parse).transpose()?,
            amount: row.try_get("amount")?,
            balance_before: row.try_get("balance_before")?,
            balance_after: row.try_get("balance_after")?,
            reason: row.try_get("reason")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Generated media asset record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: String,
    pub owner_id: String,
    pub content_type: ContentType,
    pub blob_key: String,
    pub created_at: DateTime<Utc>,
    pub base_ttl_secs: i64,
    pub expires_at: DateTime<Utc>,
    pub extension_count: i64,
    pub last_extended_at: Option<DateTime<Utc>>,
    pub expired: bool,
}

impl MediaAsset {
    pub const COLUMNS: &'static str = "id, owner_id, content_type, blob_key, created_at, \
         base_ttl_secs, expires_at, extension_count, last_extended_at, expired";

    pub fn from_row(row: &SqliteRow) -> AppResult<Self> {
        let content_type: String = row.try_get("content_type")?;

        Ok(MediaAsset {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            content_type: ContentType::parse(&content_type)?,
            blob_key: row.try_get("blob_key")?,
            created_at: row.try_get("created_at")?,
            base_ttl_secs: row.try_get("base_ttl_secs")?,
            expires_at: row.try_get("expires_at")?,
            extension_count: row.try_get("extension_count")?,
            last_extended_at: row.try_get("last_extended_at")?,
            expired: row.try_get("expired")?,
        })
    }
}
