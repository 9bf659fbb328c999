/// Admin endpoints, all behind the admin gateway
use crate::{
    auth::AdminAuthContext,
    context::AppContext,
    db::models::{Account, Currency},
    error::{AppError, AppResult},
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/api/admin/accounts", get(list_accounts))
        .route("/api/admin/account/:id/credits", post(adjust_credits))
        .route("/api/admin/account/:id/status", put(change_status))
}

/// Balance adjustment verbs
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum CreditAction {
    Grant,
    Deduct,
    /// Set the balance to an exact value
    Set,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreditRequest {
    action: CreditAction,
    currency: Currency,
    amount: i64,
    reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreditResponse {
    currency: Currency,
    balance: i64,
}

/// Status transition verbs
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StatusAction {
    Suspend,
    Unsuspend,
    Delete,
    Reactivate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusRequest {
    action: StatusAction,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    cursor: Option<String>,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
struct ListResponse {
    accounts: Vec<Account>,
    cursor: Option<String>,
}

/// POST /api/admin/account/:id/credits
async fn adjust_credits(
    State(context): State<Arc<AppContext>>,
    admin: AdminAuthContext,
    Path(account_id): Path<String>,
    Json(request): Json<CreditRequest>,
) -> AppResult<Json<CreditResponse>> {
    let actor = &admin.account.id;
    let balance = match request.action {
        CreditAction::Grant => {
            context
                .ledger
                .grant(&account_id, request.currency, request.amount, &request.reason, actor)
                .await?
        }
        CreditAction::Deduct => {
            context
                .ledger
                .deduct(&account_id, request.currency, request.amount, &request.reason, actor)
                .await?
        }
        CreditAction::Set => {
            context
                .ledger
                .set_exact(&account_id, request.currency, request.amount, &request.reason, actor)
                .await?
        }
    };

    Ok(Json(CreditResponse {
        currency: request.currency,
        balance,
    }))
}

/// PUT /api/admin/account/:id/status
async fn change_status(
    State(context): State<Arc<AppContext>>,
    admin: AdminAuthContext,
    Path(account_id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> AppResult<Json<Account>> {
    let actor = &admin.account.id;

    match request.action {
        StatusAction::Suspend => {
            let reason = required_reason(&request, "suspend")?;
            context.lifecycle.suspend(&account_id, reason, actor).await?;
        }
        StatusAction::Unsuspend => {
            context.lifecycle.unsuspend(&account_id, actor).await?;
        }
        StatusAction::Delete => {
            let reason = required_reason(&request, "delete")?;
            context.lifecycle.delete(&account_id, reason, actor).await?;
        }
        StatusAction::Reactivate => {
            context.lifecycle.reactivate(&account_id, actor).await?;
        }
    }

    let account = context.accounts.get_account(&account_id).await?;
    Ok(Json(account))
}

/// GET /api/admin/accounts
async fn list_accounts(
    State(context): State<Arc<AppContext>>,
    _admin: AdminAuthContext,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ListResponse>> {
    let limit = query.limit.clamp(1, 100);
    let accounts = context
        .accounts
        .list_accounts(query.cursor.as_deref(), limit)
        .await?;

    let cursor = if accounts.len() as i64 == limit {
        accounts.last().map(|a| a.id.clone())
    } else {
        None
    };

    Ok(Json(ListResponse { accounts, cursor }))
}

fn required_reason<'a>(request: &'a StatusRequest, action: &str) -> AppResult<&'a str> {
    request
        .reason
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| AppError::Validation(format!("A reason is required to {}", action)))
}
