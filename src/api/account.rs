/// Account-facing endpoints: balance, self-service spend, audit history
use crate::{
    account::Balance,
    auth::AuthContext,
    context::AppContext,
    db::models::{Currency, LedgerEntry},
    error::{AppError, AppResult},
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/api/account/:id/balance", get(get_balance))
        .route("/api/account/:id/credits", post(spend_credits))
        .route("/api/account/:id/ledger", get(get_ledger))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpendRequest {
    currency: Currency,
    amount: i64,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct SpendResponse {
    currency: Currency,
    balance: i64,
}

#[derive(Debug, Deserialize)]
struct LedgerQuery {
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// GET /api/account/:id/balance
async fn get_balance(
    State(context): State<Arc<AppContext>>,
    auth: AuthContext,
    Path(account_id): Path<String>,
) -> AppResult<Json<Balance>> {
    require_self_or_admin(&auth, &account_id)?;

    let balance = context.accounts.get_balance(&account_id).await?;
    Ok(Json(balance))
}

/// POST /api/account/:id/credits
///
/// Self-service spend after a confirmed generation. Callers can only spend
/// their own credits.
async fn spend_credits(
    State(context): State<Arc<AppContext>>,
    auth: AuthContext,
    Path(account_id): Path<String>,
    Json(request): Json<SpendRequest>,
) -> AppResult<Json<SpendResponse>> {
    if auth.account.id != account_id {
        return Err(AppError::Forbidden(
            "Credits can only be spent on your own account".to_string(),
        ));
    }

    let reason = request.reason.as_deref().unwrap_or("generation");
    // The returned balance comes from the spend's own transaction, so the
    // response cannot pick up a concurrent mutation.
    let balance = context
        .ledger
        .spend(
            &account_id,
            request.currency,
            request.amount,
            reason,
            &auth.account.id,
        )
        .await?;

    Ok(Json(SpendResponse {
        currency: request.currency,
        balance,
    }))
}

/// GET /api/account/:id/ledger
async fn get_ledger(
    State(context): State<Arc<AppContext>>,
    auth: AuthContext,
    Path(account_id): Path<String>,
    Query(query): Query<LedgerQuery>,
) -> AppResult<Json<Vec<LedgerEntry>>> {
    require_self_or_admin(&auth, &account_id)?;

    let limit = query.limit.clamp(1, 200);
    let entries = context.audit.history(&account_id, limit).await?;
    Ok(Json(entries))
}

fn require_self_or_admin(auth: &AuthContext, account_id: &str) -> AppResult<()> {
    if auth.account.id != account_id && !auth.account.is_admin() {
        return Err(AppError::Forbidden(
            "Not allowed to view this account".to_string(),
        ));
    }

    Ok(())
}
