/// Media asset endpoints
use crate::{
    auth::AuthContext,
    context::AppContext,
    error::AppResult,
    retention::ExtensionOutcome,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/api/asset/:id/extend", post(extend_asset))
        .route("/api/asset/:id", delete(delete_asset))
}

/// POST /api/asset/:id/extend
async fn extend_asset(
    State(context): State<Arc<AppContext>>,
    auth: AuthContext,
    Path(asset_id): Path<String>,
) -> AppResult<Json<ExtensionOutcome>> {
    let outcome = context.retention.extend(&asset_id, &auth.account).await?;
    Ok(Json(outcome))
}

/// DELETE /api/asset/:id
async fn delete_asset(
    State(context): State<Arc<AppContext>>,
    auth: AuthContext,
    Path(asset_id): Path<String>,
) -> AppResult<StatusCode> {
    context.retention.delete_asset(&asset_id, &auth.account).await?;
    Ok(StatusCode::NO_CONTENT)
}
