/// Background task implementations
use crate::{context::AppContext, db, error::AppResult, retention::SweepOutcome};
use chrono::Utc;

/// Delete all assets whose retention deadline has passed
pub async fn sweep_expired_assets(context: &AppContext) -> AppResult<SweepOutcome> {
    context.retention.sweep(Utc::now()).await
}

/// Verify the database still answers
pub async fn health_check(context: &AppContext) -> AppResult<()> {
    db::test_connection(&context.db).await
}
