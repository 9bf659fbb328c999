/// HTTP API routes
pub mod account;
pub mod admin;
pub mod asset;

use crate::context::AppContext;
use axum::Router;
use std::sync::Arc;

/// All API routes
pub fn routes() -> Router<Arc<AppContext>> {
    Router::new()
        .merge(account::routes())
        .merge(admin::routes())
        .merge(asset::routes())
}
