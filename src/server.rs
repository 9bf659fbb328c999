/// HTTP server setup
use crate::{api, context::AppContext, error::AppResult};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the application router
pub fn build_router(context: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(api::routes())
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(context)
}

/// Serve the application
pub async fn serve(context: Arc<AppContext>) -> AppResult<()> {
    let addr = format!(
        "{}:{}",
        context.config.service.hostname, context.config.service.port
    );

    let router = build_router(context);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| crate::error::AppError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

async fn health(State(context): State<Arc<AppContext>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": context.config.service.version,
    }))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "NOT_FOUND",
            "message": "Unknown endpoint",
        })),
    )
}
