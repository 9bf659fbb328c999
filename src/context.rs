/// Shared application context
use crate::{
    account::{lifecycle::AccountLifecycle, AccountManager},
    audit::AuditLog,
    config::ServerConfig,
    db,
    error::AppResult,
    ledger::{AccountLocks, CreditLedger},
    retention::RetentionManager,
    storage::DiskStore,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub accounts: Arc<AccountManager>,
    pub ledger: Arc<CreditLedger>,
    pub lifecycle: Arc<AccountLifecycle>,
    pub retention: Arc<RetentionManager>,
    pub audit: Arc<AuditLog>,
}

impl AppContext {
    /// Build the context: open the database, run migrations, wire services
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        config.validate()?;

        let pool = db::create_pool(
            &config.database.path,
            db::DatabaseOptions {
                max_connections: config.database.max_connections,
                ..Default::default()
            },
        )
        .await?;

        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;
        tracing::info!(path = %config.database.path.display(), "Database ready");

        let storage = Arc::new(DiskStore::new(&config.storage.blob_directory).await?);

        // The ledger and the lifecycle service serialize writes to the same
        // account rows, so they share one lock table.
        let locks = Arc::new(AccountLocks::new());

        let accounts = Arc::new(AccountManager::new(pool.clone()));
        let ledger = Arc::new(CreditLedger::new(pool.clone(), locks.clone()));
        let lifecycle = Arc::new(AccountLifecycle::new(pool.clone(), locks));
        let retention = Arc::new(RetentionManager::new(
            pool.clone(),
            storage,
            config.retention.clone(),
        ));
        let audit = Arc::new(AuditLog::new(pool.clone()));

        Ok(Self {
            config: Arc::new(config),
            db: pool,
            accounts,
            ledger,
            lifecycle,
            retention,
            audit,
        })
    }
}
