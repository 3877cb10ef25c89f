use std::sync::Arc;

use learnhub_db::DbPool;

use crate::cache::ReportCache;
use crate::config::EngineConfig;

/// Shared engine state passed to every operation.
///
/// Cheap to clone: the pool is reference-counted and the rest sits behind `Arc`.
#[derive(Clone)]
pub struct EngineState {
    pub pool: DbPool,
    pub config: Arc<EngineConfig>,
    /// Report memoisation shared by every analytics call.
    pub cache: Arc<ReportCache>,
}

impl EngineState {
    pub fn new(pool: DbPool, config: EngineConfig) -> Self {
        let cache = ReportCache::new(config.course_report_ttl, config.student_report_ttl);
        Self {
            pool,
            config: Arc::new(config),
            cache: Arc::new(cache),
        }
    }

    /// Open the pool, apply pending migrations and build the state.
    pub async fn connect(config: EngineConfig) -> Result<Self, sqlx::Error> {
        let pool = learnhub_db::create_pool(&config.database_url, config.db_max_connections).await?;
        learnhub_db::run_migrations(&pool)
            .await
            .map_err(|e| sqlx::Error::Migrate(Box::new(e)))?;
        learnhub_db::health_check(&pool).await?;
        tracing::info!(
            max_connections = config.db_max_connections,
            "Engine connected to database"
        );
        Ok(Self::new(pool, config))
    }
}
