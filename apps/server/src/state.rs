//! Shared application state

use crate::{
    config::Config,
    db::{DocumentStore, PostgresDocumentStore},
    services::{DownloadService, FileManifestBuilder, PatientDocumentAggregator, PatientSearchService},
    Error, Result,
};
use records_files::{ExportRoot, FileLocator, FsFileLocator};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AppStateOptions {
    /// Apply embedded migrations after connecting. Also gated by
    /// `database.run_migrations`.
    pub run_migrations: bool,
}

impl Default for AppStateOptions {
    fn default() -> Self {
        Self {
            run_migrations: true,
        }
    }
}

/// Shared application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn DocumentStore>,
    pub export_root: ExportRoot,
    pub aggregator: Arc<PatientDocumentAggregator>,
    pub manifest_builder: Arc<FileManifestBuilder>,
    pub patient_search: Arc<PatientSearchService>,
    pub downloads: Arc<DownloadService>,
}

impl AppState {
    /// Connect to PostgreSQL and build every service.
    pub async fn new(config: Config) -> Result<Self> {
        Self::new_with_options(config, AppStateOptions::default()).await
    }

    pub async fn new_with_options(config: Config, options: AppStateOptions) -> Result<Self> {
        tracing::info!("Initializing application state...");

        let db_pool = create_db_pool(&config).await?;

        if options.run_migrations && config.database.run_migrations {
            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&db_pool)
                .await
                .map_err(|e| Error::Internal(format!("Migration failed: {}", e)))?;
        }

        Self::from_store(config, Arc::new(PostgresDocumentStore::new(db_pool)))
    }

    /// Build the state on top of an existing document store, searching the
    /// real export tree.
    pub fn from_store(config: Config, store: Arc<dyn DocumentStore>) -> Result<Self> {
        let export_root = ExportRoot::new(&config.files.export_root)?;
        let locator = FsFileLocator::new(export_root.path())
            .with_walk_timeout(config.files.walk_timeout());
        Self::from_parts(config, store, export_root, Arc::new(locator))
    }

    pub fn from_parts(
        config: Config,
        store: Arc<dyn DocumentStore>,
        export_root: ExportRoot,
        locator: Arc<dyn FileLocator>,
    ) -> Result<Self> {
        let config = Arc::new(config);

        let aggregator = Arc::new(PatientDocumentAggregator::new(
            store.clone(),
            config.database.scan_concurrency,
            config.database.query_timeout(),
        ));
        let manifest_builder = Arc::new(FileManifestBuilder::new(
            aggregator.clone(),
            locator,
            export_root.clone(),
            config.files.locate_concurrency,
        ));
        let patient_search = Arc::new(PatientSearchService::new(
            store.clone(),
            config.search.default_limit,
            config.search.max_limit,
        ));
        let downloads = Arc::new(DownloadService::new(
            export_root.clone(),
            config.files.temp_dir(),
            config.files.archive_compression_level,
        ));

        tracing::info!(
            export_root = %export_root.path().display(),
            "Application state initialized"
        );

        Ok(Self {
            config,
            store,
            export_root,
            aggregator,
            manifest_builder,
            patient_search,
            downloads,
        })
    }
}

async fn create_db_pool(config: &Config) -> Result<PgPool> {
    tracing::info!("Creating database connection pool...");

    let statement_timeout = config.database.statement_timeout_seconds;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .min_connections(config.database.pool_min_size)
        .max_connections(config.database.pool_max_size)
        .acquire_timeout(std::time::Duration::from_secs(
            config.database.pool_timeout_seconds,
        ))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query(&format!("SET statement_timeout = '{}s'", statement_timeout))
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database.url)
        .await?;

    tracing::info!(
        "Database pool created (min: {}, max: {})",
        config.database.pool_min_size,
        config.database.pool_max_size
    );

    Ok(pool)
}
