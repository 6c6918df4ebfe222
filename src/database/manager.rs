use std::sync::Arc;
use tracing::{info, warn};

use super::memory::MemoryStore;
use super::postgres::PgStore;
use super::store::{Store, StoreError};
use crate::config::DatabaseConfig;

/// Opens the configured store: PostgreSQL when a URL is set, otherwise the in-memory store.
pub async fn open_store(config: &DatabaseConfig, run_migrations: bool) -> Result<Arc<dyn Store>, StoreError> {
    match config.url {
        Some(_) => {
            let store = PgStore::connect(config).await?;
            if run_migrations {
                store.migrate().await?;
            } else {
                info!("Skipping database migrations");
            }
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL not set; using the in-memory store (data is lost on restart)");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn falls_back_to_memory_without_url() {
        let config = DatabaseConfig {
            url: None,
            max_connections: 1,
            connection_timeout: 1,
        };
        let store = open_store(&config, true).await.unwrap();
        assert!(store.list_users().await.unwrap().is_empty());
    }
}
