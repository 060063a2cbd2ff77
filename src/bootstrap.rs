//! Application assembly: storage, module registration, migrations, serving.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use bookstore_kernel::{
    settings::{Settings, StorageBackend},
    InitCtx, ModuleRegistry,
};

use crate::modules::{
    self,
    books::store::{MemoryBookStore, SharedStore, SqliteBookStore},
};

/// A fully assembled application, ready to serve.
pub struct App {
    pub settings: Settings,
    pub registry: ModuleRegistry,
    /// Number of migrations applied while assembling.
    pub migrations_applied: usize,
}

impl App {
    /// Open the configured store, register modules and apply pending migrations.
    pub async fn build(settings: Settings) -> anyhow::Result<Self> {
        tracing::info!(
            env = ?settings.environment,
            backend = ?settings.database.backend,
            "assembling bookstore"
        );

        let mut registry = ModuleRegistry::new();

        let migrations_applied = match settings.database.backend {
            StorageBackend::Memory => {
                let store: SharedStore = Arc::new(MemoryBookStore::new());
                modules::register_all(&mut registry, store)?;
                0
            }
            StorageBackend::Sqlite => {
                let pool = bookstore_db::connect(&settings.database)
                    .await
                    .context("failed to open book database")?;
                let store: SharedStore = Arc::new(SqliteBookStore::new(pool.clone()));
                modules::register_all(&mut registry, store)?;

                bookstore_db::run_migrations(&pool, &registry.collect_migrations())
                    .await
                    .context("failed to apply migrations")?
            }
        };

        tracing::info!(
            modules = registry.len(),
            migrations_applied,
            "bookstore assembled"
        );

        Ok(Self {
            settings,
            registry,
            migrations_applied,
        })
    }

    /// Run module `init` and `start` hooks.
    pub async fn start(&self) -> anyhow::Result<()> {
        let ctx = InitCtx {
            settings: &self.settings,
        };
        self.registry.init_all(&ctx).await?;
        self.registry.start_all(&ctx).await?;
        Ok(())
    }

    /// The complete HTTP router, including middleware and docs.
    pub fn router(&self) -> Router {
        bookstore_http::build_router(&self.registry, &self.settings)
    }

    /// Start modules, serve until a shutdown signal, then stop modules.
    pub async fn run(self) -> anyhow::Result<()> {
        self.start().await?;

        let served = bookstore_http::start_server(
            &self.registry,
            &self.settings,
            bookstore_http::shutdown_signal(),
        )
        .await;

        self.registry
            .stop_all()
            .await
            .context("failed to stop modules")?;

        served
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_skips_migrations() {
        let mut settings = Settings::default();
        settings.database.backend = StorageBackend::Memory;

        let app = App::build(settings).await.unwrap();
        assert_eq!(app.migrations_applied, 0);
        assert!(app.registry.get_module("books").is_some());
        app.start().await.unwrap();
    }

    #[tokio::test]
    async fn sqlite_backend_applies_books_schema() {
        let mut settings = Settings::default();
        settings.database.url = "sqlite::memory:".to_string();

        let app = App::build(settings).await.unwrap();
        assert_eq!(app.migrations_applied, 1);
        app.start().await.unwrap();
    }
}
