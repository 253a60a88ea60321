//! Application bootstrap shared by the server binary, the CLI and tests.

use anyhow::Context;
use axum::Router;
use sea_orm::DatabaseConnection;
use stacks_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules;

/// A migrated database plus the registered, initialized modules
pub struct Application {
    settings: Settings,
    db: DatabaseConnection,
    registry: ModuleRegistry,
}

impl Application {
    /// Connect, apply pending migrations and initialize every module.
    pub async fn build(settings: Settings) -> anyhow::Result<Self> {
        let db = stacks_db::connect(&settings.database).await?;
        Self::with_connection(settings, db).await
    }

    /// Same as [`Application::build`] with an already open connection.
    pub async fn with_connection(
        settings: Settings,
        db: DatabaseConnection,
    ) -> anyhow::Result<Self> {
        let registry = module_registry()?;
        migrate(&db, &registry).await?;

        let app = Self {
            settings,
            db,
            registry,
        };
        app.registry
            .init_modules(&app.ctx())
            .await
            .context("module initialization failed")?;

        Ok(app)
    }

    pub fn ctx(&self) -> InitCtx<'_> {
        InitCtx {
            settings: &self.settings,
            db: &self.db,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The full HTTP router, middleware included
    pub fn router(&self) -> Router {
        stacks_http::build_router(&self.registry, &self.ctx())
    }

    /// Start modules, serve HTTP until shutdown, then stop modules.
    pub async fn serve(self) -> anyhow::Result<()> {
        let ctx = self.ctx();
        self.registry.start_modules(&ctx).await?;

        let served = stacks_http::start_server(&self.registry, &ctx).await;

        self.registry.stop_modules().await?;
        served
    }
}

/// Registry holding every project module
pub fn module_registry() -> anyhow::Result<ModuleRegistry> {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry)?;
    Ok(registry)
}

/// Apply the migrations of every registered module; returns the applied ids.
pub async fn migrate(
    db: &DatabaseConnection,
    registry: &ModuleRegistry,
) -> anyhow::Result<Vec<String>> {
    let applied = stacks_db::run_migrations(db, &registry.collect_migrations())
        .await
        .context("database migration failed")?;

    if applied.is_empty() {
        tracing::debug!("database schema is up to date");
    } else {
        tracing::info!(applied = ?applied, "database migrations applied");
    }
    Ok(applied)
}
