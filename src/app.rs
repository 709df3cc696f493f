//! Service bootstrap shared by the binaries.

use std::future::Future;

use anyhow::Context;
use axum::Router;
use bookstore_db::Database;
use bookstore_kernel::{settings::Settings, InitCtx, ModuleRegistry};

/// Open the database, register modules, and apply pending migrations
pub async fn prepare(settings: &Settings) -> anyhow::Result<(Database, ModuleRegistry)> {
    let db = Database::connect(&settings.database)
        .await
        .with_context(|| "failed to open database")?;

    let mut registry = ModuleRegistry::new();
    crate::modules::register_all(&mut registry, &db)?;

    let applied = db
        .run_migrations(&registry.collect_migrations())
        .await
        .with_context(|| "failed to apply migrations")?;
    tracing::info!(applied, "migrations complete");

    Ok((db, registry))
}

/// Apply pending migrations and exit
pub async fn migrate(settings: &Settings) -> anyhow::Result<()> {
    let (db, _registry) = prepare(settings).await?;
    db.close().await;
    Ok(())
}

/// Fully initialized router over a freshly prepared database
///
/// Used by tests and tooling that drive the service without a listener.
pub async fn router(settings: &Settings) -> anyhow::Result<(Database, Router)> {
    let (db, registry) = prepare(settings).await?;
    let ctx = InitCtx { settings };
    registry.init_all(&ctx).await?;
    registry.start_all(&ctx).await?;

    Ok((db, bookstore_http::build_router(&registry, settings)))
}

/// Run the service until `shutdown` resolves, then stop modules and close the pool
pub async fn serve(
    settings: Settings,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.url,
        "bookstore bootstrap starting"
    );

    let (db, registry) = prepare(&settings).await?;
    let ctx = InitCtx {
        settings: &settings,
    };

    registry.init_all(&ctx).await?;
    registry.start_all(&ctx).await?;
    tracing::info!("bookstore bootstrap complete");

    let served = bookstore_http::start_server(&registry, &settings, shutdown).await;

    registry.stop_all().await?;
    db.close().await;

    served
}
