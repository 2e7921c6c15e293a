//! Operator entry-point: applies schema migrations and checks the store.

use std::env;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result, eyre};
use diesel::{Connection, PgConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use futures_util::FutureExt;
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use feedback_engine::config::EngineSettings;
use feedback_engine::domain::Error;
use feedback_engine::domain::ports::Store;
use feedback_engine::outbound::persistence::{DbPool, DieselStore, PoolConfig};

/// Embedded migrations from the backend/migrations directory.
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(Debug, Parser)]
#[command(name = "feedback-engine", about = "Feedback engine maintenance commands")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Apply pending schema migrations.
    Migrate,
    /// Open a transaction and report the active administrator count.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Subcommands belong to clap; OrthoConfig only sees the program name.
    let settings = EngineSettings::load_from_iter(env::args_os().take(1))
        .map_err(|err| eyre!("failed to load settings: {err}"))?;
    init_tracing(settings.log_json);

    let pool_config = settings.pool_config()?;
    match cli.command {
        Command::Migrate => migrate(pool_config.database_url().to_owned()).await,
        Command::Check => check(pool_config).await,
    }
}

fn init_tracing(json: bool) {
    let builder = fmt().with_env_filter(EnvFilter::from_default_env());
    let outcome = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = outcome {
        warn!(error = %e, "tracing init failed");
    }
}

async fn migrate(database_url: String) -> Result<()> {
    let applied = tokio::task::spawn_blocking(move || -> Result<usize> {
        let mut conn = PgConnection::establish(&database_url)
            .wrap_err("failed to connect for migrations")?;
        let versions = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|err| eyre!("failed to run migrations: {err}"))?;
        Ok(versions.len())
    })
    .await
    .wrap_err("migration task failed")??;

    info!(applied, "migrations applied");
    Ok(())
}

async fn check(config: PoolConfig) -> Result<()> {
    let pool = DbPool::new(config)
        .await
        .wrap_err("failed to build connection pool")?;
    let store = DieselStore::new(pool);

    let admins = store
        .transaction(|tx| async move { tx.lock_active_admins().await.map_err(Error::from) }.boxed())
        .await
        .wrap_err("store check failed")?;

    info!(active_admins = admins.len(), "store reachable");
    if admins.is_empty() {
        return Err(eyre!("no active administrator exists"));
    }
    Ok(())
}
