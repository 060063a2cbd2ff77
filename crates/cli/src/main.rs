use anyhow::Context;
use clap::{Parser, Subcommand};

use bookstore_app::App;
use bookstore_kernel::settings::{Settings, StorageBackend};

#[derive(Debug, Parser)]
#[command(name = "bookstore", version, about = "Bookstore service command line")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Print the merged OpenAPI document
    Openapi,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load().with_context(|| "failed to load bookstore settings")?;

    match cli.command {
        Command::Serve => {
            bookstore_telemetry::init(&settings.telemetry)?;
            App::build(settings).await?.run().await
        }
        Command::Migrate => {
            bookstore_telemetry::init(&settings.telemetry)?;
            if settings.database.backend == StorageBackend::Memory {
                tracing::warn!("memory backend configured; nothing to migrate");
                return Ok(());
            }
            let app = App::build(settings).await?;
            tracing::info!(applied = app.migrations_applied, "migrations complete");
            println!("applied {} migration(s)", app.migrations_applied);
            Ok(())
        }
        Command::Openapi => {
            // Documentation only needs the module set, not a live database.
            settings.database.backend = StorageBackend::Memory;
            let app = App::build(settings).await?;
            let spec = bookstore_http::router::build_openapi(&app.registry);
            println!(
                "{}",
                serde_json::to_string_pretty(&spec).context("failed to render OpenAPI document")?
            );
            Ok(())
        }
    }
}
