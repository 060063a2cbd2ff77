use anyhow::Context;
use bookstore_app::App;
use bookstore_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load bookstore settings")?;
    bookstore_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.url,
        "bookstore bootstrap starting"
    );

    let app = App::build(settings).await?;
    app.run().await
}
