use anyhow::Context;
use stacks_app::Application;
use stacks_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load Stacks settings")?;
    stacks_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.url,
        "stacks-app bootstrap starting"
    );

    let app = Application::build(settings).await?;

    tracing::info!("stacks-app bootstrap complete");
    app.serve().await
}
