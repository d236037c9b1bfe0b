use anyhow::Context;
use bookstore_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load BookStore settings")?;
    bookstore_telemetry::init(&settings.telemetry)?;

    bookstore_app::serve(settings).await
}
