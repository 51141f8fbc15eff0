use anyhow::Context;
use story_stream::{server, telemetry, Settings};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env().context("invalid configuration")?;
    telemetry::init_tracing(settings.debug);
    tracing::debug!(?settings, "settings loaded");

    server::run(settings).await.context("story server failed")
}
