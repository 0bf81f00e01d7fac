use std::env;

use tokio::time::sleep;
use tracing_appender::non_blocking::WorkerGuard;

mod consts;
mod settings;

#[tokio::main]
async fn main() -> Result<(), ()> {
    let _guard = init_logger();

    let settings = settings::load().map_err(|e| tracing::error!("Invalid settings: {}", e))?;
    let mut client = settings::client(&settings).map_err(|e| tracing::error!("Vault client: {}", e))?;
    let authenticator = settings::authenticator(&settings);

    loop {
        // retries are ours, the authenticator never retries
        if let Err(e) = authenticator
            .ensure_authenticated(&mut client, &settings.provider)
            .await
        {
            tracing::error!("Vault authentication failed: {}", e);
        }

        tokio::select! {
            _ = sleep(settings.auth_interval) => {}
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    if let Err(e) = authenticator.revoke_if_valid(&mut client).await {
        tracing::warn!("Token revocation failed, treating local token as stale: {}", e);
    }
    Ok(())
}

fn init_logger() -> Option<WorkerGuard> {
    use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
    use tracing_log::LogTracer;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::{EnvFilter, Registry};

    if !env::var("JSON_LOG").map_or(false, |s| s.parse().unwrap_or_default()) {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
        return None;
    }

    // Redirect the logs from log library to tracing's subscribers.
    LogTracer::init().expect("Unable to setup log tracer!");

    let app_name = concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION")).to_string();

    // Non-blocking stdout writer
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let bunyan_formatting_layer = BunyanFormattingLayer::new(app_name, non_blocking_writer);
    let subscriber = Registry::default()
        .with(EnvFilter::from_default_env())
        .with(JsonStorageLayer)
        .with(bunyan_formatting_layer);
    tracing::subscriber::set_global_default(subscriber).expect("Unable to set global subscriber");
    Some(guard)
}
