use anyhow::Result;
use clap::Parser;
use tokio::{net::TcpListener, signal, task};
use tracing_subscriber::EnvFilter;

use wellspring::{
    catalog::{google::GoogleBooks, BookFinder, Subjects},
    config::{LogFormat, Settings},
    core::Application,
    http,
    infrastructure::{persistence::Archive, Termination},
};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

fn make_application(settings: &Settings) -> Result<Application<Archive, GoogleBooks>> {
    let archive = Archive::try_new(&settings.store_path)?;
    let catalog = GoogleBooks::new(
        &settings.catalog_url,
        settings.api_key.clone(),
        settings.request_timeout(),
    )?;
    let finder = BookFinder::new(
        catalog,
        Subjects::default(),
        settings.default_listing.into(),
    );

    Ok(Application::try_new(archive, finder)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::parse();
    init_tracing(settings.log_format);

    let application = make_application(&settings)?;
    let listener = TcpListener::bind(settings.listen).await?;
    tracing::info!(
        listen = %settings.listen,
        store = %settings.store_path.display(),
        "Wellspring started"
    );

    let terminator = Termination::new();
    let interrupt = terminator.clone();
    task::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutting down");
                interrupt.signal();
            }
            Err(error) => tracing::error!(%error, "Unable to listen for shutdown signal"),
        }
    });

    http::Api::new(application)
        .start(listener, terminator.waiter())
        .await?;

    Ok(())
}
