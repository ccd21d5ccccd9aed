use habit_calendar::{load_calendar_config, load_data, router, AppState, Settings};
use std::net::SocketAddr;
use tokio::fs;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let settings = Settings::from_env();
    if let Some(parent) = settings.data_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let config = load_calendar_config(settings.calendars_path.as_deref()).await?;
    let data = load_data(&settings.data_path).await;
    info!(
        "loaded {} activity rows for {} categories",
        data.len(),
        config.categories().len()
    );
    let state = AppState::new(settings.data_path, config, data);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
