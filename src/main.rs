use anyhow::Result;
use sirberus::*;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(s) => s,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let client = api::ApiClient::new(&app_config.api)
        .map_err(|e| anyhow::anyhow!("api client: {}", e))?;
    tracing::info!(
        "{} {} following {}",
        version::NAME,
        version::VERSION,
        client.base_url()
    );

    let overview = monitor::Overview::open(&client, &app_config);
    let targets = app_config
        .watch
        .services
        .iter()
        .map(models::EntityId::service)
        .chain(
            app_config
                .watch
                .containers
                .iter()
                .map(models::EntityId::container),
        );
    let screens: Vec<monitor::EntityScreen> = targets
        .map(|target| monitor::EntityScreen::open(&client, &app_config, target))
        .collect();

    shutdown_signal().await;
    tracing::info!("Received shutdown signal");
    drop(screens);
    drop(overview);
    Ok(())
}
