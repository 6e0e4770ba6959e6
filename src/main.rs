use std::{net::SocketAddr, sync::Arc};
use ticker_progression::api::{self, AppState};
use ticker_progression::config::AppConfig;
use ticker_progression::pipeline::Dashboard;
use ticker_progression::provider::PriceProvider;
use ticker_progression::utils::init_logger;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger()?;
    let app_config = AppConfig::load()?;

    tracing::info!("Starting ticker-progression");
    tracing::info!(
        environment = %app_config.environment,
        port = app_config.port,
        provider = %app_config.provider_base_url,
        timezone = %app_config.market_timezone,
        "Loaded configuration"
    );

    let provider: Box<dyn PriceProvider> = Box::new(app_config.yahoo_client()?);
    let dashboard = Arc::new(Dashboard::new(provider, app_config.chart_options()));

    let app_state = AppState {
        dashboard,
        config: Arc::new(app_config.clone()),
    };

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(app_config.chart_replenish_ms())
            .burst_size(app_config.chart_burst)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("chart rate limit must be non-zero"))?,
    );

    let app = api::routes()
        .merge(api::chart_routes().layer(GovernorLayer::new(governor_conf)))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], app_config.port));
    tracing::info!(%addr, "Dashboard listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
