use crate::config::AppConfig;
use crate::error::DashboardError;
use crate::input::{parse_date, DashboardInput, DATE_FORMAT};
use crate::pipeline::Dashboard;
use crate::provider::PriceProvider;
use axum::{
    extract::{FromRef, Query, State},
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

pub type SharedDashboard = Arc<Dashboard<Box<dyn PriceProvider>>>;
pub type SharedConfig = Arc<AppConfig>;

#[derive(Clone)]
pub struct AppState {
    pub dashboard: SharedDashboard,
    pub config: SharedConfig,
}

impl FromRef<AppState> for SharedDashboard {
    fn from_ref(app_state: &AppState) -> SharedDashboard {
        app_state.dashboard.clone()
    }
}

impl FromRef<AppState> for SharedConfig {
    fn from_ref(app_state: &AppState) -> SharedConfig {
        app_state.config.clone()
    }
}

/// Widget values as they arrive from the page; blanks mean "use the default".
#[derive(Debug, Default, Deserialize)]
pub struct ChartQuery {
    pub tickers: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl ChartQuery {
    pub fn into_input(self, defaults: DashboardInput) -> Result<DashboardInput, DashboardError> {
        let pick_date = |value: Option<String>, fallback| match value.filter(|v| !v.trim().is_empty()) {
            Some(v) => parse_date(&v),
            None => Ok(fallback),
        };
        Ok(DashboardInput {
            tickers: self.tickers.unwrap_or(defaults.tickers),
            start: pick_date(self.start, defaults.start)?,
            end: pick_date(self.end, defaults.end)?,
        })
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
}

pub fn chart_routes() -> Router<AppState> {
    Router::new().route("/chart", get(chart_handler))
}

/// Every route, without rate limiting.
pub fn router(state: AppState) -> Router {
    routes().merge(chart_routes()).with_state(state)
}

#[instrument(skip(dashboard, config))]
pub async fn chart_handler(
    State(dashboard): State<SharedDashboard>,
    State(config): State<SharedConfig>,
    Query(query): Query<ChartQuery>,
) -> Result<Json<Value>, DashboardError> {
    let input = query.into_input(config.default_input())?;
    let figure = dashboard.render(&input).await?;
    Ok(Json(figure.to_plotly()))
}

#[instrument(skip(dashboard))]
pub async fn health_handler(State(dashboard): State<SharedDashboard>) -> impl IntoResponse {
    let cache = dashboard.cache_stats().await;
    Json(json!({ "status": "ok", "cache": cache }))
}

#[instrument(skip(config))]
pub async fn index_handler(State(config): State<SharedConfig>) -> Html<String> {
    debug!("Serving dashboard page");
    Html(render_page(&config.default_input(), &config.chart_options().title))
}

const PAGE_TEMPLATE: &str = include_str!("page.html");

pub fn render_page(defaults: &DashboardInput, title: &str) -> String {
    PAGE_TEMPLATE
        .replace("{{TITLE}}", &escape_html(title))
        .replace("{{TICKERS}}", &escape_html(&defaults.tickers))
        .replace("{{START}}", &defaults.start.format(DATE_FORMAT).to_string())
        .replace("{{END}}", &defaults.end.format(DATE_FORMAT).to_string())
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartOptions;
    use crate::provider::testing::StaticProvider;
    use crate::table::PriceSeries;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::NaiveDate;
    use tower::ServiceExt;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, d).unwrap()
    }

    fn state() -> AppState {
        let provider = StaticProvider::new()
            .with_series(PriceSeries::new("AAPL", vec![(date(2), Some(72.9)), (date(3), Some(72.2))]))
            .with_series(PriceSeries::new("MSFT", vec![(date(2), Some(154.8)), (date(3), Some(153.0))]))
            .with_unknown("NOPE");
        let provider: Box<dyn PriceProvider> = Box::new(provider);
        AppState {
            dashboard: Arc::new(Dashboard::new(provider, ChartOptions::default())),
            config: Arc::new(AppConfig::default()),
        }
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_chart_endpoint_returns_figure() {
        let app = router(state());
        let (status, body) = get(app, "/chart?tickers=aapl,%20msft&start=2020-01-01&end=2020-01-10").await;

        assert_eq!(status, StatusCode::OK);
        let figure: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(figure["frames"].as_array().unwrap().len(), 2);
        assert_eq!(figure["data"][0]["name"], "AAPL");
        assert_eq!(figure["data"][1]["name"], "MSFT");
    }

    #[tokio::test]
    async fn test_repeated_chart_request_hits_cache() {
        let state = state();
        let uri = "/chart?tickers=AAPL&start=2020-01-01&end=2020-01-10";
        get(router(state.clone()), uri).await;
        get(router(state.clone()), uri).await;

        let (status, body) = get(router(state), "/health").await;
        assert_eq!(status, StatusCode::OK);
        let health: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(health["cache"]["entries"], 1);
        assert_eq!(health["cache"]["hits"], 1);
        assert_eq!(health["cache"]["misses"], 1);
    }

    #[tokio::test]
    async fn test_chart_endpoint_rejects_inverted_range() {
        let (status, body) = get(router(state()), "/chart?tickers=AAPL&start=2020-02-01&end=2020-01-01").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: Value = serde_json::from_slice(&body).unwrap();
        assert!(error["error"].as_str().unwrap().contains("after end date"));
    }

    #[tokio::test]
    async fn test_chart_endpoint_rejects_bad_date() {
        let (status, _) = get(router(state()), "/chart?tickers=AAPL&start=yesterday").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chart_endpoint_unknown_symbol() {
        let (status, _) = get(router(state()), "/chart?tickers=NOPE&start=2020-01-01&end=2020-01-10").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_index_page_has_defaults() {
        let (status, body) = get(router(state()), "/").await;
        let page = String::from_utf8(body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert!(page.contains("Stock Value Progression Over Time"));
        assert!(page.contains(r#"value="AAPL,MSFT,GOOGL""#));
        assert!(page.contains(r#"value="2020-01-01""#));
        assert!(page.contains("Fetching data..."));
    }

    #[test]
    fn test_query_blank_fields_fall_back() {
        let defaults = DashboardInput::new("AAPL", date(1), date(31));
        let query = ChartQuery {
            tickers: None,
            start: Some(" ".to_string()),
            end: Some("2020-01-10".to_string()),
        };
        let input = query.into_input(defaults).unwrap();
        assert_eq!(input, DashboardInput::new("AAPL", date(1), date(10)));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }
}
