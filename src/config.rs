use crate::chart::ChartOptions;
use crate::error::ConfigError;
use crate::input::{default_start_date, parse_date, today_in, DashboardInput, DEFAULT_TICKERS};
use crate::provider::ProviderError;
use crate::yahoo::{YahooClient, DEFAULT_BASE_URL};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::str::FromStr;
use std::time::Duration;

// YAML-serializable configuration; every field is optional
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ConfigYaml {
    pub environment: Option<String>,
    pub port: Option<u16>,
    pub provider_base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub rate_limit_per_minute: Option<u32>,
    pub random_agent: Option<bool>,
    pub market_timezone: Option<String>,
    pub default_tickers: Option<String>,
    pub default_start_date: Option<String>,
    pub chart_requests_per_second: Option<u64>,
    pub chart_burst: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub environment: String,
    pub port: u16,
    pub provider_base_url: String,
    pub request_timeout: Duration,
    pub rate_limit_per_minute: u32,
    pub random_agent: bool,
    pub market_timezone: Tz,
    pub default_tickers: String,
    pub default_start: NaiveDate,
    pub chart_requests_per_second: u64,
    pub chart_burst: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            port: 8501,
            provider_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            rate_limit_per_minute: 60,
            random_agent: true,
            market_timezone: chrono_tz::America::New_York,
            default_tickers: DEFAULT_TICKERS.to_string(),
            default_start: default_start_date(),
            chart_requests_per_second: 2,
            chart_burst: 10,
        }
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

impl AppConfig {
    // Load configuration from YAML file or environment variables
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            Self::from_yaml(&config_file)
        } else {
            Self::from_env()
        }
    }

    pub fn from_yaml(file_path: &str) -> Result<Self, ConfigError> {
        let yaml_content = fs::read_to_string(file_path).map_err(|source| ConfigError::Read {
            path: file_path.to_string(),
            source,
        })?;
        Self::from_yaml_str(&yaml_content)
    }

    pub fn from_yaml_str(yaml_content: &str) -> Result<Self, ConfigError> {
        let yaml: ConfigYaml = serde_yaml::from_str(yaml_content)?;
        let defaults = Self::default();

        let market_timezone = match yaml.market_timezone {
            Some(name) => parse_value("market_timezone", &name)?,
            None => defaults.market_timezone,
        };
        let default_start = match yaml.default_start_date {
            Some(date) => parse_date(&date).map_err(|_| ConfigError::InvalidValue {
                key: "default_start_date".to_string(),
                value: date,
            })?,
            None => defaults.default_start,
        };

        Ok(Self {
            environment: yaml.environment.unwrap_or(defaults.environment),
            port: yaml.port.unwrap_or(defaults.port),
            provider_base_url: yaml.provider_base_url.unwrap_or(defaults.provider_base_url),
            request_timeout: yaml
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            rate_limit_per_minute: yaml.rate_limit_per_minute.unwrap_or(defaults.rate_limit_per_minute),
            random_agent: yaml.random_agent.unwrap_or(defaults.random_agent),
            market_timezone,
            default_tickers: yaml.default_tickers.unwrap_or(defaults.default_tickers),
            default_start,
            chart_requests_per_second: yaml
                .chart_requests_per_second
                .unwrap_or(defaults.chart_requests_per_second),
            chart_burst: yaml.chart_burst.unwrap_or(defaults.chart_burst),
        })
    }

    // Load all configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup, falling back to defaults for absent keys.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = match get("PORT") {
            Some(v) => parse_value("PORT", &v)?,
            None => defaults.port,
        };
        let request_timeout = match get("REQUEST_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse_value("REQUEST_TIMEOUT_SECS", &v)?),
            None => defaults.request_timeout,
        };
        let rate_limit_per_minute = match get("RATE_LIMIT_PER_MINUTE") {
            Some(v) => parse_value("RATE_LIMIT_PER_MINUTE", &v)?,
            None => defaults.rate_limit_per_minute,
        };
        let random_agent = match get("RANDOM_AGENT") {
            Some(v) => parse_value("RANDOM_AGENT", &v)?,
            None => defaults.random_agent,
        };
        let market_timezone = match get("MARKET_TIMEZONE") {
            Some(v) => parse_value("MARKET_TIMEZONE", &v)?,
            None => defaults.market_timezone,
        };
        let default_start = match get("DEFAULT_START_DATE") {
            Some(v) => parse_date(&v).map_err(|_| ConfigError::InvalidValue {
                key: "DEFAULT_START_DATE".to_string(),
                value: v.clone(),
            })?,
            None => defaults.default_start,
        };
        let chart_requests_per_second = match get("CHART_RPS") {
            Some(v) => parse_value("CHART_RPS", &v)?,
            None => defaults.chart_requests_per_second,
        };
        let chart_burst = match get("CHART_BURST") {
            Some(v) => parse_value("CHART_BURST", &v)?,
            None => defaults.chart_burst,
        };

        Ok(Self {
            environment: get("ENVIRONMENT").unwrap_or(defaults.environment),
            port,
            provider_base_url: get("PROVIDER_BASE_URL").unwrap_or(defaults.provider_base_url),
            request_timeout,
            rate_limit_per_minute,
            random_agent,
            market_timezone,
            default_tickers: get("DEFAULT_TICKERS").unwrap_or(defaults.default_tickers),
            default_start,
            chart_requests_per_second,
            chart_burst,
        })
    }

    /// Widget values shown before the user touches anything.
    pub fn default_input(&self) -> DashboardInput {
        DashboardInput::new(
            self.default_tickers.clone(),
            self.default_start,
            today_in(self.market_timezone),
        )
    }

    /// Milliseconds between two refilled `/chart` tokens.
    pub fn chart_replenish_ms(&self) -> u64 {
        (1000 / self.chart_requests_per_second.max(1)).max(1)
    }

    pub fn chart_options(&self) -> ChartOptions {
        ChartOptions::default()
    }

    pub fn yahoo_client(&self) -> Result<YahooClient, ProviderError> {
        YahooClient::new(
            &self.provider_base_url,
            self.request_timeout,
            self.random_agent,
            self.rate_limit_per_minute,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_from_yaml_str_overrides_and_defaults() {
        let yaml = r#"
environment: production
port: 9000
market_timezone: Europe/London
default_tickers: "TSLA, NVDA"
default_start_date: "2021-06-01"
"#;
        let config = AppConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.environment, "production");
        assert_eq!(config.port, 9000);
        assert_eq!(config.market_timezone, chrono_tz::Europe::London);
        assert_eq!(config.default_tickers, "TSLA, NVDA");
        assert_eq!(config.default_start, NaiveDate::from_ymd_opt(2021, 6, 1).unwrap());
        assert_eq!(config.rate_limit_per_minute, 60);
        assert_eq!(config.provider_base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_from_yaml_str_rejects_bad_timezone() {
        let err = AppConfig::from_yaml_str("market_timezone: Mars/Olympus").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "market_timezone"));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PORT", "8080"),
            ("RATE_LIMIT_PER_MINUTE", "30"),
            ("RANDOM_AGENT", "false"),
            ("DEFAULT_TICKERS", "IBM"),
        ]);
        let config = AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.rate_limit_per_minute, 30);
        assert!(!config.random_agent);
        assert_eq!(config.default_input().tickers, "IBM");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_from_lookup_rejects_bad_port() {
        let err = AppConfig::from_lookup(|k| (k == "PORT").then(|| "eighty".to_string())).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "PORT"));
    }

    #[test]
    fn test_chart_rate_becomes_replenish_interval() {
        let config = AppConfig::default();
        assert_eq!(config.chart_replenish_ms(), 500);

        let vars: HashMap<&str, &str> = HashMap::from([("CHART_RPS", "10")]);
        let config = AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.chart_replenish_ms(), 100);

        let config = AppConfig::from_yaml_str("chart_requests_per_second: 0").unwrap();
        assert_eq!(config.chart_replenish_ms(), 1000);

        let config = AppConfig::from_yaml_str("chart_requests_per_second: 5000").unwrap();
        assert_eq!(config.chart_replenish_ms(), 1);
    }

    #[test]
    fn test_default_input_uses_config_start() {
        let config = AppConfig::default();
        let input = config.default_input();
        assert_eq!(input.tickers, DEFAULT_TICKERS);
        assert_eq!(input.start, default_start_date());
    }
}
