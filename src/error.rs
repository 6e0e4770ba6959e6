use crate::input::InputError;
use crate::provider::ProviderError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl DashboardError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Input(_) => StatusCode::BAD_REQUEST,
            Self::Provider(ProviderError::UnknownSymbol { .. }) => StatusCode::NOT_FOUND,
            Self::Provider(ProviderError::RateLimit) => StatusCode::TOO_MANY_REQUESTS,
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.to_string() });
        (self.status(), axum::Json(body)).into_response()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_status_mapping() {
        let d = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let input: DashboardError = InputError::InvertedRange { start: d, end: d }.into();
        assert_eq!(input.status(), StatusCode::BAD_REQUEST);

        let unknown: DashboardError = ProviderError::UnknownSymbol {
            symbol: "NOPE".into(),
            reason: "Not Found".into(),
        }
        .into();
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

        let limited: DashboardError = ProviderError::RateLimit.into();
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);

        let invalid: DashboardError = ProviderError::InvalidResponse("bad".into()).into();
        assert_eq!(invalid.status(), StatusCode::BAD_GATEWAY);
    }
}
