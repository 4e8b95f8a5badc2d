//! The timing provider: turns a coordinate and a calculation method into the
//! day's prayer times.

use crate::common::{CalculationMethod, Coordinate};
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// The provider's answer for one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingResponse {
    /// Prayer name to local `HH:MM`, as sent by the provider.
    pub timings: HashMap<String, String>,
    /// IANA timezone id of the location.
    pub timezone: String,
}

/// Anything that can produce today's timings for a location.
#[async_trait]
pub trait TimingProvider: Send + Sync {
    async fn fetch_timings(
        &self,
        coordinate: Coordinate,
        method: CalculationMethod,
    ) -> Result<TimingResponse, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    data: ApiData,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    timings: HashMap<String, String>,
    meta: ApiMeta,
}

#[derive(Debug, Deserialize)]
struct ApiMeta {
    timezone: String,
}

/// Client for the AlAdhan `timings` endpoint.
pub struct AladhanClient {
    client: Client,
    base_url: String,
}

impl AladhanClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Unreachable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TimingProvider for AladhanClient {
    async fn fetch_timings(
        &self,
        coordinate: Coordinate,
        method: CalculationMethod,
    ) -> Result<TimingResponse, ProviderError> {
        let url = format!("{}/v1/timings", self.base_url);
        debug!("GET {} at {} with method {}", url, coordinate, method);

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("latitude", coordinate.latitude().to_string()),
                ("longitude", coordinate.longitude().to_string()),
                ("method", method.0.to_string()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Unreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| ProviderError::Unreachable(e.to_string()))?;
        let envelope: ApiEnvelope =
            serde_json::from_str(&body).map_err(|e| ProviderError::Malformed(e.to_string()))?;

        Ok(TimingResponse {
            timings: envelope.data.timings,
            timezone: envelope.data.meta.timezone,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const BODY: &str = r#"{
        "code": 200,
        "status": "OK",
        "data": {
            "timings": {
                "Fajr": "04:50", "Sunrise": "06:15", "Dhuhr": "12:10",
                "Asr": "15:30", "Sunset": "18:05", "Maghrib": "18:05",
                "Isha": "19:20", "Imsak": "04:40", "Midnight": "00:10"
            },
            "date": { "readable": "10 Mar 2026" },
            "meta": { "timezone": "Africa/Cairo", "method": { "id": 5 } }
        }
    }"#;

    fn client_for(server: &mockito::ServerGuard) -> AladhanClient {
        AladhanClient::new(&ProviderConfig {
            base_url: server.url(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn cairo() -> Coordinate {
        Coordinate::new(30.0444, 31.2357).unwrap()
    }

    #[tokio::test]
    async fn decodes_timings_and_timezone() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/timings")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("latitude".into(), "30.0444".into()),
                Matcher::UrlEncoded("longitude".into(), "31.2357".into()),
                Matcher::UrlEncoded("method".into(), "5".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(BODY)
            .create_async()
            .await;

        let response = client_for(&server)
            .fetch_timings(cairo(), CalculationMethod::DEFAULT)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.timezone, "Africa/Cairo");
        assert_eq!(response.timings.get("Isha").map(String::as_str), Some("19:20"));
        assert_eq!(response.timings.len(), 9);
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/timings")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let err = client_for(&server)
            .fetch_timings(cairo(), CalculationMethod::DEFAULT)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 503 }));
    }

    #[tokio::test]
    async fn undecodable_body_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/timings")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"code": 200, "data": {"timings": "nope"}}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .fetch_timings(cairo(), CalculationMethod::DEFAULT)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        // Nothing listens on the discard port.
        let client = AladhanClient::new(&ProviderConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
        })
        .unwrap();
        let err = client
            .fetch_timings(cairo(), CalculationMethod::DEFAULT)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unreachable(_)));
    }
}
