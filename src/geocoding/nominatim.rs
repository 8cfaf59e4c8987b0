//! Nominatim reverse-geocoding client
//!
//! Issues one `GET {base_url}/reverse` per attempt and retries rate limiting
//! (429), server errors (5xx) and transport failures with exponential
//! backoff. Other 4xx answers and bodies without a display name are final.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{FROM, RETRY_AFTER};
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};

use super::ReverseGeocoder;
use crate::clock::{Sleeper, TokioSleeper};
use crate::error::{GeocodeFailure, GeotrailError};
use crate::models::GeocodeResult;

pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "ja";
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Identity and endpoint of the geocoding caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NominatimConfig {
    /// Sent as `User-Agent`; Nominatim rejects anonymous clients
    pub user_agent: String,
    /// Sent as `From` when present
    pub contact_email: Option<String>,
    pub base_url: String,
    /// Value of the `accept-language` query parameter
    pub accept_language: String,
    pub timeout: Duration,
}

impl NominatimConfig {
    /// Config for the public endpoint; fails on a blank user agent
    pub fn new(user_agent: impl Into<String>) -> crate::Result<Self> {
        let user_agent = user_agent.into();
        if user_agent.trim().is_empty() {
            return Err(GeotrailError::config(
                "Nominatim requires a non-empty user agent",
            ));
        }
        Ok(Self {
            user_agent,
            contact_email: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        })
    }

    #[must_use]
    pub fn with_contact_email(mut self, email: impl Into<String>) -> Self {
        self.contact_email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Retry tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReverseGeocodeOptions {
    /// Extra attempts after the first one
    pub max_retries: u32,
    /// Backoff base; attempt `n` waits `initial_delay * 2^n`
    pub initial_delay: Duration,
}

impl Default for ReverseGeocodeOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
        }
    }
}

impl ReverseGeocodeOptions {
    /// Exponential backoff for the given zero-based attempt
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
    }

    /// Wait before retrying after `failure` on `attempt`
    #[must_use]
    pub fn delay_for(&self, failure: &GeocodeFailure, attempt: u32) -> Duration {
        match failure {
            GeocodeFailure::RateLimited {
                retry_after: Some(retry_after),
            } => *retry_after,
            _ => self.backoff(attempt),
        }
    }
}

/// `address` block of a Nominatim answer, reduced to what we read
#[derive(Debug, Deserialize, Default)]
struct NominatimAddress {
    amenity: Option<String>,
    shop: Option<String>,
    tourism: Option<String>,
    building: Option<String>,
}

impl NominatimAddress {
    /// First present label in priority order amenity, shop, tourism, building
    fn poi(self) -> Option<String> {
        self.amenity
            .or(self.shop)
            .or(self.tourism)
            .or(self.building)
    }
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    display_name: Option<String>,
    #[serde(default)]
    address: Option<NominatimAddress>,
}

impl NominatimResponse {
    fn into_result(self) -> Result<GeocodeResult, GeocodeFailure> {
        let address = self
            .display_name
            .filter(|name| !name.trim().is_empty())
            .ok_or(GeocodeFailure::NoData)?;
        let poi = self.address.and_then(NominatimAddress::poi);
        Ok(GeocodeResult { address, poi })
    }
}

/// HTTP client for the Nominatim `/reverse` endpoint
pub struct NominatimClient {
    client: Client,
    config: NominatimConfig,
    options: ReverseGeocodeOptions,
    sleeper: Arc<dyn Sleeper>,
}

impl NominatimClient {
    /// Create a new client sleeping on the tokio timer
    pub fn new(config: NominatimConfig, options: ReverseGeocodeOptions) -> crate::Result<Self> {
        if config.user_agent.trim().is_empty() {
            return Err(GeotrailError::config(
                "Nominatim requires a non-empty user agent",
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| GeotrailError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            options,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replace the sleep primitive used for backoff
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    fn reverse_url(&self, lat: f64, lon: f64) -> crate::Result<Url> {
        let mut url = Url::parse(&self.config.base_url)
            .and_then(|base| base.join("/reverse"))
            .map_err(|e| {
                GeotrailError::config(format!(
                    "Invalid Nominatim base URL '{}': {e}",
                    self.config.base_url
                ))
            })?;

        url.query_pairs_mut()
            .append_pair("format", "json")
            .append_pair("lat", &lat.to_string())
            .append_pair("lon", &lon.to_string())
            .append_pair("addressdetails", "1")
            .append_pair("accept-language", &self.config.accept_language);

        Ok(url)
    }

    /// One request, classified
    async fn attempt(&self, url: &Url) -> Result<GeocodeResult, GeocodeFailure> {
        let mut request = self.client.get(url.clone());
        if let Some(email) = &self.config.contact_email {
            request = request.header(FROM, email);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GeocodeFailure::transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeFailure::from_status(
                status.as_u16(),
                retry_after(&response),
            ));
        }

        let body: NominatimResponse = response
            .json()
            .await
            .map_err(|e| GeocodeFailure::transport(format!("invalid response body: {e}")))?;

        body.into_result()
    }

    /// Resolve a coordinate pair, distinguishing exhaustion from a final miss.
    ///
    /// `Ok(None)` means the service answered definitively without a usable
    /// result (4xx other than 429, or no display name). An error is returned
    /// only once every attempt ended in a retryable failure, after the wait
    /// for the last one has elapsed.
    #[instrument(skip(self))]
    pub async fn try_reverse_geocode(
        &self,
        lat: f64,
        lon: f64,
    ) -> crate::Result<Option<GeocodeResult>> {
        let url = self.reverse_url(lat, lon)?;
        let total = self.options.max_retries + 1;
        let mut last_failure = None;

        for attempt in 0..total {
            debug!("Reverse geocoding request (attempt {}/{})", attempt + 1, total);

            let failure = match self.attempt(&url).await {
                Ok(result) => {
                    info!(
                        "Resolved ({:.5}, {:.5}) to '{}' (poi: {:?})",
                        lat, lon, result.address, result.poi
                    );
                    return Ok(Some(result));
                }
                Err(failure) if !failure.is_retryable() => {
                    match &failure {
                        GeocodeFailure::NoData => {
                            warn!("No address found for ({:.5}, {:.5})", lat, lon)
                        }
                        other => error!("Nominatim API error: {}", other),
                    }
                    return Ok(None);
                }
                Err(failure) => failure,
            };

            // Waits after the final attempt as well
            let delay = self.options.delay_for(&failure, attempt);
            warn!(
                "Nominatim {}, waiting {}ms (attempt {}/{})",
                failure,
                delay.as_millis(),
                attempt + 1,
                total
            );
            self.sleeper.sleep(delay).await;
            last_failure = Some(failure);
        }

        let last = last_failure.unwrap_or_else(|| GeocodeFailure::transport("no attempt made"));
        error!("Nominatim API failed after {} attempts: {}", total, last);
        Err(GeotrailError::GeocodingExhausted {
            attempts: total,
            last,
        })
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimClient {
    async fn reverse_geocode(&self, lat: f64, lon: f64) -> Option<GeocodeResult> {
        self.try_reverse_geocode(lat, lon).await.unwrap_or_default()
    }
}

/// `Retry-After` in delta-seconds; HTTP-date values fall back to backoff
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::RecordingSleeper;
    use rstest::rstest;
    use serde_json::{Value, json};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options() -> ReverseGeocodeOptions {
        ReverseGeocodeOptions {
            max_retries: 3,
            initial_delay: Duration::from_millis(10),
        }
    }

    fn client_for(server: &MockServer, sleeper: Arc<RecordingSleeper>) -> NominatimClient {
        let config = NominatimConfig::new("geotrail-test/1.0")
            .unwrap()
            .with_base_url(server.uri());
        NominatimClient::new(config, options())
            .unwrap()
            .with_sleeper(sleeper)
    }

    fn tokyo_tower() -> Value {
        json!({
            "display_name": "Tokyo Tower, 4-2-8 Shibakoen, Minato, Tokyo, Japan",
            "address": { "tourism": "Tokyo Tower", "road": "Shibakoen" }
        })
    }

    #[test]
    fn test_default_options() {
        let options = ReverseGeocodeOptions::default();
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.initial_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let options = ReverseGeocodeOptions::default();
        assert_eq!(options.backoff(0), Duration::from_millis(1000));
        assert_eq!(options.backoff(1), Duration::from_millis(2000));
        assert_eq!(options.backoff(3), Duration::from_millis(8000));
    }

    #[test]
    fn test_retry_after_overrides_backoff() {
        let options = ReverseGeocodeOptions::default();
        let limited = GeocodeFailure::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        let unlimited = GeocodeFailure::RateLimited { retry_after: None };
        assert_eq!(options.delay_for(&limited, 2), Duration::from_secs(7));
        assert_eq!(options.delay_for(&unlimited, 2), Duration::from_millis(4000));
    }

    #[test]
    fn test_blank_user_agent_is_rejected() {
        assert!(NominatimConfig::new("  ").is_err());
    }

    #[rstest]
    #[case(json!({"amenity": "Bar", "shop": "Foo"}), Some("Bar"))]
    #[case(json!({"shop": "Foo"}), Some("Foo"))]
    #[case(json!({"shop": "Foo", "tourism": "Museum"}), Some("Foo"))]
    #[case(json!({"tourism": "Museum", "building": "yes"}), Some("Museum"))]
    #[case(json!({"building": "yes"}), Some("yes"))]
    #[case(json!({"road": "Main Street"}), None)]
    fn test_poi_priority(#[case] address: Value, #[case] expected: Option<&str>) {
        let address: NominatimAddress = serde_json::from_value(address).unwrap();
        assert_eq!(address.poi().as_deref(), expected);
    }

    #[rstest]
    #[case(json!({"error": "Unable to geocode"}))]
    #[case(json!({"display_name": ""}))]
    #[case(json!({"display_name": "   ", "address": {"shop": "Foo"}}))]
    fn test_unusable_body_is_no_data(#[case] body: Value) {
        let response: NominatimResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.into_result(), Err(GeocodeFailure::NoData));
    }

    #[test]
    fn test_reverse_url_parameters() {
        let config = NominatimConfig::new("geotrail-test/1.0")
            .unwrap()
            .with_base_url("http://localhost:8080");
        let client = NominatimClient::new(config, options()).unwrap();

        let url = client.reverse_url(35.6, 139.7).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/reverse?format=json&lat=35.6&lon=139.7&addressdetails=1&accept-language=ja"
        );
    }

    #[tokio::test]
    async fn test_success_sends_identity_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .and(query_param("format", "json"))
            .and(query_param("lat", "35.6586"))
            .and(query_param("lon", "139.7454"))
            .and(query_param("addressdetails", "1"))
            .and(header("user-agent", "geotrail-test/1.0"))
            .and(header("from", "ops@example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tokyo_tower()))
            .expect(1)
            .mount(&server)
            .await;

        let config = NominatimConfig::new("geotrail-test/1.0")
            .unwrap()
            .with_base_url(server.uri())
            .with_contact_email("ops@example.com");
        let client = NominatimClient::new(config, options()).unwrap();

        let result = client.reverse_geocode(35.6586, 139.7454).await.unwrap();
        assert_eq!(
            result.address,
            "Tokyo Tower, 4-2-8 Shibakoen, Minato, Tokyo, Japan"
        );
        assert_eq!(result.poi.as_deref(), Some("Tokyo Tower"));
    }

    #[tokio::test]
    async fn test_rate_limit_honours_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tokyo_tower()))
            .expect(1)
            .mount(&server)
            .await;

        let sleeper = Arc::new(RecordingSleeper::new());
        let client = client_for(&server, sleeper.clone());

        let result = client.try_reverse_geocode(35.6586, 139.7454).await.unwrap();
        assert!(result.is_some());
        assert_eq!(sleeper.waits(), vec![Duration::from_secs(2)]);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_without_header_uses_backoff() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tokyo_tower()))
            .mount(&server)
            .await;

        let sleeper = Arc::new(RecordingSleeper::new());
        let client = client_for(&server, sleeper.clone());

        assert!(client.reverse_geocode(35.6586, 139.7454).await.is_some());
        assert_eq!(
            sleeper.waits(),
            vec![Duration::from_millis(10), Duration::from_millis(20)]
        );
    }

    #[tokio::test]
    async fn test_server_errors_exhaust_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(500))
            .expect(4)
            .mount(&server)
            .await;

        let sleeper = Arc::new(RecordingSleeper::new());
        let client = client_for(&server, sleeper.clone());

        let err = client
            .try_reverse_geocode(35.6586, 139.7454)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GeotrailError::GeocodingExhausted {
                attempts: 4,
                last: GeocodeFailure::ServerError { status: 500 }
            }
        ));
        assert_eq!(
            sleeper.waits(),
            vec![
                Duration::from_millis(10),
                Duration::from_millis(20),
                Duration::from_millis(40),
                Duration::from_millis(80)
            ]
        );
    }

    #[tokio::test]
    async fn test_final_rate_limit_still_waits_for_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
            .expect(1)
            .mount(&server)
            .await;

        let sleeper = Arc::new(RecordingSleeper::new());
        let config = NominatimConfig::new("geotrail-test/1.0")
            .unwrap()
            .with_base_url(server.uri());
        let client = NominatimClient::new(
            config,
            ReverseGeocodeOptions {
                max_retries: 0,
                initial_delay: Duration::from_millis(10),
            },
        )
        .unwrap()
        .with_sleeper(sleeper.clone());

        let err = client
            .try_reverse_geocode(35.6586, 139.7454)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GeotrailError::GeocodingExhausted {
                attempts: 1,
                last: GeocodeFailure::RateLimited { .. }
            }
        ));
        assert_eq!(sleeper.waits(), vec![Duration::from_secs(30)]);
    }

    #[tokio::test]
    async fn test_exhaustion_is_absent_through_trait() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(503))
            .expect(4)
            .mount(&server)
            .await;

        let client = client_for(&server, Arc::new(RecordingSleeper::new()));
        assert!(client.reverse_geocode(35.6586, 139.7454).await.is_none());
    }

    #[rstest]
    #[case(400)]
    #[case(403)]
    #[case(404)]
    #[tokio::test]
    async fn test_client_error_is_terminal(#[case] status: u16) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(status))
            .expect(1)
            .mount(&server)
            .await;

        let sleeper = Arc::new(RecordingSleeper::new());
        let client = client_for(&server, sleeper.clone());

        let result = client.try_reverse_geocode(35.6586, 139.7454).await.unwrap();
        assert!(result.is_none());
        assert!(sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn test_missing_display_name_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": "Unable to geocode"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let sleeper = Arc::new(RecordingSleeper::new());
        let client = client_for(&server, sleeper.clone());

        assert_eq!(
            client.try_reverse_geocode(0.0, 0.0).await.unwrap(),
            None
        );
        assert!(sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "display_name": "Ueno Park, Taito, Tokyo, Japan",
                "address": { "shop": "Foo" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let sleeper = Arc::new(RecordingSleeper::new());
        let client = client_for(&server, sleeper.clone());

        let result = client.reverse_geocode(35.7148, 139.7736).await.unwrap();
        assert_eq!(result.poi.as_deref(), Some("Foo"));
        assert_eq!(sleeper.waits(), vec![Duration::from_millis(10)]);
    }

    #[tokio::test]
    async fn test_connection_failure_is_retried_then_exhausted() {
        // Nothing listens on the discard port
        let config = NominatimConfig::new("geotrail-test/1.0")
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        let sleeper = Arc::new(RecordingSleeper::new());
        let client = NominatimClient::new(
            config,
            ReverseGeocodeOptions {
                max_retries: 1,
                initial_delay: Duration::from_millis(5),
            },
        )
        .unwrap()
        .with_sleeper(sleeper.clone());

        let err = client.try_reverse_geocode(35.6, 139.7).await.unwrap_err();
        assert!(matches!(
            err,
            GeotrailError::GeocodingExhausted {
                attempts: 2,
                last: GeocodeFailure::TransportFailure { .. }
            }
        ));
        assert_eq!(
            sleeper.waits(),
            vec![Duration::from_millis(5), Duration::from_millis(10)]
        );
    }
}
