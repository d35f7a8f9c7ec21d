//! HTTP client for the Binance REST API.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::{Client as HttpClient, StatusCode};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, warn};

use crate::config::ExchangeConfig;
use crate::domain::Credentials;
use crate::exchanges::{ExchangeError, Result};

/// Default receive window for signed requests in milliseconds.
const DEFAULT_RECEIVE_WINDOW: u64 = 5000;

/// Production Binance HTTP API endpoint.
const BASE_HTTP_API_URL: &str = "https://api.binance.com";

/// Header carrying the API key on signed requests.
const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// Default HTTP request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for creating a new Client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub receive_window: u64,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn from_config(config: &ExchangeConfig) -> Self {
        Self {
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| BASE_HTTP_API_URL.to_string()),
            receive_window: config.receive_window.unwrap_or(DEFAULT_RECEIVE_WINDOW),
            request_timeout: if config.request_timeout.is_zero() {
                DEFAULT_REQUEST_TIMEOUT
            } else {
                config.request_timeout
            },
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_HTTP_API_URL.to_string(),
            receive_window: DEFAULT_RECEIVE_WINDOW,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// A query string together with the signature computed over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedQuery {
    /// Parameters in the exact order they were signed, timestamp last.
    pub query: String,
    /// Hex HMAC-SHA256 of `query`.
    pub signature: String,
}

impl SignedQuery {
    /// Serializes `params` in key order, appends `timestamp` and signs the result.
    pub fn build(secret: &str, params: &BTreeMap<String, String>, timestamp: i64) -> Self {
        let mut parts: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();
        parts.push(format!("timestamp={}", timestamp));

        let query = parts.join("&");
        let signature = sign(secret, &query);

        Self { query, signature }
    }

    /// Full query string with the signature as the final parameter.
    pub fn to_query_string(&self) -> String {
        format!("{}&signature={}", self.query, self.signature)
    }
}

/// Hex encoded HMAC-SHA256 of `message` keyed with `secret`.
pub fn sign(secret: &str, message: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// HTTP client for the Binance REST API.
/// Handles request signing and error decoding.
pub struct Client {
    config: ClientConfig,
    http_client: HttpClient,
    credentials: RwLock<Credentials>,
}

impl Client {
    /// Creates a new Binance API client.
    pub fn new(config: ClientConfig, credentials: Credentials) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            config,
            http_client,
            credentials: RwLock::new(credentials),
        })
    }

    /// Creates a new client from exchange config.
    pub fn from_config(exchange_config: &ExchangeConfig) -> Result<Self> {
        Self::new(
            ClientConfig::from_config(exchange_config),
            exchange_config.credentials(),
        )
    }

    /// Returns a copy of the current credentials.
    pub fn credentials(&self) -> Credentials {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the credentials used by subsequent signed requests.
    pub fn set_credentials(&self, credentials: Credentials) {
        *self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner) = credentials;
    }

    /// Returns true if both key and secret are present.
    pub fn is_configured(&self) -> bool {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_configured()
    }

    /// Sends an unauthenticated GET request.
    pub async fn get_public(
        &self,
        endpoint: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>> {
        let query: String = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let url = if query.is_empty() {
            format!("{}{}", self.config.base_url, endpoint)
        } else {
            format!("{}{}?{}", self.config.base_url, endpoint, query)
        };

        debug!(endpoint = %endpoint, signed = false, "sending request");
        self.send(self.http_client.get(&url)).await
    }

    /// Sends a signed GET request.
    ///
    /// Fails with `NotConfigured` before touching the network when either
    /// credential is missing.
    pub async fn get_signed(
        &self,
        endpoint: &str,
        mut params: BTreeMap<String, String>,
    ) -> Result<Vec<u8>> {
        let credentials = self.credentials();
        if !credentials.is_configured() {
            return Err(ExchangeError::NotConfigured);
        }

        params.insert(
            "recvWindow".to_string(),
            self.config.receive_window.to_string(),
        );

        let timestamp = chrono::Utc::now().timestamp_millis();
        let signed = SignedQuery::build(&credentials.api_secret, &params, timestamp);
        let url = format!(
            "{}{}?{}",
            self.config.base_url,
            endpoint,
            signed.to_query_string()
        );

        debug!(endpoint = %endpoint, signed = true, "sending request");
        let request = self
            .http_client
            .get(&url)
            .header(API_KEY_HEADER, credentials.api_key.as_str());
        self.send(request).await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if status.is_client_error() || status.is_server_error() {
            return Err(parse_error_response(status, &body));
        }

        Ok(body.to_vec())
    }
}

/// Creates an ExchangeError from an error response.
fn parse_error_response(status: StatusCode, body: &[u8]) -> ExchangeError {
    #[derive(Deserialize)]
    struct ErrorResponse {
        code: Option<i64>,
        msg: Option<String>,
    }

    let (code, message) = match serde_json::from_slice::<ErrorResponse>(body) {
        Ok(resp) => (
            resp.code.unwrap_or(i64::from(status.as_u16())),
            resp.msg
                .unwrap_or_else(|| String::from_utf8_lossy(body).to_string()),
        ),
        Err(_) => (
            i64::from(status.as_u16()),
            String::from_utf8_lossy(body).to_string(),
        ),
    };

    warn!(code = code, message = %message, "api error");

    ExchangeError::Api { code, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_matches_documented_vector() {
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            sign(secret, query),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_signed_query_is_deterministic() {
        let mut params = BTreeMap::new();
        params.insert("recvWindow".to_string(), "5000".to_string());
        params.insert("omitZeroBalances".to_string(), "true".to_string());

        let first = SignedQuery::build("secret", &params, 1_700_000_000_000);
        let second = SignedQuery::build("secret", &params, 1_700_000_000_000);

        assert_eq!(first, second);
        assert_eq!(first.to_query_string(), second.to_query_string());
    }

    #[test]
    fn test_signed_query_layout() {
        let mut params = BTreeMap::new();
        params.insert("symbols".to_string(), "BTCUSDT,ETHUSDT".to_string());
        params.insert("recvWindow".to_string(), "5000".to_string());

        let signed = SignedQuery::build("secret", &params, 42);

        assert_eq!(
            signed.query,
            "recvWindow=5000&symbols=BTCUSDT%2CETHUSDT&timestamp=42"
        );
        assert_eq!(signed.signature, sign("secret", &signed.query));
        assert!(
            signed
                .to_query_string()
                .ends_with(&format!("&signature={}", signed.signature))
        );
    }

    #[test]
    fn test_signature_depends_on_timestamp() {
        let params = BTreeMap::new();
        let a = SignedQuery::build("secret", &params, 1);
        let b = SignedQuery::build("secret", &params, 2);
        assert_ne!(a.signature, b.signature);
    }

    #[tokio::test]
    async fn test_signed_request_without_credentials_fails_before_network() {
        let config = ClientConfig {
            // Unroutable: any network attempt would surface as UpstreamRequest.
            base_url: "http://127.0.0.1:9".to_string(),
            ..ClientConfig::default()
        };
        let client = Client::new(config, Credentials::new("key", "")).unwrap();

        let result = client.get_signed("/api/v3/account", BTreeMap::new()).await;
        assert!(matches!(result, Err(ExchangeError::NotConfigured)));
    }

    #[test]
    fn test_set_credentials() {
        let client = Client::new(ClientConfig::default(), Credentials::default()).unwrap();
        assert!(!client.is_configured());

        client.set_credentials(Credentials::new("key", "secret"));
        assert!(client.is_configured());
        assert_eq!(client.credentials().api_key, "key");
    }

    #[test]
    fn test_parse_error_response_binance_body() {
        let body = br#"{"code":-2015,"msg":"Invalid API-key, IP, or permissions for action."}"#;
        let err = parse_error_response(StatusCode::UNAUTHORIZED, body);
        match err {
            ExchangeError::Api { code, message } => {
                assert_eq!(code, -2015);
                assert!(message.starts_with("Invalid API-key"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_response_plain_body() {
        let err = parse_error_response(StatusCode::BAD_GATEWAY, b"bad gateway");
        assert!(matches!(
            err,
            ExchangeError::Api { code: 502, ref message } if message == "bad gateway"
        ));
    }

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::from_config(&ExchangeConfig::default());
        assert_eq!(config.base_url, BASE_HTTP_API_URL);
        assert_eq!(config.receive_window, DEFAULT_RECEIVE_WINDOW);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }
}
