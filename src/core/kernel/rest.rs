use crate::core::errors::ExchangeError;
use crate::core::kernel::signer::Signer;
use crate::core::types::{ApiResponse, HttpMethod, RequestDescriptor};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, trace};

pub const REQUEST_ID_HEADER: &str = "X-REQUEST-ID";

/// REST client trait for signed requests
///
/// Every call is signed. Implementations never panic and never retry; all
/// failures come back as `ExchangeError` values.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Sign and send one request
    ///
    /// # Returns
    /// `ApiResponse::Data` for 2xx, `ApiResponse::RateLimited` for 429
    async fn execute(&self, request: &RequestDescriptor) -> Result<ApiResponse, ExchangeError>;

    /// Signed GET with ordered query parameters
    async fn get(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
    ) -> Result<ApiResponse, ExchangeError> {
        let request = query_params
            .iter()
            .fold(RequestDescriptor::get(endpoint), |request, (k, v)| {
                request.param(*k, *v)
            });
        self.execute(&request).await
    }

    /// Signed POST with a JSON body
    async fn post(&self, endpoint: &str, body: Value) -> Result<ApiResponse, ExchangeError> {
        self.execute(&RequestDescriptor::post(endpoint, body)).await
    }

    /// Signed DELETE with a JSON body
    async fn delete(&self, endpoint: &str, body: Value) -> Result<ApiResponse, ExchangeError> {
        self.execute(&RequestDescriptor::delete(endpoint, body))
            .await
    }
}

/// Configuration for the REST client
#[derive(Clone, Debug)]
pub struct RestClientConfig {
    /// Base URL for the API
    pub base_url: String,
    /// Exchange name for logging and tracing
    pub exchange_name: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string to include in requests
    pub user_agent: String,
    /// Prefix of the `X-REQUEST-ID` header value
    pub request_id_prefix: String,
}

impl RestClientConfig {
    /// Create a new configuration
    ///
    /// # Arguments
    /// * `base_url` - Base URL for the API
    /// * `exchange_name` - Name of the exchange
    pub fn new(base_url: String, exchange_name: String) -> Self {
        Self {
            base_url,
            exchange_name,
            timeout_seconds: 10,
            user_agent: "coinswitch-futures/0.1".to_string(),
            request_id_prefix: "coinswitch-futures".to_string(),
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Set the request id prefix
    pub fn with_request_id_prefix(mut self, prefix: String) -> Self {
        self.request_id_prefix = prefix;
        self
    }
}

/// Builder for creating REST client instances
pub struct RestClientBuilder {
    config: RestClientConfig,
    signer: Option<Arc<dyn Signer>>,
}

impl RestClientBuilder {
    pub fn new(config: RestClientConfig) -> Self {
        Self {
            config,
            signer: None,
        }
    }

    /// Set the signer used for every request
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Build the REST client
    pub fn build(self) -> Result<ReqwestRest, ExchangeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .user_agent(&self.config.user_agent)
            .build()
            .map_err(|e| {
                ExchangeError::TransportError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(ReqwestRest {
            client,
            config: self.config,
            signer: self.signer,
        })
    }
}

/// A fully signed request, ready to send
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// Implementation of `RestClient` using reqwest
#[derive(Clone)]
pub struct ReqwestRest {
    client: Client,
    config: RestClientConfig,
    signer: Option<Arc<dyn Signer>>,
}

impl std::fmt::Debug for ReqwestRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestRest")
            .field("config", &self.config)
            .field("has_signer", &self.signer.is_some())
            .finish_non_exhaustive()
    }
}

impl ReqwestRest {
    pub fn config(&self) -> &RestClientConfig {
        &self.config
    }

    /// Current wall-clock time in milliseconds
    fn get_timestamp() -> u64 {
        chrono::Utc::now().timestamp_millis() as u64
    }

    fn request_id(&self, timestamp: u64) -> String {
        format!(
            "{}-{}-{:08x}",
            self.config.request_id_prefix,
            timestamp,
            rand::random::<u32>()
        )
    }

    /// Sign a request against a fixed timestamp without sending it
    pub fn prepare(
        &self,
        request: &RequestDescriptor,
        timestamp: u64,
    ) -> Result<PreparedRequest, ExchangeError> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            ExchangeError::InvalidCredentials("No signer configured".to_string())
        })?;

        let body = request.body_bytes()?;
        let mut headers = signer.sign_request(
            request.method.as_str(),
            &request.signing_path(),
            &body,
            timestamp,
        )?;
        headers.insert(REQUEST_ID_HEADER.to_string(), self.request_id(timestamp));
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        Ok(PreparedRequest {
            method: request.method,
            url: format!("{}{}", self.config.base_url, request.request_path()),
            headers,
            body,
        })
    }

    /// Map the HTTP response onto the uniform result
    #[instrument(skip(self, response), fields(exchange = %self.config.exchange_name, status = %response.status()))]
    async fn handle_response(&self, response: Response) -> Result<ApiResponse, ExchangeError> {
        let status = response.status();
        let response_text = response.text().await.map_err(|e| {
            ExchangeError::TransportError(format!("Failed to read response body: {}", e))
        })?;

        trace!("Response body: {}", response_text);

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(ApiResponse::RateLimited {
                body: response_text,
            });
        }

        if !status.is_success() {
            return Err(ExchangeError::HttpError {
                status: status.as_u16(),
                body: response_text,
            });
        }

        if response_text.trim().is_empty() {
            return Ok(ApiResponse::Data(Value::Null));
        }

        serde_json::from_str(&response_text)
            .map(ApiResponse::Data)
            .map_err(|e| {
                ExchangeError::DeserializationError(format!("Failed to parse JSON response: {}", e))
            })
    }
}

#[async_trait]
impl RestClient for ReqwestRest {
    #[instrument(skip(self, request), fields(exchange = %self.config.exchange_name, method = %request.method, endpoint = %request.path))]
    async fn execute(&self, request: &RequestDescriptor) -> Result<ApiResponse, ExchangeError> {
        let timestamp = Self::get_timestamp();
        let prepared = self.prepare(request, timestamp)?;

        let mut builder = self
            .client
            .request(prepared.method.into(), prepared.url.as_str());
        for (key, value) in &prepared.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if !prepared.body.is_empty() {
            builder = builder.body(prepared.body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ExchangeError::TransportError(format!("Request failed: {}", e)))?;

        self.handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kernel::signer::{
        Ed25519Signer, HmacSigner, ED25519_EPOCH_HEADER, ED25519_SIGNATURE_HEADER,
        HMAC_SIGNATURE_HEADER,
    };
    use ed25519_dalek::{Signature, SigningKey, Verifier};
    use serde_json::json;

    const SECRET_HEX: &str = "4ccd089b28ff96da9db6c346ec114e0f5b8a319f35aba624da8cf6ed4fb8a6fb";

    fn ed25519_rest() -> ReqwestRest {
        let config = RestClientConfig::new("https://coinswitch.co".to_string(), "coinswitch".to_string());
        RestClientBuilder::new(config)
            .with_signer(Arc::new(Ed25519Signer::new(
                "key".to_string(),
                SECRET_HEX.to_string(),
            )))
            .build()
            .unwrap()
    }

    #[test]
    fn test_prepare_signs_decoded_path() {
        let rest = ed25519_rest();
        let request = RequestDescriptor::get("/trade/api/v2/futures/order").param("order_id", "abc");
        let prepared = rest.prepare(&request, 1_700_000_000_000).unwrap();

        assert_eq!(
            prepared.url,
            "https://coinswitch.co/trade/api/v2/futures/order?order_id=abc"
        );
        assert_eq!(prepared.headers[ED25519_EPOCH_HEADER], "1700000000000");

        let key_bytes: [u8; 32] = hex::decode(SECRET_HEX).unwrap().try_into().unwrap();
        let verifying_key = SigningKey::from_bytes(&key_bytes).verifying_key();
        let sig_bytes: [u8; 64] = hex::decode(&prepared.headers[ED25519_SIGNATURE_HEADER])
            .unwrap()
            .try_into()
            .unwrap();
        verifying_key
            .verify(
                b"GET/trade/api/v2/futures/order?order_id=abc1700000000000",
                &Signature::from_bytes(&sig_bytes),
            )
            .unwrap();
    }

    #[test]
    fn test_prepare_encoded_query_signs_decoded_form() {
        let rest = ed25519_rest();
        let request = RequestDescriptor::get("/trade/api/v2/futures/trades")
            .param("symbol", "btc%2Fusdt")
            .param("exchange", "EXCHANGE+2");
        let prepared = rest.prepare(&request, 5).unwrap();

        assert!(prepared.url.ends_with("?symbol=btc%2Fusdt&exchange=EXCHANGE+2"));

        let key_bytes: [u8; 32] = hex::decode(SECRET_HEX).unwrap().try_into().unwrap();
        let verifying_key = SigningKey::from_bytes(&key_bytes).verifying_key();
        let sig_bytes: [u8; 64] = hex::decode(&prepared.headers[ED25519_SIGNATURE_HEADER])
            .unwrap()
            .try_into()
            .unwrap();
        let signature = Signature::from_bytes(&sig_bytes);

        assert!(verifying_key
            .verify(
                b"GET/trade/api/v2/futures/trades?symbol=btc/usdt&exchange=EXCHANGE 25",
                &signature
            )
            .is_ok());
        assert!(verifying_key
            .verify(
                b"GET/trade/api/v2/futures/trades?symbol=btc%2Fusdt&exchange=EXCHANGE+25",
                &signature
            )
            .is_err());
    }

    #[test]
    fn test_prepare_attaches_request_id_and_body() {
        let rest = ed25519_rest();
        let request = RequestDescriptor::post("/trade/api/v2/futures/cancel_all", json!({"exchange": "EXCHANGE_2"}));
        let prepared = rest.prepare(&request, 99).unwrap();

        assert!(prepared.headers[REQUEST_ID_HEADER].starts_with("coinswitch-futures-99-"));
        assert_eq!(prepared.body, br#"{"exchange":"EXCHANGE_2"}"#.to_vec());
        assert_eq!(prepared.method, HttpMethod::Post);
    }

    #[test]
    fn test_prepare_hmac_signs_body() {
        let config = RestClientConfig::new("http://localhost".to_string(), "coinswitch".to_string());
        let rest = RestClientBuilder::new(config)
            .with_signer(Arc::new(HmacSigner::new("key".to_string(), "secret".to_string())))
            .build()
            .unwrap();

        let with_body = rest
            .prepare(&RequestDescriptor::post("/p", json!({"a": 1})), 10)
            .unwrap();
        let other_body = rest
            .prepare(&RequestDescriptor::post("/p", json!({"a": 2})), 10)
            .unwrap();

        assert_eq!(with_body.headers[HMAC_SIGNATURE_HEADER].len(), 64);
        assert_ne!(
            with_body.headers[HMAC_SIGNATURE_HEADER],
            other_body.headers[HMAC_SIGNATURE_HEADER]
        );
    }

    #[test]
    fn test_prepare_without_signer_is_invalid_credentials() {
        let config = RestClientConfig::new("http://localhost".to_string(), "coinswitch".to_string());
        let rest = RestClientBuilder::new(config).build().unwrap();
        assert!(matches!(
            rest.prepare(&RequestDescriptor::get("/p"), 1),
            Err(ExchangeError::InvalidCredentials(_))
        ));
    }

    #[test]
    fn test_request_ids_differ() {
        let rest = ed25519_rest();
        let a = rest.request_id(1);
        let b = rest.request_id(1);
        assert!(a.starts_with("coinswitch-futures-1-"));
        assert!(b.starts_with("coinswitch-futures-1-"));
        assert_ne!(a, b);
    }
}
