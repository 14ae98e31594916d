use crate::coinswitch::rest::CoinSwitchRestClient;
use crate::coinswitch::stream::{StreamClient, StreamConfig};
use crate::coinswitch::{BASE_URL, EXCHANGE_NAME, STREAM_BASE_URL};
use crate::core::{
    config::ExchangeConfig,
    errors::ExchangeError,
    kernel::{signer_for, ReqwestRest, RestClient, RestClientBuilder, RestClientConfig},
};
use std::sync::Arc;

/// Create the signed REST client for the configured scheme
pub fn build_rest_client(
    config: &ExchangeConfig,
) -> Result<CoinSwitchRestClient<ReqwestRest>, ExchangeError> {
    let rest_config = RestClientConfig::new(
        config
            .base_url
            .clone()
            .unwrap_or_else(|| BASE_URL.to_string()),
        EXCHANGE_NAME.to_string(),
    );

    let mut rest_builder = RestClientBuilder::new(rest_config);

    // Without credentials every call fails locally with InvalidCredentials
    if config.has_credentials() {
        rest_builder = rest_builder.with_signer(signer_for(config));
    }

    let rest = rest_builder.build()?;
    Ok(CoinSwitchRestClient::new(rest))
}

fn stream_config(config: &ExchangeConfig) -> StreamConfig {
    StreamConfig::new(
        config
            .stream_url
            .clone()
            .unwrap_or_else(|| STREAM_BASE_URL.to_string()),
    )
}

/// Create a client for the public rate socket
pub fn build_stream_client(config: &ExchangeConfig) -> StreamClient {
    StreamClient::new(stream_config(config))
}

/// Create a stream client that renews its listen key through `rest` on every connect
pub fn build_account_stream_client<R: RestClient>(
    config: &ExchangeConfig,
    rest: Arc<CoinSwitchRestClient<R>>,
) -> StreamClient<R> {
    StreamClient::with_listen_key(stream_config(config), rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SigningScheme;
    use crate::core::types::RequestDescriptor;

    #[test]
    fn test_rest_client_uses_configured_base_url() {
        let config = ExchangeConfig::new("key".to_string(), "secret".to_string())
            .scheme(SigningScheme::Hmac)
            .base_url("http://127.0.0.1:9".to_string());
        let client = build_rest_client(&config).unwrap();

        let prepared = client
            .inner()
            .prepare(&RequestDescriptor::get("/trade/api/v2/ping"), 1)
            .unwrap();
        assert_eq!(prepared.url, "http://127.0.0.1:9/trade/api/v2/ping");
        assert!(prepared.headers.contains_key("x-api-signature"));
    }

    #[test]
    fn test_rest_client_without_credentials_cannot_sign() {
        let config = ExchangeConfig::new(String::new(), String::new());
        let client = build_rest_client(&config).unwrap();
        assert!(matches!(
            client
                .inner()
                .prepare(&RequestDescriptor::get("/trade/api/v2/ping"), 1),
            Err(ExchangeError::InvalidCredentials(_))
        ));
    }

    #[test]
    fn test_stream_client_defaults() {
        let config = ExchangeConfig::new("key".to_string(), "secret".to_string());
        let stream = build_stream_client(&config);
        assert_eq!(stream.config().base_url, STREAM_BASE_URL);

        let custom = ExchangeConfig::new("key".to_string(), "secret".to_string())
            .stream_url("ws://localhost:3000".to_string());
        assert_eq!(build_stream_client(&custom).config().base_url, "ws://localhost:3000");
    }
}
