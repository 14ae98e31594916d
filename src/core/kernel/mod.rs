/// Transport kernel shared by the REST and streaming clients
///
/// The kernel carries transport logic and generic interfaces only. Exchange
/// specifics (endpoints, Socket.IO framing, listen keys) live in
/// [`crate::coinswitch`].
///
/// ## Transport Layer
/// - `RestClient`: signed HTTP client interface
/// - `TungsteniteWs`: single WebSocket connection
///
/// ## Authentication
/// - `Signer`: pluggable authentication interface
/// - `Ed25519Signer`: Ed25519 over `method + path + epoch`
/// - `HmacSigner`: HMAC-SHA256 over `epoch + api_key + body`
///
/// ## Message Handling
/// - `WsCodec`: stream framing encode/decode
///
/// # Example
/// ```rust,no_run
/// use coinswitch_futures::core::config::ExchangeConfig;
/// use coinswitch_futures::core::kernel::*;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExchangeConfig::new("api_key".to_string(), "hex_secret".to_string());
/// let rest_config = RestClientConfig::new(
///     "https://coinswitch.co".to_string(),
///     "coinswitch".to_string(),
/// );
/// let rest = RestClientBuilder::new(rest_config)
///     .with_signer(signer_for(&config))
///     .build()?;
///
/// let response = rest.get("/trade/api/v2/ping", &[]).await?;
/// println!("{}", response);
/// # Ok(())
/// # }
/// ```
pub mod codec;
pub mod rest;
pub mod signer;
pub mod ws;

pub use codec::WsCodec;
pub use rest::{PreparedRequest, ReqwestRest, RestClient, RestClientBuilder, RestClientConfig};
pub use signer::{signer_for, Ed25519Signer, HmacSigner, SignatureResult, Signer};
pub use ws::{TungsteniteWs, WsConfig};
