use crate::core::config::{ExchangeConfig, SigningScheme};
use crate::core::errors::ExchangeError;
use ed25519_dalek::{Signer as Ed25519SignerTrait, SigningKey};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Signed headers to attach to a request
pub type SignatureResult = Result<HashMap<String, String>, ExchangeError>;

pub const ED25519_SIGNATURE_HEADER: &str = "X-AUTH-SIGNATURE";
pub const ED25519_API_KEY_HEADER: &str = "X-AUTH-APIKEY";
pub const ED25519_EPOCH_HEADER: &str = "X-AUTH-EPOCH";

pub const HMAC_SIGNATURE_HEADER: &str = "x-api-signature";
pub const HMAC_API_KEY_HEADER: &str = "x-api-key";
pub const HMAC_TIMESTAMP_HEADER: &str = "x-api-timestamp";

/// Signer trait for request authentication
///
/// Implementations turn one request into the authentication headers the
/// exchange expects. Signing is pure: no I/O, no clock reads.
pub trait Signer: Send + Sync {
    /// Sign a request and return the headers to attach
    ///
    /// # Arguments
    /// * `method` - HTTP method (GET, POST, DELETE)
    /// * `path` - Decoded server-relative path, including the query string for GET
    /// * `body` - Serialized JSON body, empty when there is none
    /// * `timestamp` - Request epoch in milliseconds
    fn sign_request(&self, method: &str, path: &str, body: &[u8], timestamp: u64)
        -> SignatureResult;

    fn scheme(&self) -> SigningScheme;
}

/// Build the signer for the configured scheme.
///
/// Credentials are validated lazily, on each signature, so a malformed secret
/// surfaces as `InvalidCredentials` from the call that needed it.
pub fn signer_for(config: &ExchangeConfig) -> Arc<dyn Signer> {
    match config.scheme {
        SigningScheme::Ed25519 => Arc::new(Ed25519Signer::new(
            config.api_key().to_string(),
            config.secret_key().to_string(),
        )),
        SigningScheme::Hmac => Arc::new(HmacSigner::new(
            config.api_key().to_string(),
            config.secret_key().to_string(),
        )),
    }
}

/// Ed25519 signer: hex secret key, signature over `method + path + epoch`
pub struct Ed25519Signer {
    api_key: Secret<String>,
    secret_key: Secret<String>,
}

impl Ed25519Signer {
    /// Create a new Ed25519 signer
    ///
    /// # Arguments
    /// * `api_key` - API key sent in the clear with every request
    /// * `secret_key` - Hex-encoded 32 byte private key
    pub fn new(api_key: String, secret_key: String) -> Self {
        Self {
            api_key: Secret::new(api_key),
            secret_key: Secret::new(secret_key),
        }
    }

    fn signing_key(&self) -> Result<SigningKey, ExchangeError> {
        let secret = self.secret_key.expose_secret().trim();
        if secret.is_empty() {
            return Err(ExchangeError::InvalidCredentials(
                "API secret is empty".to_string(),
            ));
        }

        let bytes = Zeroizing::new(hex::decode(secret).map_err(|e| {
            ExchangeError::InvalidCredentials(format!("API secret is not valid hex: {}", e))
        })?);

        let key_bytes: &[u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            ExchangeError::InvalidCredentials(format!(
                "API secret must be 32 bytes, got {}",
                bytes.len()
            ))
        })?;

        Ok(SigningKey::from_bytes(key_bytes))
    }

    /// Hex-encoded signature (128 lowercase hex characters)
    pub fn generate_signature(
        &self,
        method: &str,
        path: &str,
        timestamp: u64,
    ) -> Result<String, ExchangeError> {
        let signing_key = self.signing_key()?;
        let message = format!("{}{}{}", method, path, timestamp);
        let signature = signing_key.sign(message.as_bytes());
        Ok(hex::encode(signature.to_bytes()))
    }
}

impl Signer for Ed25519Signer {
    fn sign_request(
        &self,
        method: &str,
        path: &str,
        _body: &[u8],
        timestamp: u64,
    ) -> SignatureResult {
        let api_key = self.api_key.expose_secret();
        if api_key.is_empty() {
            return Err(ExchangeError::InvalidCredentials(
                "API key is empty".to_string(),
            ));
        }

        let signature = self.generate_signature(method, path, timestamp)?;

        let mut headers = HashMap::new();
        headers.insert(ED25519_SIGNATURE_HEADER.to_string(), signature);
        headers.insert(ED25519_API_KEY_HEADER.to_string(), api_key.clone());
        headers.insert(ED25519_EPOCH_HEADER.to_string(), timestamp.to_string());
        Ok(headers)
    }

    fn scheme(&self) -> SigningScheme {
        SigningScheme::Ed25519
    }
}

/// HMAC-SHA256 signer: shared secret, signature over `epoch + api_key + body`
pub struct HmacSigner {
    api_key: Secret<String>,
    secret_key: Secret<String>,
}

impl HmacSigner {
    /// Create a new HMAC signer
    ///
    /// # Arguments
    /// * `api_key` - API key from the exchange
    /// * `secret_key` - Shared secret used as the HMAC key
    pub fn new(api_key: String, secret_key: String) -> Self {
        Self {
            api_key: Secret::new(api_key),
            secret_key: Secret::new(secret_key),
        }
    }

    /// Hex-encoded signature (64 lowercase hex characters)
    pub fn generate_signature(&self, timestamp: u64, body: &str) -> Result<String, ExchangeError> {
        let secret = self.secret_key.expose_secret();
        if secret.is_empty() {
            return Err(ExchangeError::InvalidCredentials(
                "API secret is empty".to_string(),
            ));
        }

        let payload = format!("{}{}{}", timestamp, self.api_key.expose_secret(), body);
        hmac_hex(secret.as_bytes(), &payload)
    }
}

fn hmac_hex(key: &[u8], payload: &str) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| ExchangeError::InvalidCredentials(format!("Invalid secret key: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

impl Signer for HmacSigner {
    fn sign_request(
        &self,
        _method: &str,
        _path: &str,
        body: &[u8],
        timestamp: u64,
    ) -> SignatureResult {
        let api_key = self.api_key.expose_secret();
        if api_key.is_empty() {
            return Err(ExchangeError::InvalidCredentials(
                "API key is empty".to_string(),
            ));
        }

        let body = std::str::from_utf8(body).map_err(|e| {
            ExchangeError::SerializationError(format!("Request body is not UTF-8: {}", e))
        })?;
        let signature = self.generate_signature(timestamp, body)?;

        let mut headers = HashMap::new();
        headers.insert(HMAC_SIGNATURE_HEADER.to_string(), signature);
        headers.insert(HMAC_API_KEY_HEADER.to_string(), api_key.clone());
        headers.insert(HMAC_TIMESTAMP_HEADER.to_string(), timestamp.to_string());
        Ok(headers)
    }

    fn scheme(&self) -> SigningScheme {
        SigningScheme::Hmac
    }
}
