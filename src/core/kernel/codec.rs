use crate::core::errors::ExchangeError;
use crate::core::types::Subscription;
use tokio_tungstenite::tungstenite::Message;

/// Codec trait for stream framing
///
/// Converts between raw WebSocket frames and typed stream packets. The
/// transport handles WebSocket-level control frames; everything carried in
/// text or binary frames goes through the codec.
pub trait WsCodec: Send + Sync + 'static {
    /// The type representing parsed packets
    type Message: Send + Sync;

    /// Encode one subscription into a frame ready to send
    fn encode_subscription(&self, subscription: &Subscription) -> Result<Message, ExchangeError>;

    /// Decode a raw frame into a typed packet
    ///
    /// # Returns
    /// - `Ok(Some(message))` - Successfully decoded packet
    /// - `Ok(None)` - Frame was ignored by the codec
    /// - `Err(error)` - Malformed frame, the caller decides whether to drop it
    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, ExchangeError>;
}
