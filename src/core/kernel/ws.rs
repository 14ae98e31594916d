use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::WsCodec;
use crate::core::types::Subscription;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, instrument, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
        }
    }
}

/// Tungstenite-based WebSocket session
///
/// Pure transport: one connection, owned exclusively by its caller. Reconnect
/// policy lives in the stream client that drives it.
pub struct TungsteniteWs<C: WsCodec> {
    url: String,
    write: Option<SplitSink<WsStream, Message>>,
    read: Option<SplitStream<WsStream>>,
    connected: bool,
    exchange_name: String,
    codec: C,
    config: WsConfig,
}

impl<C: WsCodec> TungsteniteWs<C> {
    /// Create a new WebSocket session with the specified codec
    ///
    /// # Arguments
    /// * `url` - The WebSocket URL to connect to
    /// * `exchange_name` - Name of the exchange for logging/tracing
    /// * `codec` - The codec to handle frame encoding/decoding
    pub fn new(url: String, exchange_name: String, codec: C) -> Self {
        Self {
            url,
            write: None,
            read: None,
            connected: false,
            exchange_name,
            codec,
            config: WsConfig::default(),
        }
    }

    /// Set custom WebSocket configuration
    pub fn with_config(mut self, config: WsConfig) -> Self {
        self.config = config;
        self
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    #[instrument(skip(self), fields(exchange = %self.exchange_name, url = %self.url))]
    pub async fn connect(&mut self) -> Result<(), ExchangeError> {
        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);

        let (ws_stream, _) = tokio::time::timeout(connect_timeout, connect_async(&self.url))
            .await
            .map_err(|_| {
                ExchangeError::TransportError("WebSocket connection timeout".to_string())
            })?
            .map_err(|e| {
                ExchangeError::WebSocketError(format!("WebSocket connection failed: {}", e))
            })?;

        let (write, read) = ws_stream.split();
        self.write = Some(write);
        self.read = Some(read);
        self.connected = true;
        debug!("WebSocket connected");

        Ok(())
    }

    #[instrument(skip(self, msg), fields(exchange = %self.exchange_name))]
    pub async fn send_raw(&mut self, msg: Message) -> Result<(), ExchangeError> {
        if !self.connected {
            return Err(ExchangeError::WebSocketError(
                "WebSocket not connected".to_string(),
            ));
        }

        let write = self.write.as_mut().ok_or_else(|| {
            ExchangeError::WebSocketError("WebSocket write stream not available".to_string())
        })?;

        if let Err(e) = write.send(msg).await {
            self.connected = false;
            return Err(ExchangeError::WebSocketError(format!(
                "Failed to send WebSocket message: {}",
                e
            )));
        }

        Ok(())
    }

    /// Receive the next data frame, answering WebSocket pings on the way.
    ///
    /// A close frame is returned to the caller and marks the session
    /// disconnected. `None` means the socket is gone.
    pub async fn next_raw(&mut self) -> Option<Result<Message, ExchangeError>> {
        loop {
            if !self.connected {
                return None;
            }

            let read = self.read.as_mut()?;

            match read.next().await {
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = self.send_raw(Message::Pong(data)).await {
                        warn!("Failed to send pong response: {}", e);
                    }
                }
                Some(Ok(Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(message @ Message::Close(_))) => {
                    self.connected = false;
                    return Some(Ok(message));
                }
                Some(Ok(message)) => return Some(Ok(message)),
                Some(Err(e)) => {
                    self.connected = false;
                    return Some(Err(ExchangeError::WebSocketError(format!(
                        "WebSocket error: {}",
                        e
                    ))));
                }
                None => {
                    self.connected = false;
                    return None;
                }
            }
        }
    }

    /// Get the next decoded packet.
    ///
    /// `None` when the connection closed. Decode failures come back as
    /// `Some(Err(ProtocolError))` and leave the session usable.
    pub async fn next_message(&mut self) -> Option<Result<C::Message, ExchangeError>> {
        loop {
            match self.next_raw().await? {
                Ok(Message::Close(frame)) => {
                    debug!(exchange = %self.exchange_name, ?frame, "Server closed the connection");
                    return None;
                }
                Ok(raw_msg) => match self.codec.decode_message(raw_msg) {
                    Ok(Some(decoded)) => return Some(Ok(decoded)),
                    Ok(None) => {}
                    Err(ExchangeError::ProtocolError(msg)) => {
                        return Some(Err(ExchangeError::ProtocolError(msg)))
                    }
                    Err(e) => return Some(Err(ExchangeError::ProtocolError(e.to_string()))),
                },
                Err(e) => return Some(Err(e)),
            }
        }
    }

    #[instrument(skip(self), fields(exchange = %self.exchange_name, subscription = %subscription))]
    pub async fn subscribe(&mut self, subscription: &Subscription) -> Result<(), ExchangeError> {
        let message = self.codec.encode_subscription(subscription)?;
        self.send_raw(message).await
    }

    #[instrument(skip(self), fields(exchange = %self.exchange_name))]
    pub async fn close(&mut self) -> Result<(), ExchangeError> {
        let sent = match self.write.as_mut() {
            Some(write) => write.send(Message::Close(None)).await.map_err(|e| {
                ExchangeError::WebSocketError(format!("Failed to send close frame: {}", e))
            }),
            None => Ok(()),
        };
        self.connected = false;
        self.write = None;
        self.read = None;
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    struct EchoCodec;

    impl WsCodec for EchoCodec {
        type Message = String;

        fn encode_subscription(
            &self,
            subscription: &Subscription,
        ) -> Result<Message, ExchangeError> {
            Ok(Message::Text(format!("sub:{}", subscription)))
        }

        fn decode_message(&self, message: Message) -> Result<Option<String>, ExchangeError> {
            match message {
                Message::Text(text) if text == "ignore" => Ok(None),
                Message::Text(text) if text == "bad" => {
                    Err(ExchangeError::DeserializationError("bad frame".to_string()))
                }
                Message::Text(text) => Ok(Some(text)),
                _ => Ok(None),
            }
        }
    }

    #[tokio::test]
    async fn test_session_roundtrip_against_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();

            let first = ws.next().await.unwrap().unwrap();
            assert_eq!(first, Message::Text("sub:EVENT:BTCUSDT".to_string()));

            ws.send(Message::Ping(vec![1, 2])).await.unwrap();
            let pong = ws.next().await.unwrap().unwrap();
            assert_eq!(pong, Message::Pong(vec![1, 2]));

            ws.send(Message::Text("ignore".to_string())).await.unwrap();
            ws.send(Message::Text("bad".to_string())).await.unwrap();
            ws.send(Message::Text("hello".to_string())).await.unwrap();
            ws.send(Message::Close(None)).await.unwrap();
        });

        let mut session = TungsteniteWs::new(
            format!("ws://{}", addr),
            "test".to_string(),
            EchoCodec,
        );
        session.connect().await.unwrap();
        assert!(session.is_connected());

        session
            .subscribe(&Subscription::new("EVENT", "BTCUSDT"))
            .await
            .unwrap();

        match session.next_message().await {
            Some(Err(ExchangeError::ProtocolError(msg))) => assert!(msg.contains("bad frame")),
            other => panic!("expected protocol error, got {:?}", other.map(|r| r.is_ok())),
        }
        assert_eq!(session.next_message().await.unwrap().unwrap(), "hello");
        assert!(session.next_message().await.is_none());
        assert!(!session.is_connected());

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_close_tears_down_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            matches!(ws.next().await, Some(Ok(Message::Close(_))))
        });

        let mut session =
            TungsteniteWs::new(format!("ws://{}", addr), "test".to_string(), EchoCodec);
        session.connect().await.unwrap();
        session.close().await.unwrap();

        assert!(!session.is_connected());
        assert!(session.send_raw(Message::Text("x".to_string())).await.is_err());
        // nothing left to close
        session.close().await.unwrap();
        assert!(server.await.unwrap());
    }

    #[tokio::test]
    async fn test_send_before_connect_fails() {
        let mut session =
            TungsteniteWs::new("ws://127.0.0.1:1".to_string(), "test".to_string(), EchoCodec);
        assert!(matches!(
            session.send_raw(Message::Text("x".to_string())).await,
            Err(ExchangeError::WebSocketError(_))
        ));
        assert!(session.next_message().await.is_none());
    }

    #[tokio::test]
    async fn test_connect_refused_is_websocket_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut session =
            TungsteniteWs::new(format!("ws://{}", addr), "test".to_string(), EchoCodec);
        assert!(session.connect().await.is_err());
        assert!(!session.is_connected());
    }
}
