use crate::coinswitch::codec::{SocketIoCodec, SocketIoPacket};
use crate::coinswitch::rest::CoinSwitchRestClient;
use crate::coinswitch::{EXCHANGE_NAME, NAMESPACE, SOCKET_PATH, STREAM_BASE_URL};
use crate::core::errors::ExchangeError;
use crate::core::kernel::{ReqwestRest, RestClient, TungsteniteWs, WsConfig};
use crate::core::types::{ApiResponse, StreamState, Subscription};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Idle limit before the Engine.IO handshake announces the real one
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for the streaming client
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Scheme and host, e.g. `wss://ws.coinswitch.co`
    pub base_url: String,
    /// Socket.IO handshake path
    pub socket_path: String,
    pub namespace: String,
    /// Fixed delay before every reconnect
    pub reconnect_delay: Duration,
    /// Delay after a failed listen-key fetch
    pub auth_failure_delay: Duration,
    pub connect_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            base_url: STREAM_BASE_URL.to_string(),
            socket_path: SOCKET_PATH.to_string(),
            namespace: NAMESPACE.to_string(),
            reconnect_delay: Duration::from_secs(5),
            auth_failure_delay: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl StreamConfig {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            ..Self::default()
        }
    }

    pub fn with_socket_path(mut self, socket_path: String) -> Self {
        self.socket_path = socket_path;
        self
    }

    pub fn with_namespace(mut self, namespace: String) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_auth_failure_delay(mut self, delay: Duration) -> Self {
        self.auth_failure_delay = delay;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Engine.IO websocket URL, with the listen key appended when there is one
    pub fn url(&self, listen_key: Option<&str>) -> String {
        let mut url = format!(
            "{}/{}/?EIO=4&transport=websocket",
            self.base_url.trim_end_matches('/'),
            self.socket_path.trim_matches('/')
        );
        if let Some(key) = listen_key {
            url.push_str("&listenKey=");
            url.push_str(&urlencoding::encode(key));
        }
        url
    }
}

/// Stops a running [`StreamClient`] from any task
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<watch::Sender<bool>>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }
}

enum SessionEnd {
    Stopped,
    Lost(ExchangeError),
}

/// Resilient Socket.IO subscription client.
///
/// `run` connects, replays every subscription once the namespace is joined,
/// and hands each event to the caller in arrival order. On any disconnect it
/// waits the fixed reconnect delay and starts over with a fresh listen key.
/// Only [`StreamClient::stop`] ends the loop.
pub struct StreamClient<R: RestClient = ReqwestRest> {
    config: StreamConfig,
    rest: Option<Arc<CoinSwitchRestClient<R>>>,
    state: watch::Sender<StreamState>,
    stop: Arc<watch::Sender<bool>>,
    attempts: AtomicU64,
}

impl StreamClient<ReqwestRest> {
    /// Client for the public rate socket, no listen key
    pub fn new(config: StreamConfig) -> Self {
        Self::without_listen_key(config)
    }
}

impl<R: RestClient> StreamClient<R> {
    pub fn without_listen_key(config: StreamConfig) -> Self {
        Self::build(config, None)
    }

    /// Client that fetches a listen key through `rest` before every connect
    pub fn with_listen_key(config: StreamConfig, rest: Arc<CoinSwitchRestClient<R>>) -> Self {
        Self::build(config, Some(rest))
    }

    fn build(config: StreamConfig, rest: Option<Arc<CoinSwitchRestClient<R>>>) -> Self {
        let (state, _) = watch::channel(StreamState::Disconnected);
        let (stop, _) = watch::channel(false);
        Self {
            config,
            rest,
            state,
            stop: Arc::new(stop),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Observe connection state changes
    pub fn state(&self) -> watch::Receiver<StreamState> {
        self.state.subscribe()
    }

    pub fn current_state(&self) -> StreamState {
        *self.state.borrow()
    }

    /// Number of times the client entered `Connecting`
    pub fn connect_attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.stop.clone())
    }

    fn set_state(&self, state: StreamState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            info!(exchange = EXCHANGE_NAME, from = ?previous, to = ?state, "Stream state changed");
        }
    }

    /// Run until stopped.
    ///
    /// `on_event` receives the event name and its JSON payload.
    #[instrument(skip_all, fields(exchange = EXCHANGE_NAME, subscriptions = subscriptions.len()))]
    pub async fn run<F>(
        &self,
        mut on_event: F,
        subscriptions: &[Subscription],
    ) -> Result<(), ExchangeError>
    where
        F: FnMut(&str, &Value) + Send,
    {
        let mut stop_rx = self.stop.subscribe();

        loop {
            if *stop_rx.borrow() {
                break;
            }

            self.attempts.fetch_add(1, Ordering::Relaxed);
            self.set_state(StreamState::Connecting);

            let listen_key = match &self.rest {
                Some(rest) => {
                    let fetched = tokio::select! {
                        biased;
                        () = stopped(&mut stop_rx) => break,
                        fetched = fetch_listen_key(rest) => fetched,
                    };
                    match fetched {
                        Ok(key) => Some(key),
                        Err(e) => {
                            warn!(error = %e, "Listen key renewal failed");
                            self.set_state(StreamState::Disconnected);
                            if sleep_or_stop(self.config.auth_failure_delay, &mut stop_rx).await {
                                break;
                            }
                            continue;
                        }
                    }
                }
                None => None,
            };

            let url = self.config.url(listen_key.as_deref());
            match self
                .session(&url, &mut on_event, subscriptions, &mut stop_rx)
                .await
            {
                SessionEnd::Stopped => break,
                SessionEnd::Lost(e) => warn!(error = %e, "Stream disconnected"),
            }

            self.set_state(StreamState::Disconnected);
            if sleep_or_stop(self.config.reconnect_delay, &mut stop_rx).await {
                break;
            }
        }

        self.set_state(StreamState::Stopped);
        Ok(())
    }

    async fn session<F>(
        &self,
        url: &str,
        on_event: &mut F,
        subscriptions: &[Subscription],
        stop_rx: &mut watch::Receiver<bool>,
    ) -> SessionEnd
    where
        F: FnMut(&str, &Value) + Send,
    {
        let codec = SocketIoCodec::new(self.config.namespace.clone());
        let mut ws = TungsteniteWs::new(url.to_string(), EXCHANGE_NAME.to_string(), codec)
            .with_config(WsConfig {
                connect_timeout_ms: self.config.connect_timeout.as_millis() as u64,
            });

        let connected = tokio::select! {
            biased;
            () = stopped(stop_rx) => return SessionEnd::Stopped,
            connected = ws.connect() => connected,
        };
        if let Err(e) = connected {
            return SessionEnd::Lost(e);
        }

        let end = self.pump(&mut ws, on_event, subscriptions, stop_rx).await;
        if let Err(e) = ws.close().await {
            debug!(error = %e, "Close failed");
        }
        end
    }

    async fn pump<F>(
        &self,
        ws: &mut TungsteniteWs<SocketIoCodec>,
        on_event: &mut F,
        subscriptions: &[Subscription],
        stop_rx: &mut watch::Receiver<bool>,
    ) -> SessionEnd
    where
        F: FnMut(&str, &Value) + Send,
    {
        let mut idle_timeout = DEFAULT_IDLE_TIMEOUT;
        // open and namespace join share the connect timeout
        let join_deadline = Instant::now().checked_add(self.config.connect_timeout);
        let mut joined = false;

        loop {
            let next = tokio::select! {
                biased;
                () = stopped(stop_rx) => return SessionEnd::Stopped,
                () = join_expired(join_deadline, joined) => {
                    return SessionEnd::Lost(ExchangeError::TransportError(format!(
                        "Namespace join not acknowledged within {:?}",
                        self.config.connect_timeout
                    )))
                }
                next = tokio::time::timeout(idle_timeout, ws.next_message()) => next,
            };

            let packet = match next {
                Err(_) => {
                    return SessionEnd::Lost(ExchangeError::TransportError(format!(
                        "No frame within {:?}",
                        idle_timeout
                    )))
                }
                Ok(None) => {
                    return SessionEnd::Lost(ExchangeError::WebSocketError(
                        "Connection closed".to_string(),
                    ))
                }
                Ok(Some(Err(ExchangeError::ProtocolError(reason)))) => {
                    warn!(%reason, "Dropping malformed frame");
                    continue;
                }
                Ok(Some(Err(e))) => return SessionEnd::Lost(e),
                Ok(Some(Ok(packet))) => packet,
            };

            match packet {
                SocketIoPacket::Open {
                    sid,
                    ping_interval,
                    ping_timeout,
                } => {
                    debug!(%sid, ping_interval, ping_timeout, "Engine.IO handshake");
                    idle_timeout =
                        Duration::from_millis(ping_interval.saturating_add(ping_timeout));
                    let join = ws.codec().encode_namespace_connect();
                    if let Err(e) = ws.send_raw(join).await {
                        return SessionEnd::Lost(e);
                    }
                }
                SocketIoPacket::Ping => {
                    let pong = ws.codec().encode_pong();
                    if let Err(e) = ws.send_raw(pong).await {
                        return SessionEnd::Lost(e);
                    }
                }
                SocketIoPacket::Connected { namespace } => {
                    joined = true;
                    self.set_state(StreamState::Connected);
                    for subscription in subscriptions {
                        if let Err(e) = ws.subscribe(subscription).await {
                            return SessionEnd::Lost(e);
                        }
                        debug!(%namespace, %subscription, "Subscribed");
                    }
                }
                SocketIoPacket::Event { name, payload, .. } => on_event(name.as_str(), &payload),
                SocketIoPacket::ConnectError { message, .. } => {
                    return SessionEnd::Lost(ExchangeError::WebSocketError(format!(
                        "Namespace connect rejected: {}",
                        message
                    )))
                }
                SocketIoPacket::Disconnected { .. } | SocketIoPacket::Close => {
                    return SessionEnd::Lost(ExchangeError::WebSocketError(
                        "Server closed the session".to_string(),
                    ))
                }
                SocketIoPacket::Pong | SocketIoPacket::Noop => {}
            }
        }
    }
}

/// Resolves once stop has been requested
async fn stopped(stop_rx: &mut watch::Receiver<bool>) {
    loop {
        if *stop_rx.borrow_and_update() {
            return;
        }
        if stop_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Resolves at the join deadline while the namespace is not joined yet
async fn join_expired(deadline: Option<Instant>, joined: bool) {
    match deadline {
        Some(deadline) if !joined => tokio::time::sleep_until(deadline).await,
        _ => std::future::pending::<()>().await,
    }
}

/// Sleep for `delay`; returns `true` when stop arrived first
async fn sleep_or_stop(delay: Duration, stop_rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        biased;
        () = stopped(stop_rx) => true,
        () = tokio::time::sleep(delay) => false,
    }
}

async fn fetch_listen_key<R: RestClient>(
    rest: &CoinSwitchRestClient<R>,
) -> Result<String, ExchangeError> {
    let response = rest
        .create_listen_key()
        .await
        .map_err(|e| ExchangeError::AuthRenewalFailed(e.to_string()))?;

    match response {
        ApiResponse::Data(value) => parse_listen_key(&value).ok_or_else(|| {
            ExchangeError::AuthRenewalFailed(format!("No listen key in response: {}", value))
        }),
        ApiResponse::RateLimited { body } => Err(ExchangeError::AuthRenewalFailed(format!(
            "Rate limited: {}",
            body
        ))),
    }
}

/// Find the listen key at the top level or under `data`
pub fn parse_listen_key(value: &Value) -> Option<String> {
    let lookup = |v: &Value| {
        ["listenKey", "listen_key"]
            .iter()
            .find_map(|field| v.get(*field).and_then(Value::as_str))
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    };

    lookup(value).or_else(|| value.get("data").and_then(lookup))
}
