//! WebSocket dispatch engine (spec §2, §4.5-§4.9, §5): slot table, outbound
//! ring buffer, connection state machine, subscription registry, and the
//! request lifecycle that composes them.

pub mod connection;
pub mod lifecycle;
pub mod queue;
pub mod slots;
pub mod subscriptions;

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::MaybeTlsStream;
use url::Url;

use crate::error::{ProviderError, ProviderResult};
use crate::jsonrpc::{parse_inbound, InboundFrame};
use crate::metrics::MetricsHook;
use crate::ws::connection::{BackoffPolicy, ConnectionStateMachine, Event, IdlePolicy};
use crate::ws::lifecycle::Dispatcher;
use crate::ws::queue::{OutboundEntry, RingBuffer, WaitStrategy};
use crate::ws::slots::SlotTable;
use crate::ws::subscriptions::SubscriptionRegistry;

type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// A duration far enough in the future that it is effectively "never", used
/// to represent a disabled idle timeout without special-casing every select
/// branch (spec §4.7: "either timeout may be disabled by setting it to
/// zero").
const DISABLED_IDLE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 50);

/// Tunables recognized by the WebSocket transport (spec §6's configuration
/// table), assembled through the teacher's builder-style configuration
/// pattern.
#[derive(Debug, Clone)]
pub struct WsClientConfig {
    pub url: Url,
    pub max_pending_requests: usize,
    pub ring_buffer_size: usize,
    pub wait_strategy: WaitStrategy,
    pub default_request_timeout: Duration,
    pub idle_policy: IdlePolicy,
    pub backoff: BackoffPolicy,
}

impl WsClientConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            max_pending_requests: 65_536,
            ring_buffer_size: 4_096,
            wait_strategy: WaitStrategy::Yielding,
            default_request_timeout: Duration::from_secs(30),
            idle_policy: IdlePolicy {
                write_idle: Duration::from_secs(20),
                read_idle: Duration::from_secs(60),
            },
            backoff: BackoffPolicy {
                base: Duration::from_millis(200),
                max: Duration::from_secs(30),
                jitter_min: 0.8,
                jitter_max: 1.2,
            },
        }
    }

    pub fn with_max_pending_requests(mut self, n: usize) -> Self {
        self.max_pending_requests = n;
        self
    }

    pub fn with_ring_buffer_size(mut self, n: usize) -> Self {
        self.ring_buffer_size = n;
        self
    }

    pub fn with_wait_strategy(mut self, strategy: WaitStrategy) -> Self {
        self.wait_strategy = strategy;
        self
    }

    pub fn with_default_request_timeout(mut self, timeout: Duration) -> Self {
        self.default_request_timeout = timeout;
        self
    }

    pub fn with_idle_policy(mut self, idle_policy: IdlePolicy) -> Self {
        self.idle_policy = idle_policy;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

/// A live WebSocket connection: the dispatcher callers use, plus the
/// supervisor task that owns the socket across reconnects and never runs
/// caller code (spec §5).
pub struct WsConnection {
    dispatcher: Dispatcher,
    subscriptions: Arc<SubscriptionRegistry>,
    state: Arc<ConnectionStateMachine>,
    supervisor: tokio::task::JoinHandle<()>,
}

impl WsConnection {
    /// Connects and spawns the dedicated supervisor task. The initial
    /// handshake happens before this call returns, so connection failures
    /// are reported to the caller immediately; every subsequent reconnect
    /// happens in the background per spec §4.7.
    pub async fn connect(config: WsClientConfig, metrics: Arc<dyn MetricsHook>) -> ProviderResult<Self> {
        let state = Arc::new(ConnectionStateMachine::new());
        let slots = Arc::new(SlotTable::new(config.max_pending_requests));
        let queue = Arc::new(RingBuffer::new(config.ring_buffer_size, config.wait_strategy));
        let subscriptions = Arc::new(SubscriptionRegistry::new());

        let first_stream = dial(&config.url, &state, &metrics).await?;

        let dispatcher = Dispatcher {
            slots: slots.clone(),
            queue: queue.clone(),
            state: state.clone(),
            metrics: metrics.clone(),
            default_timeout: config.default_request_timeout,
        };

        let supervisor = tokio::spawn(supervise(
            first_stream,
            config,
            slots,
            queue,
            subscriptions.clone(),
            state.clone(),
            metrics,
        ));

        Ok(Self {
            dispatcher,
            subscriptions,
            state,
            supervisor,
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn subscriptions(&self) -> &Arc<SubscriptionRegistry> {
        &self.subscriptions
    }

    pub fn state(&self) -> connection::ConnectionState {
        self.state.current()
    }

    /// Requests a graceful close and waits for the supervisor task to exit.
    /// After this returns, the state machine is `Closed` and will never
    /// attempt another reconnect.
    pub async fn close(self) {
        let _ = self.dispatcher.queue.try_push(OutboundEntry::Close);
        let _ = self.supervisor.await;
    }
}

/// Performs the WebSocket handshake, recording the outcome on the state
/// machine (spec §4.7: `Connecting -> Connected` or `-> Reconnecting`).
async fn dial(
    url: &Url,
    state: &ConnectionStateMachine,
    metrics: &Arc<dyn MetricsHook>,
) -> ProviderResult<WsStream> {
    let before = state.current();
    match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((stream, _response)) => {
            let after = state.transition(Event::HandshakeOk);
            metrics.on_connection_state_change(before, after);
            Ok(stream)
        }
        Err(e) => {
            let after = state.transition(Event::HandshakeFailed);
            metrics.on_connection_state_change(before, after);
            Err(ProviderError::TransportError(e.to_string()))
        }
    }
}

/// Owns the socket across its lifetime, reconnecting with backoff whenever
/// the inner connection loop exits without the caller having requested a
/// close (spec §4.7's `Reconnecting` state and exponential backoff).
async fn supervise(
    first_stream: WsStream,
    config: WsClientConfig,
    slots: Arc<SlotTable>,
    queue: Arc<RingBuffer>,
    subscriptions: Arc<SubscriptionRegistry>,
    state: Arc<ConnectionStateMachine>,
    metrics: Arc<dyn MetricsHook>,
) {
    let mut stream = Some(first_stream);
    let mut attempt: u32 = 0;

    loop {
        let ws_stream = match stream.take() {
            Some(s) => s,
            None => {
                let delay = config
                    .backoff
                    .delay_for_attempt(attempt, &mut rand::thread_rng());
                tokio::time::sleep(delay).await;
                match dial(&config.url, &state, &metrics).await {
                    Ok(s) => {
                        attempt = 0;
                        s
                    }
                    Err(_) => {
                        attempt = attempt.saturating_add(1);
                        if state.current() == connection::ConnectionState::Closed {
                            return;
                        }
                        continue;
                    }
                }
            }
        };

        run_connection(
            ws_stream,
            &slots,
            &queue,
            &subscriptions,
            &state,
            &metrics,
            config.idle_policy,
        )
        .await;

        if state.current() == connection::ConnectionState::Closed {
            return;
        }
        // Anything else means the socket dropped; loop back and reconnect.
    }
}

/// Runs the I/O loop for one live socket: drains the outbound queue,
/// dispatches inbound frames, and enforces the idle ping/read timeouts.
/// Returns when the socket closes, errors, an idle timeout fires, or the
/// caller requests a close. Never runs caller code directly — subscription
/// notifications are handed off through a channel (spec §5, §4.8).
async fn run_connection(
    mut ws_stream: WsStream,
    slots: &Arc<SlotTable>,
    queue: &Arc<RingBuffer>,
    subscriptions: &Arc<SubscriptionRegistry>,
    state: &Arc<ConnectionStateMachine>,
    metrics: &Arc<dyn MetricsHook>,
    idle_policy: IdlePolicy,
) {
    let write_idle = if idle_policy.write_idle_enabled() {
        idle_policy.write_idle
    } else {
        DISABLED_IDLE
    };
    let read_idle = if idle_policy.read_idle_enabled() {
        idle_policy.read_idle
    } else {
        DISABLED_IDLE
    };

    let mut write_deadline = Instant::now() + write_idle;
    let mut read_deadline = Instant::now() + read_idle;

    loop {
        tokio::select! {
            outbound = pop_outbound(queue.clone()) => {
                match outbound {
                    Some(OutboundEntry::Frame(bytes)) => {
                        write_deadline = Instant::now() + write_idle;
                        if ws_stream.send(Message::Text(String::from_utf8_lossy(&bytes).into_owned())).await.is_err() {
                            lose_connection(state, slots, subscriptions, metrics);
                            return;
                        }
                    }
                    Some(OutboundEntry::Ping) => {
                        write_deadline = Instant::now() + write_idle;
                        let _ = ws_stream.send(Message::Ping(Vec::new())).await;
                    }
                    Some(OutboundEntry::Close) => {
                        let _ = ws_stream.send(Message::Close(None)).await;
                        let before = state.current();
                        let after = state.transition(Event::Close);
                        metrics.on_connection_state_change(before, after);
                        return;
                    }
                    None => {}
                }
            }
            inbound = ws_stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        read_deadline = Instant::now() + read_idle;
                        match parse_inbound(text.as_bytes()) {
                            Ok(InboundFrame::Response { id, payload }) => {
                                slots.complete(id, Ok(payload));
                            }
                            Ok(InboundFrame::Subscription(notification)) => {
                                subscriptions.dispatch(notification);
                            }
                            Err(_protocol_error) => {
                                // A single malformed frame is logged by the
                                // caller's tracing subscriber and does not
                                // tear down the connection (spec §4.10).
                            }
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        read_deadline = Instant::now() + read_idle;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        lose_connection(state, slots, subscriptions, metrics);
                        return;
                    }
                    Some(Ok(_)) => {
                        read_deadline = Instant::now() + read_idle;
                    }
                    Some(Err(_)) => {
                        lose_connection(state, slots, subscriptions, metrics);
                        return;
                    }
                }
            }
            _ = tokio::time::sleep_until(write_deadline.into()) => {
                write_deadline = Instant::now() + write_idle;
                let _ = ws_stream.send(Message::Ping(Vec::new())).await;
            }
            _ = tokio::time::sleep_until(read_deadline.into()) => {
                lose_connection(state, slots, subscriptions, metrics);
                return;
            }
        }
    }
}

/// Blocks (via the configured wait strategy, off the async runtime) until an
/// outbound entry is available.
async fn pop_outbound(queue: Arc<RingBuffer>) -> Option<OutboundEntry> {
    tokio::task::spawn_blocking(move || queue.pop_blocking())
        .await
        .unwrap_or(None)
}

/// Transitions to `Reconnecting` and fails every outstanding slot and
/// subscription (spec §4.7: "every outstanding slot is completed with
/// `ConnectionLost`; every subscription is marked stale").
fn lose_connection(
    state: &Arc<ConnectionStateMachine>,
    slots: &Arc<SlotTable>,
    subscriptions: &Arc<SubscriptionRegistry>,
    metrics: &Arc<dyn MetricsHook>,
) {
    let before = state.current();
    let after = state.transition(Event::SocketClosedOrReadIdle);
    metrics.on_connection_state_change(before, after);
    slots.fail_all_with_connection_lost();
    subscriptions.fail_all_stale();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_url() -> Url {
        Url::parse("ws://127.0.0.1:9999").unwrap()
    }

    #[test]
    fn config_has_sane_defaults() {
        let config = WsClientConfig::new(test_url());
        assert_eq!(config.max_pending_requests, 65_536);
        assert_eq!(config.ring_buffer_size, 4_096);
        assert!(matches!(config.wait_strategy, WaitStrategy::Yielding));
        assert_eq!(config.default_request_timeout, Duration::from_secs(30));
        assert!(config.idle_policy.write_idle_enabled());
        assert!(config.idle_policy.read_idle_enabled());
    }

    #[test]
    fn builder_methods_override_defaults() {
        let config = WsClientConfig::new(test_url())
            .with_max_pending_requests(1_024)
            .with_ring_buffer_size(256)
            .with_wait_strategy(WaitStrategy::BusySpin)
            .with_default_request_timeout(Duration::from_secs(5))
            .with_idle_policy(IdlePolicy {
                write_idle: Duration::ZERO,
                read_idle: Duration::ZERO,
            })
            .with_backoff(BackoffPolicy {
                base: Duration::from_millis(1),
                max: Duration::from_millis(2),
                jitter_min: 1.0,
                jitter_max: 1.0,
            });

        assert_eq!(config.max_pending_requests, 1_024);
        assert_eq!(config.ring_buffer_size, 256);
        assert!(matches!(config.wait_strategy, WaitStrategy::BusySpin));
        assert_eq!(config.default_request_timeout, Duration::from_secs(5));
        assert!(!config.idle_policy.write_idle_enabled());
        assert!(!config.idle_policy.read_idle_enabled());
        assert_eq!(config.backoff.max, Duration::from_millis(2));
    }

    #[tokio::test]
    async fn lose_connection_fails_outstanding_slots_and_subscriptions() {
        let state = Arc::new(ConnectionStateMachine::new());
        state.transition(Event::HandshakeOk);
        let slots = Arc::new(SlotTable::new(8));
        let subscriptions = Arc::new(SubscriptionRegistry::new());
        let metrics: Arc<dyn MetricsHook> = Arc::new(crate::metrics::NoopMetrics);

        let reservation = slots.allocate("eth_blockNumber").unwrap();
        let mut receiver = subscriptions.register("0x1".to_string());

        lose_connection(&state, &slots, &subscriptions, &metrics);

        assert_eq!(state.current(), connection::ConnectionState::Reconnecting);
        let response = reservation.completion.await.unwrap();
        assert!(response.is_err());
        assert!(matches!(
            receiver.try_recv(),
            Ok(subscriptions::SubscriptionEvent::SubscriptionLost)
        ));
    }
}
