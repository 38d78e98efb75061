//! Request lifecycle (spec §4.9): `send_async`, `send`, and
//! `send_async_batch`, composing the slot table, outbound queue, and
//! connection state machine.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::timeout as tokio_timeout;

use crate::error::{ProviderError, ProviderResult};
use crate::jsonrpc::{Request, ResponsePayload};
use crate::metrics::MetricsHook;
use crate::ws::connection::{ConnectionState, ConnectionStateMachine};
use crate::ws::queue::{OutboundEntry, RingBuffer};
use crate::ws::slots::SlotTable;

/// Everything a `send*` call needs: the slot table, outbound queue, and
/// connection state, bundled so the dispatch engine can hand it to caller
/// tasks without exposing internal locks.
#[derive(Clone)]
pub struct Dispatcher {
    pub slots: Arc<SlotTable>,
    pub queue: Arc<RingBuffer>,
    pub state: Arc<ConnectionStateMachine>,
    pub metrics: Arc<dyn MetricsHook>,
    pub default_timeout: Duration,
}

impl Dispatcher {
    /// `send_async(method, params, timeout?) -> future<Response>` (spec
    /// §4.9, steps 1-6).
    pub async fn send_async(
        &self,
        method: &str,
        params: Value,
        request_timeout: Option<Duration>,
    ) -> ProviderResult<Value> {
        if self.state.current() != ConnectionState::Connected {
            return Err(ProviderError::NotConnected);
        }

        self.metrics.on_request_started(method);
        let started = std::time::Instant::now();

        let reservation = self.slots.allocate(method)?;
        let request = Request::new(reservation.id, method, params);
        let frame = match request.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                self.slots.cancel(reservation.id);
                return Err(e);
            }
        };

        if let Err(e) = self.queue.try_push(OutboundEntry::Frame(frame)) {
            self.slots.cancel(reservation.id);
            self.metrics.on_backpressure("ring_buffer_saturated");
            return Err(e);
        }

        let wait = request_timeout.unwrap_or(self.default_timeout);
        let result = match tokio_timeout(wait, reservation.completion).await {
            Ok(Ok(response)) => response,
            Ok(Err(_cancelled_sender_dropped)) => Err(ProviderError::Cancelled),
            Err(_elapsed) => {
                self.slots.timeout(reservation.id);
                self.metrics.on_request_timeout(method);
                Err(ProviderError::RequestTimeout)
            }
        };

        match result {
            Ok(ResponsePayload::Result(value)) => {
                self.metrics.on_request_completed(method, started.elapsed());
                Ok(value)
            }
            Ok(ResponsePayload::Error(err)) => Err(err.into()),
            Err(e) => Err(e),
        }
    }

    /// `send(method, params) -> Response`: blocks the *caller's* thread,
    /// never the I/O task. Implemented by driving the async future to
    /// completion on a handle dedicated to this call.
    pub fn send(&self, method: &str, params: Value) -> ProviderResult<Value> {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(self.send_async(method, params, None))
        })
    }

    /// Differs from repeated `send_async` only in hinting the outbound
    /// queue that many frames are about to arrive; it still reserves one
    /// slot per request (spec §4.9).
    pub async fn send_async_batch(
        &self,
        requests: Vec<(&str, Value)>,
    ) -> Vec<ProviderResult<Value>> {
        if self.state.current() != ConnectionState::Connected {
            return requests.iter().map(|_| Err(ProviderError::NotConnected)).collect();
        }

        let mut reservations = Vec::with_capacity(requests.len());
        let mut frames = Vec::with_capacity(requests.len());
        for (method, params) in &requests {
            match self.slots.allocate(method) {
                Ok(reservation) => {
                    let request = Request::new(reservation.id, *method, params.clone());
                    match request.to_bytes() {
                        Ok(bytes) => {
                            frames.push(OutboundEntry::Frame(bytes));
                            reservations.push(Ok(reservation));
                        }
                        Err(e) => {
                            self.slots.cancel(reservation.id);
                            reservations.push(Err(e));
                        }
                    }
                }
                Err(e) => reservations.push(Err(e)),
            }
        }

        if let Err(e) = self.queue.try_push_batch(frames) {
            return reservations
                .into_iter()
                .map(|r| match r {
                    Ok(reservation) => {
                        self.slots.cancel(reservation.id);
                        Err(e.clone_for_batch_failure())
                    }
                    Err(e) => Err(e),
                })
                .collect();
        }

        let mut out = Vec::with_capacity(reservations.len());
        for reservation in reservations {
            match reservation {
                Ok(reservation) => {
                    let wait = self.default_timeout;
                    let outcome = match tokio_timeout(wait, reservation.completion).await {
                        Ok(Ok(Ok(ResponsePayload::Result(value)))) => Ok(value),
                        Ok(Ok(Ok(ResponsePayload::Error(err)))) => Err(err.into()),
                        Ok(Ok(Err(e))) => Err(e),
                        Ok(Err(_)) => Err(ProviderError::Cancelled),
                        Err(_) => {
                            self.slots.timeout(reservation.id);
                            Err(ProviderError::RequestTimeout)
                        }
                    };
                    out.push(outcome);
                }
                Err(e) => out.push(Err(e)),
            }
        }
        out
    }
}

impl ProviderError {
    fn clone_for_batch_failure(&self) -> ProviderError {
        match self {
            ProviderError::RingBufferSaturated => ProviderError::RingBufferSaturated,
            other => ProviderError::TransportError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::NoopMetrics;
    use crate::ws::connection::Event;
    use crate::ws::queue::WaitStrategy;

    fn connected_dispatcher(timeout: Duration) -> Dispatcher {
        let state = Arc::new(ConnectionStateMachine::new());
        state.transition(Event::HandshakeOk);
        Dispatcher {
            slots: Arc::new(SlotTable::new(8)),
            queue: Arc::new(RingBuffer::new(8, WaitStrategy::Yielding)),
            state,
            metrics: Arc::new(NoopMetrics),
            default_timeout: timeout,
        }
    }

    #[tokio::test]
    async fn send_async_times_out_when_no_response_arrives() {
        tokio::time::pause();
        let dispatcher = connected_dispatcher(Duration::from_millis(50));
        let call = dispatcher.send_async("eth_chainId", serde_json::json!([]), None);
        tokio::pin!(call);

        tokio::select! {
            _ = &mut call => panic!("should not resolve before the timer fires"),
            _ = tokio::time::sleep(Duration::from_millis(10)) => {}
        }
        tokio::time::advance(Duration::from_millis(100)).await;
        let result = call.await;
        assert!(matches!(result, Err(ProviderError::RequestTimeout)));
    }

    #[tokio::test]
    async fn send_async_fails_fast_when_not_connected() {
        let dispatcher = Dispatcher {
            slots: Arc::new(SlotTable::new(8)),
            queue: Arc::new(RingBuffer::new(8, WaitStrategy::Yielding)),
            state: Arc::new(ConnectionStateMachine::new()),
            metrics: Arc::new(NoopMetrics),
            default_timeout: Duration::from_secs(1),
        };
        let result = dispatcher
            .send_async("eth_chainId", serde_json::json!([]), None)
            .await;
        assert!(matches!(result, Err(ProviderError::NotConnected)));
    }

    #[tokio::test]
    async fn completing_the_slot_resolves_the_future() {
        let dispatcher = connected_dispatcher(Duration::from_secs(5));
        let slots = dispatcher.slots.clone();
        let call = dispatcher.send_async("eth_chainId", serde_json::json!([]), None);
        tokio::pin!(call);

        // Drive the call far enough to enqueue and reserve a slot, then
        // complete it as the I/O task would on a real response.
        let queued = tokio::time::timeout(Duration::from_millis(20), &mut call).await;
        assert!(queued.is_err(), "should still be pending on its slot");

        let frame = dispatcher.queue.try_pop().unwrap();
        let id = match frame {
            OutboundEntry::Frame(bytes) => {
                let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
                value["id"].as_u64().unwrap()
            }
            _ => panic!("expected a frame"),
        };
        slots.complete(id, Ok(ResponsePayload::Result(serde_json::json!("0x1"))));

        let result = call.await.unwrap();
        assert_eq!(result, serde_json::json!("0x1"));
    }
}
