//! Subscription registry: server subscription id -> consumer (spec §4.8).

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::jsonrpc::SubscriptionNotification;

/// Delivered to a subscriber each time a notification arrives, or once when
/// the connection drops without the caller having unsubscribed.
#[derive(Debug, Clone)]
pub enum SubscriptionEvent {
    Notification(Value),
    /// Spec Open Question decision: there is no replay buffer across a
    /// reconnect; the registry tells the caller to resubscribe instead of
    /// silently losing events.
    SubscriptionLost,
}

/// Concurrent map from server-assigned subscription id to the channel
/// feeding its consumer task.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    subscriptions: DashMap<String, mpsc::UnboundedSender<SubscriptionEvent>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            subscriptions: DashMap::new(),
        }
    }

    /// Binds a freshly assigned subscription id to a consumer channel,
    /// returning the receiving half.
    pub fn register(&self, subscription_id: String) -> mpsc::UnboundedReceiver<SubscriptionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscriptions.insert(subscription_id, tx);
        rx
    }

    /// Unsubscribe is idempotent: removing an id that is not present is not
    /// an error.
    pub fn unregister(&self, subscription_id: &str) {
        self.subscriptions.remove(subscription_id);
    }

    /// Dispatches one inbound notification onto its subscriber's channel,
    /// from the dedicated subscription-dispatch executor (never the I/O
    /// task). A notification for an unknown or already-closed id is
    /// dropped silently.
    pub fn dispatch(&self, notification: SubscriptionNotification) {
        if let Some(sender) = self.subscriptions.get(&notification.subscription) {
            let _ = sender.send(SubscriptionEvent::Notification(notification.result));
        }
    }

    /// Marks every live subscription stale on a connection drop (spec §4.7):
    /// each consumer receives one `SubscriptionLost` and the registry is
    /// cleared, since prior subscription ids are not valid after reconnect.
    pub fn fail_all_stale(&self) {
        for entry in self.subscriptions.iter() {
            let _ = entry.value().send(SubscriptionEvent::SubscriptionLost);
        }
        self.subscriptions.clear();
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatch_delivers_to_the_registered_consumer() {
        let registry = SubscriptionRegistry::new();
        let mut rx = registry.register("0xabc".to_string());
        registry.dispatch(SubscriptionNotification {
            subscription: "0xabc".to_string(),
            result: serde_json::json!({"foo": "bar"}),
        });
        match rx.recv().await.unwrap() {
            SubscriptionEvent::Notification(value) => {
                assert_eq!(value["foo"], "bar");
            }
            _ => panic!("expected notification"),
        }
    }

    #[tokio::test]
    async fn unsubscribe_twice_is_not_an_error() {
        let registry = SubscriptionRegistry::new();
        registry.register("0xabc".to_string());
        registry.unregister("0xabc");
        registry.unregister("0xabc"); // idempotent, no panic
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn dispatch_to_unknown_id_is_dropped_silently() {
        let registry = SubscriptionRegistry::new();
        registry.dispatch(SubscriptionNotification {
            subscription: "0xdoesnotexist".to_string(),
            result: serde_json::json!(null),
        });
        // no panic, nothing to assert beyond survival
    }

    #[tokio::test]
    async fn connection_loss_marks_all_subscriptions_stale_and_clears_registry() {
        let registry = SubscriptionRegistry::new();
        let mut rx = registry.register("0xabc".to_string());
        registry.fail_all_stale();
        assert!(matches!(
            rx.recv().await.unwrap(),
            SubscriptionEvent::SubscriptionLost
        ));
        assert!(registry.is_empty());
    }
}
