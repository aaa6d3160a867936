/// In-process application events
///
/// The store publishes a `DataChanged` event after every mutation and the
/// shell publishes `RouteChanged` after every completed navigation. Views
/// and dashboards subscribe to know when to refresh.
///
/// Delivery is best-effort: publishing with no subscriber is not an error,
/// and a subscriber that falls more than `capacity` events behind skips the
/// oldest ones.
///
/// # Example
///
/// ```
/// use cotisations_shared::events::{AppEvent, DataChange, EventBus, Operation};
/// use cotisations_shared::store::{Collection, DocumentKey};
///
/// # async fn example() {
/// let bus = EventBus::new(16);
/// let mut rx = bus.subscribe();
///
/// bus.publish(AppEvent::DataChanged(DataChange {
///     collection: Collection::Members,
///     operation: Operation::Added,
///     key: Some(DocumentKey::Id(1)),
/// }));
///
/// let event = rx.recv().await.unwrap();
/// assert!(matches!(event, AppEvent::DataChanged(_)));
/// # }
/// ```

use crate::store::{Collection, DocumentKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Default number of buffered events per subscriber
pub const DEFAULT_CAPACITY: usize = 256;

/// Kind of mutation applied to a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "ajout")]
    Added,

    #[serde(rename = "modification")]
    Modified,

    #[serde(rename = "suppression")]
    Deleted,

    /// The collection was replaced by a snapshot import
    #[serde(rename = "import")]
    Imported,
}

/// Payload of a "data changed" notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataChange {
    #[serde(rename = "magasin")]
    pub collection: Collection,

    #[serde(rename = "type")]
    pub operation: Operation,

    /// Affected record; `None` for whole-collection operations
    #[serde(rename = "id")]
    pub key: Option<DocumentKey>,
}

/// Payload of a "route changed" notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteChange {
    /// Route key now active
    pub route: String,

    /// Route key active before the transition
    pub previous: Option<String>,

    /// Full fragment that triggered the transition
    pub fragment: String,

    pub at: DateTime<Utc>,
}

/// Application event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "detail")]
pub enum AppEvent {
    #[serde(rename = "donnees:sauvegardees")]
    DataChanged(DataChange),

    #[serde(rename = "route:changee")]
    RouteChanged(RouteChange),
}

/// Broadcast hub for application events
///
/// Cheap to clone; every clone publishes into the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes to every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event to all current subscribers
    pub fn publish(&self, event: AppEvent) {
        trace!(?event, "Publishing application event");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_silent() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(AppEvent::DataChanged(DataChange {
            collection: Collection::Cantons,
            operation: Operation::Deleted,
            key: Some(DocumentKey::Id(7)),
        }));
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_event() {
        let bus = EventBus::new(4);
        let mut first = bus.subscribe();
        let mut second = bus.clone().subscribe();

        let change = DataChange {
            collection: Collection::Payments,
            operation: Operation::Added,
            key: Some(DocumentKey::Id(1)),
        };
        bus.publish(AppEvent::DataChanged(change.clone()));

        assert_eq!(first.recv().await.unwrap(), AppEvent::DataChanged(change.clone()));
        assert_eq!(second.recv().await.unwrap(), AppEvent::DataChanged(change));
    }

    #[test]
    fn test_event_wire_format() {
        let event = AppEvent::DataChanged(DataChange {
            collection: Collection::Villages,
            operation: Operation::Modified,
            key: Some(DocumentKey::Id(3)),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "donnees:sauvegardees");
        assert_eq!(json["detail"]["magasin"], "villages");
        assert_eq!(json["detail"]["type"], "modification");
        assert_eq!(json["detail"]["id"], 3);
    }
}
