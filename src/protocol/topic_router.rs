// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT topic routing for subscription callbacks.
//!
//! The [`TopicRouter`] is the subscriber table behind a transport. It keeps
//! every registered callback by filter, tells the transport when a filter
//! needs a broker-level SUBSCRIBE or UNSUBSCRIBE, and dispatches incoming
//! messages to every matching callback.
//!
//! # Architecture
//!
//! ```text
//! MQTT Message: home/kitchen/light → ON
//!                     ↓
//!             TopicRouter.route()
//!                     ↓
//!     Match against "home/kitchen/light", "home/+/light", "home/#"
//!                     ↓
//!     Decode once per (filter, encoding) → Arc<ReceiveMessage>
//!                     ↓
//!           callback(message) for each subscriber
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::subscription::{MessageCallback, SubscriptionId, SubscriptionIdGenerator};
use crate::types::{Encoding, QosLevel};

use super::message::{Payload, ReceiveMessage};
use super::topic::topic_matches;

/// One registered callback.
struct Subscriber {
    id: SubscriptionId,
    qos: QosLevel,
    encoding: Encoding,
    callback: MessageCallback,
}

/// All callbacks registered under one filter.
struct FilterEntry {
    subscribers: Vec<Subscriber>,
    /// Highest QoS requested from the broker for this filter.
    requested_qos: QosLevel,
}

#[derive(Default)]
struct RouterTable {
    filters: HashMap<String, FilterEntry>,
    index: HashMap<SubscriptionId, String>,
}

/// Result of registering a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    /// Handle of the new subscription.
    pub id: SubscriptionId,
    /// QoS the transport must SUBSCRIBE with, if a broker request is needed.
    pub broker_subscribe: Option<QosLevel>,
}

/// Result of removing a callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    /// The ID was not registered.
    NotFound,
    /// Other callbacks still use the filter.
    Remaining {
        /// The filter the callback was registered under.
        filter: String,
    },
    /// The filter has no callbacks left; the transport must UNSUBSCRIBE.
    LastSubscriber {
        /// The filter the callback was registered under.
        filter: String,
    },
}

/// Routes MQTT messages to subscription callbacks.
///
/// Callbacks are invoked after the table lock is released, so a callback may
/// itself register or remove subscriptions.
pub struct TopicRouter {
    ids: SubscriptionIdGenerator,
    table: RwLock<RouterTable>,
}

impl TopicRouter {
    /// Creates a new empty topic router.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ids: SubscriptionIdGenerator::new(),
            table: RwLock::new(RouterTable::default()),
        }
    }

    /// Registers a callback for a filter.
    ///
    /// A broker SUBSCRIBE is requested for the first callback on a filter,
    /// and again whenever a callback asks for a higher QoS than already
    /// requested.
    pub fn add(
        &self,
        filter: &str,
        callback: MessageCallback,
        qos: QosLevel,
        encoding: Encoding,
    ) -> Registration {
        let id = self.ids.next_id();
        let mut table = self.table.write();

        let entry = table
            .filters
            .entry(filter.to_string())
            .or_insert_with(|| FilterEntry {
                subscribers: Vec::new(),
                requested_qos: qos,
            });

        let broker_subscribe = if entry.subscribers.is_empty() || qos > entry.requested_qos {
            entry.requested_qos = entry.requested_qos.max(qos);
            Some(entry.requested_qos)
        } else {
            None
        };

        entry.subscribers.push(Subscriber {
            id,
            qos,
            encoding,
            callback,
        });
        table.index.insert(id, filter.to_string());

        tracing::debug!(%id, filter = %filter, %qos, "Registered subscription callback");

        Registration {
            id,
            broker_subscribe,
        }
    }

    /// Removes a callback by its subscription ID.
    ///
    /// The filter's requested QoS drops back to the highest QoS of the
    /// remaining callbacks, so a later request for a higher QoS asks the
    /// broker again.
    pub fn remove(&self, id: SubscriptionId) -> Removal {
        let mut table = self.table.write();

        let Some(filter) = table.index.remove(&id) else {
            return Removal::NotFound;
        };

        let now_empty = match table.filters.get_mut(&filter) {
            Some(entry) => {
                entry.subscribers.retain(|sub| sub.id != id);
                // Undo an upgrade only this subscriber asked for.
                if let Some(max_qos) = entry.subscribers.iter().map(|sub| sub.qos).max() {
                    entry.requested_qos = max_qos;
                }
                entry.subscribers.is_empty()
            }
            None => true,
        };

        tracing::debug!(%id, filter = %filter, "Removed subscription callback");

        if now_empty {
            table.filters.remove(&filter);
            Removal::LastSubscriber { filter }
        } else {
            Removal::Remaining { filter }
        }
    }

    /// Routes a published message to every matching callback.
    ///
    /// The payload is decoded once per matching filter and encoding; every
    /// callback in that group receives the same message. A payload that is
    /// not valid UTF-8 is skipped for text subscribers only.
    ///
    /// Returns the number of callbacks invoked.
    pub fn route(&self, topic: &str, payload: &[u8], qos: QosLevel, retain: bool) -> usize {
        let groups = self.matching_groups(topic);

        if groups.is_empty() {
            tracing::trace!(topic = %topic, "No subscription matches topic");
            return 0;
        }

        let mut delivered = 0;
        for group in groups {
            let payload = match group.encoding {
                Encoding::Raw => Payload::Bytes(payload.to_vec()),
                Encoding::Utf8 => match std::str::from_utf8(payload) {
                    Ok(text) => Payload::Text(text.to_string()),
                    Err(e) => {
                        tracing::warn!(
                            topic = %topic,
                            filter = %group.filter,
                            error = %e,
                            "Can't decode payload with encoding utf-8"
                        );
                        continue;
                    }
                },
            };

            let message = Arc::new(ReceiveMessage::new(
                topic,
                payload,
                qos,
                retain,
                group.filter,
            ));
            for callback in &group.callbacks {
                callback(Arc::clone(&message));
                delivered += 1;
            }
        }

        delivered
    }

    /// Collects callbacks for a topic, grouped by filter and encoding.
    fn matching_groups(&self, topic: &str) -> Vec<DeliveryGroup> {
        let table = self.table.read();
        let mut groups: Vec<DeliveryGroup> = Vec::new();

        for (filter, entry) in &table.filters {
            if !topic_matches(filter, topic) {
                continue;
            }
            for sub in &entry.subscribers {
                let existing = groups
                    .iter_mut()
                    .find(|g| g.filter == *filter && g.encoding == sub.encoding);
                match existing {
                    Some(group) => group.callbacks.push(Arc::clone(&sub.callback)),
                    None => groups.push(DeliveryGroup {
                        filter: filter.clone(),
                        encoding: sub.encoding,
                        callbacks: vec![Arc::clone(&sub.callback)],
                    }),
                }
            }
        }

        groups
    }

    /// Returns every active filter with the QoS requested from the broker.
    #[must_use]
    pub fn active_filters(&self) -> Vec<(String, QosLevel)> {
        self.table
            .read()
            .filters
            .iter()
            .map(|(filter, entry)| (filter.clone(), entry.requested_qos))
            .collect()
    }

    /// Returns the number of distinct filters.
    #[must_use]
    pub fn filter_count(&self) -> usize {
        self.table.read().filters.len()
    }

    /// Returns the number of registered callbacks.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.table.read().index.len()
    }

    /// Removes every registered callback.
    pub fn clear(&self) {
        let mut table = self.table.write();
        table.filters.clear();
        table.index.clear();
    }
}

struct DeliveryGroup {
    filter: String,
    encoding: Encoding,
    callbacks: Vec<MessageCallback>,
}

impl Default for TopicRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TopicRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicRouter")
            .field("filter_count", &self.filter_count())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::message_callback;

    fn collecting() -> (MessageCallback, Arc<RwLock<Vec<Arc<ReceiveMessage>>>>) {
        let received = Arc::new(RwLock::new(Vec::new()));
        let received_clone = Arc::clone(&received);
        let callback = message_callback(move |msg| received_clone.write().push(msg));
        (callback, received)
    }

    #[test]
    fn first_subscriber_requests_broker_subscribe() {
        let router = TopicRouter::new();
        let (cb, _) = collecting();

        let reg = router.add("home/light", cb, QosLevel::AtMostOnce, Encoding::Utf8);
        assert_eq!(reg.broker_subscribe, Some(QosLevel::AtMostOnce));
        assert_eq!(router.filter_count(), 1);
        assert_eq!(router.subscriber_count(), 1);
    }

    #[test]
    fn second_subscriber_same_qos_reuses_broker_subscription() {
        let router = TopicRouter::new();
        let (cb, _) = collecting();

        router.add("home/light", Arc::clone(&cb), QosLevel::AtLeastOnce, Encoding::Utf8);
        let reg = router.add("home/light", cb, QosLevel::AtMostOnce, Encoding::Utf8);

        assert_eq!(reg.broker_subscribe, None);
        assert_eq!(router.filter_count(), 1);
        assert_eq!(router.subscriber_count(), 2);
    }

    #[test]
    fn higher_qos_requests_upgrade() {
        let router = TopicRouter::new();
        let (cb, _) = collecting();

        router.add("home/light", Arc::clone(&cb), QosLevel::AtMostOnce, Encoding::Utf8);
        let reg = router.add("home/light", cb, QosLevel::ExactlyOnce, Encoding::Utf8);

        assert_eq!(reg.broker_subscribe, Some(QosLevel::ExactlyOnce));
        assert_eq!(
            router.active_filters(),
            vec![("home/light".to_string(), QosLevel::ExactlyOnce)]
        );
    }

    #[test]
    fn remove_reports_last_subscriber() {
        let router = TopicRouter::new();
        let (cb, _) = collecting();

        let first = router.add("a", Arc::clone(&cb), QosLevel::AtMostOnce, Encoding::Utf8);
        let second = router.add("a", cb, QosLevel::AtMostOnce, Encoding::Utf8);

        assert_eq!(
            router.remove(first.id),
            Removal::Remaining {
                filter: "a".to_string()
            }
        );
        assert_eq!(
            router.remove(second.id),
            Removal::LastSubscriber {
                filter: "a".to_string()
            }
        );
        assert_eq!(router.remove(second.id), Removal::NotFound);
        assert_eq!(router.filter_count(), 0);
    }

    #[test]
    fn removed_upgrade_is_requested_again() {
        let router = TopicRouter::new();
        let (cb, _) = collecting();

        router.add("t", Arc::clone(&cb), QosLevel::AtMostOnce, Encoding::Utf8);
        let upgrade = router.add("t", Arc::clone(&cb), QosLevel::AtLeastOnce, Encoding::Utf8);
        assert_eq!(upgrade.broker_subscribe, Some(QosLevel::AtLeastOnce));

        // The broker rejected the upgrade; the transport rolls it back.
        assert!(matches!(router.remove(upgrade.id), Removal::Remaining { .. }));
        assert_eq!(
            router.active_filters(),
            vec![("t".to_string(), QosLevel::AtMostOnce)]
        );

        let retry = router.add("t", cb, QosLevel::AtLeastOnce, Encoding::Utf8);
        assert_eq!(retry.broker_subscribe, Some(QosLevel::AtLeastOnce));
        assert_eq!(
            router.active_filters(),
            vec![("t".to_string(), QosLevel::AtLeastOnce)]
        );
    }

    #[test]
    fn route_delivers_to_wildcard_and_exact() {
        let router = TopicRouter::new();
        let (exact, exact_rx) = collecting();
        let (wild, wild_rx) = collecting();
        let (other, other_rx) = collecting();

        router.add("home/kitchen/light", exact, QosLevel::AtMostOnce, Encoding::Utf8);
        router.add("home/+/light", wild, QosLevel::AtMostOnce, Encoding::Utf8);
        router.add("garden/#", other, QosLevel::AtMostOnce, Encoding::Utf8);

        let delivered = router.route("home/kitchen/light", b"ON", QosLevel::AtLeastOnce, true);
        assert_eq!(delivered, 2);

        let exact_msgs = exact_rx.read();
        assert_eq!(exact_msgs.len(), 1);
        assert_eq!(exact_msgs[0].payload, Payload::Text("ON".to_string()));
        assert_eq!(exact_msgs[0].subscribed_topic, "home/kitchen/light");
        assert_eq!(exact_msgs[0].qos, QosLevel::AtLeastOnce);
        assert!(exact_msgs[0].retain);

        let wild_msgs = wild_rx.read();
        assert_eq!(wild_msgs[0].subscribed_topic, "home/+/light");
        assert_eq!(wild_msgs[0].topic, "home/kitchen/light");

        assert!(other_rx.read().is_empty());
    }

    #[test]
    fn same_filter_and_encoding_share_message() {
        let router = TopicRouter::new();
        let (first, first_rx) = collecting();
        let (second, second_rx) = collecting();

        router.add("t", first, QosLevel::AtMostOnce, Encoding::Utf8);
        router.add("t", second, QosLevel::AtMostOnce, Encoding::Utf8);
        router.route("t", b"x", QosLevel::AtMostOnce, false);

        assert!(Arc::ptr_eq(&first_rx.read()[0], &second_rx.read()[0]));
    }

    #[test]
    fn raw_subscribers_get_bytes() {
        let router = TopicRouter::new();
        let (text, text_rx) = collecting();
        let (raw, raw_rx) = collecting();

        router.add("cam/image", text, QosLevel::AtMostOnce, Encoding::Utf8);
        router.add("cam/image", raw, QosLevel::AtMostOnce, Encoding::Raw);

        let delivered = router.route("cam/image", &[0xff, 0xd8], QosLevel::AtMostOnce, false);

        assert_eq!(delivered, 1);
        assert!(text_rx.read().is_empty());
        assert_eq!(raw_rx.read()[0].payload, Payload::Bytes(vec![0xff, 0xd8]));
    }

    #[test]
    fn callback_may_reenter_router() {
        let router = Arc::new(TopicRouter::new());
        let router_clone = Arc::clone(&router);
        let callback = message_callback(move |_msg| {
            router_clone.add("late", message_callback(|_| {}), QosLevel::AtMostOnce, Encoding::Utf8);
        });

        router.add("t", callback, QosLevel::AtMostOnce, Encoding::Utf8);
        router.route("t", b"x", QosLevel::AtMostOnce, false);

        assert_eq!(router.filter_count(), 2);
    }

    #[test]
    fn clear_removes_everything() {
        let router = TopicRouter::new();
        let (cb, _) = collecting();
        router.add("a", cb, QosLevel::AtMostOnce, Encoding::Utf8);

        router.clear();
        assert_eq!(router.filter_count(), 0);
        assert_eq!(router.subscriber_count(), 0);
        assert_eq!(router.route("a", b"x", QosLevel::AtMostOnce, false), 0);
    }

    #[test]
    fn router_debug() {
        let router = TopicRouter::new();
        let debug = format!("{router:?}");
        assert!(debug.contains("TopicRouter"));
        assert!(debug.contains("filter_count"));
    }
}
