// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-entity debug history of received MQTT messages.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::ParseError;
use crate::protocol::ReceiveMessage;
use crate::types::EntityId;

use super::snapshot::{DiscoveryData, EntityDebugInfo, MessageDebugInfo, SubscriptionDebugInfo};

/// Default number of messages kept per entity and topic.
pub const STORED_MESSAGES: usize = 10;

struct TopicRecord {
    /// Live subscriptions the entity holds on this topic.
    count: usize,
    messages: VecDeque<Arc<ReceiveMessage>>,
}

#[derive(Default)]
struct EntityRecord {
    subscriptions: HashMap<String, TopicRecord>,
    discovery_data: Option<DiscoveryData>,
}

/// Registry of recent MQTT traffic per entity, for diagnostics.
///
/// The registry is owned by whatever composes entities and handed to every
/// [`Reconciler`](crate::subscription::Reconciler) explicitly. Nothing here
/// can fail: removing an entity or topic that was never recorded is a no-op,
/// because teardown may race with entity removal.
///
/// # Examples
///
/// ```
/// use opp_mqtt::debug_info::DebugInfoRegistry;
/// use opp_mqtt::types::EntityId;
///
/// let registry = DebugInfoRegistry::new();
/// let entity = EntityId::new("light.kitchen").unwrap();
///
/// registry.add_subscription(&entity, "home/kitchen/light");
/// assert_eq!(registry.subscription_count(&entity, "home/kitchen/light"), 1);
///
/// registry.remove_subscription(&entity, "home/kitchen/light");
/// assert_eq!(registry.subscription_count(&entity, "home/kitchen/light"), 0);
/// ```
pub struct DebugInfoRegistry {
    capacity: usize,
    entities: RwLock<HashMap<EntityId, EntityRecord>>,
}

impl DebugInfoRegistry {
    /// Creates a registry keeping [`STORED_MESSAGES`] messages per topic.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(STORED_MESSAGES)
    }

    /// Creates a registry keeping `capacity` messages per topic (at least 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entities: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the number of messages kept per topic.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records one more live subscription of `entity_id` on `topic`.
    pub fn add_subscription(&self, entity_id: &EntityId, topic: &str) {
        let mut entities = self.entities.write();
        let record = entities.entry(entity_id.clone()).or_default();
        let topic_record = record
            .subscriptions
            .entry(topic.to_string())
            .or_insert_with(|| TopicRecord {
                count: 0,
                messages: VecDeque::with_capacity(self.capacity),
            });
        topic_record.count += 1;
    }

    /// Records that one subscription of `entity_id` on `topic` went away.
    ///
    /// When the last one goes, the topic's message history is dropped.
    pub fn remove_subscription(&self, entity_id: &EntityId, topic: &str) {
        let mut entities = self.entities.write();
        let Some(record) = entities.get_mut(entity_id) else {
            return;
        };
        let Some(topic_record) = record.subscriptions.get_mut(topic) else {
            return;
        };

        topic_record.count = topic_record.count.saturating_sub(1);
        if topic_record.count == 0 {
            record.subscriptions.remove(topic);
        }
    }

    /// Appends a message to the history of the topic it was subscribed under.
    ///
    /// The same message object delivered twice in a row is kept once.
    pub fn record_message(&self, entity_id: &EntityId, message: &Arc<ReceiveMessage>) {
        let mut entities = self.entities.write();
        let Some(topic_record) = entities
            .get_mut(entity_id)
            .and_then(|record| record.subscriptions.get_mut(&message.subscribed_topic))
        else {
            return;
        };

        if topic_record
            .messages
            .back()
            .is_some_and(|last| Arc::ptr_eq(last, message))
        {
            return;
        }

        if topic_record.messages.len() >= self.capacity {
            topic_record.messages.pop_front();
        }
        topic_record.messages.push_back(Arc::clone(message));
    }

    /// Stores the discovery message that created `entity_id`.
    pub fn add_discovery_data(
        &self,
        entity_id: &EntityId,
        topic: impl Into<String>,
        payload: serde_json::Value,
    ) {
        let mut entities = self.entities.write();
        entities.entry(entity_id.clone()).or_default().discovery_data = Some(DiscoveryData {
            topic: topic.into(),
            payload,
        });
    }

    /// Parses a raw discovery payload and stores it for `entity_id`.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Json` if the payload is not valid JSON.
    pub fn add_discovery_json(
        &self,
        entity_id: &EntityId,
        topic: impl Into<String>,
        payload: &str,
    ) -> Result<(), ParseError> {
        let payload = serde_json::from_str(payload)?;
        self.add_discovery_data(entity_id, topic, payload);
        Ok(())
    }

    /// Replaces the discovery payload after a discovery update.
    ///
    /// Entities that were not discovered are left untouched.
    pub fn update_discovery_data(&self, entity_id: &EntityId, payload: serde_json::Value) {
        let mut entities = self.entities.write();
        if let Some(data) = entities
            .get_mut(entity_id)
            .and_then(|record| record.discovery_data.as_mut())
        {
            data.payload = payload;
        }
    }

    /// Drops everything recorded for `entity_id`.
    ///
    /// Returns `true` if the entity had a record.
    pub fn remove_entity(&self, entity_id: &EntityId) -> bool {
        let removed = self.entities.write().remove(entity_id).is_some();
        if removed {
            tracing::debug!(entity = %entity_id, "Removed entity debug info");
        }
        removed
    }

    /// Returns a snapshot of everything recorded for `entity_id`.
    #[must_use]
    pub fn entity_info(&self, entity_id: &EntityId) -> Option<EntityDebugInfo> {
        let entities = self.entities.read();
        let record = entities.get(entity_id)?;

        let mut subscriptions: Vec<SubscriptionDebugInfo> = record
            .subscriptions
            .iter()
            .map(|(topic, topic_record)| SubscriptionDebugInfo {
                topic: topic.clone(),
                count: topic_record.count,
                messages: topic_record
                    .messages
                    .iter()
                    .map(|msg| MessageDebugInfo::from(msg.as_ref()))
                    .collect(),
            })
            .collect();
        subscriptions.sort_by(|a, b| a.topic.cmp(&b.topic));

        Some(EntityDebugInfo {
            entity_id: entity_id.clone(),
            subscriptions,
            discovery_data: record.discovery_data.clone(),
        })
    }

    /// Returns how many live subscriptions `entity_id` holds on `topic`.
    #[must_use]
    pub fn subscription_count(&self, entity_id: &EntityId, topic: &str) -> usize {
        self.entities
            .read()
            .get(entity_id)
            .and_then(|record| record.subscriptions.get(topic))
            .map_or(0, |topic_record| topic_record.count)
    }

    /// Returns the number of entities with a record.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.read().len()
    }

    /// Drops every record.
    pub fn dispose(&self) {
        let mut entities = self.entities.write();
        tracing::debug!(entities = entities.len(), "Disposing debug info registry");
        entities.clear();
    }
}

impl Default for DebugInfoRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DebugInfoRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugInfoRegistry")
            .field("capacity", &self.capacity)
            .field("entity_count", &self.entity_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Payload;
    use crate::types::QosLevel;

    fn entity(id: &str) -> EntityId {
        EntityId::new(id).unwrap()
    }

    fn message(subscribed_topic: &str, payload: &str) -> Arc<ReceiveMessage> {
        Arc::new(ReceiveMessage::new(
            subscribed_topic,
            Payload::Text(payload.to_string()),
            QosLevel::AtMostOnce,
            false,
            subscribed_topic,
        ))
    }

    #[test]
    fn add_subscription_creates_records_lazily() {
        let registry = DebugInfoRegistry::new();
        let light = entity("light.hall");
        assert_eq!(registry.entity_count(), 0);

        registry.add_subscription(&light, "hall/state");
        registry.add_subscription(&light, "hall/state");

        assert_eq!(registry.entity_count(), 1);
        assert_eq!(registry.subscription_count(&light, "hall/state"), 2);
    }

    #[test]
    fn remove_subscription_drops_history_at_zero() {
        let registry = DebugInfoRegistry::new();
        let light = entity("light.hall");

        registry.add_subscription(&light, "hall/state");
        registry.add_subscription(&light, "hall/state");
        registry.record_message(&light, &message("hall/state", "ON"));

        registry.remove_subscription(&light, "hall/state");
        let info = registry.entity_info(&light).unwrap();
        assert_eq!(info.subscriptions[0].messages.len(), 1);

        registry.remove_subscription(&light, "hall/state");
        registry.add_subscription(&light, "hall/state");
        let info = registry.entity_info(&light).unwrap();
        assert!(info.subscriptions[0].messages.is_empty());
    }

    #[test]
    fn unknown_removals_are_noops() {
        let registry = DebugInfoRegistry::new();
        let light = entity("light.hall");

        registry.remove_subscription(&light, "nowhere");
        registry.add_subscription(&light, "a");
        registry.remove_subscription(&light, "b");

        assert_eq!(registry.subscription_count(&light, "a"), 1);
        assert!(!registry.remove_entity(&entity("light.ghost")));
    }

    #[test]
    fn record_message_without_subscription_is_ignored() {
        let registry = DebugInfoRegistry::new();
        let light = entity("light.hall");

        registry.record_message(&light, &message("hall/state", "ON"));
        assert!(registry.entity_info(&light).is_none());
    }

    #[test]
    fn history_is_bounded() {
        let registry = DebugInfoRegistry::with_capacity(3);
        let sensor = entity("sensor.temp");
        registry.add_subscription(&sensor, "temp");

        for value in 0..5 {
            registry.record_message(&sensor, &message("temp", &value.to_string()));
        }

        let info = registry.entity_info(&sensor).unwrap();
        let payloads: Vec<&str> = info.subscriptions[0]
            .messages
            .iter()
            .map(|m| m.payload.as_str())
            .collect();
        assert_eq!(payloads, vec!["2", "3", "4"]);
    }

    #[test]
    fn same_message_object_recorded_once() {
        let registry = DebugInfoRegistry::new();
        let sensor = entity("sensor.temp");
        registry.add_subscription(&sensor, "temp");

        let msg = message("temp", "21.5");
        registry.record_message(&sensor, &msg);
        registry.record_message(&sensor, &msg);
        registry.record_message(&sensor, &message("temp", "21.5"));

        let info = registry.entity_info(&sensor).unwrap();
        assert_eq!(info.subscriptions[0].messages.len(), 2);
    }

    #[test]
    fn entities_are_isolated() {
        let registry = DebugInfoRegistry::new();
        let first = entity("light.a");
        let second = entity("light.b");
        registry.add_subscription(&first, "shared");
        registry.add_subscription(&second, "shared");

        registry.record_message(&first, &message("shared", "x"));

        assert_eq!(
            registry.entity_info(&first).unwrap().subscriptions[0].messages.len(),
            1
        );
        assert!(
            registry.entity_info(&second).unwrap().subscriptions[0]
                .messages
                .is_empty()
        );
    }

    #[test]
    fn discovery_data_lifecycle() {
        let registry = DebugInfoRegistry::new();
        let light = entity("light.hall");

        registry
            .add_discovery_json(&light, "homeassistant/light/hall/config", r#"{"name":"Hall"}"#)
            .unwrap();
        registry.update_discovery_data(&light, serde_json::json!({"name": "Hallway"}));

        let data = registry.entity_info(&light).unwrap().discovery_data.unwrap();
        assert_eq!(data.topic, "homeassistant/light/hall/config");
        assert_eq!(data.payload["name"], "Hallway");
    }

    #[test]
    fn invalid_discovery_json_is_rejected() {
        let registry = DebugInfoRegistry::new();
        let light = entity("light.hall");

        let result = registry.add_discovery_json(&light, "t", "{not json");
        assert!(matches!(result, Err(ParseError::Json(_))));
        assert_eq!(registry.entity_count(), 0);
    }

    #[test]
    fn update_without_discovery_is_noop() {
        let registry = DebugInfoRegistry::new();
        let light = entity("light.hall");
        registry.add_subscription(&light, "a");

        registry.update_discovery_data(&light, serde_json::json!({}));
        assert!(registry.entity_info(&light).unwrap().discovery_data.is_none());
    }

    #[test]
    fn entity_info_sorted_by_topic() {
        let registry = DebugInfoRegistry::new();
        let light = entity("light.hall");
        registry.add_subscription(&light, "z/topic");
        registry.add_subscription(&light, "a/topic");

        let topics: Vec<String> = registry
            .entity_info(&light)
            .unwrap()
            .subscriptions
            .into_iter()
            .map(|s| s.topic)
            .collect();
        assert_eq!(topics, vec!["a/topic", "z/topic"]);
    }

    #[test]
    fn remove_entity_and_dispose() {
        let registry = DebugInfoRegistry::new();
        registry.add_subscription(&entity("light.a"), "a");
        registry.add_subscription(&entity("light.b"), "b");

        assert!(registry.remove_entity(&entity("light.a")));
        assert_eq!(registry.entity_count(), 1);

        registry.dispose();
        assert_eq!(registry.entity_count(), 0);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let registry = DebugInfoRegistry::with_capacity(0);
        assert_eq!(registry.capacity(), 1);
    }
}
