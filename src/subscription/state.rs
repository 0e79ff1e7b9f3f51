// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Desired and live subscription sets of one entity.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::{Encoding, QosLevel};

use super::callback::{MessageCallback, SubscriptionId};

/// Shared cell holding the callback a live subscription delivers to.
///
/// The transport holds a wrapper reading this cell, so the callback can be
/// swapped without resubscribing.
pub(crate) type CallbackSlot = Arc<RwLock<MessageCallback>>;

/// What an entity wants subscribed under one key.
///
/// # Examples
///
/// ```
/// use opp_mqtt::subscription::{message_callback, TopicSpec};
/// use opp_mqtt::types::{Encoding, QosLevel};
///
/// let spec = TopicSpec::new("home/light/state", message_callback(|_| {}))
///     .with_qos(QosLevel::AtLeastOnce)
///     .with_encoding(Encoding::Raw);
///
/// assert_eq!(spec.topic(), Some("home/light/state"));
/// assert_eq!(spec.qos(), QosLevel::AtLeastOnce);
/// ```
#[derive(Clone)]
pub struct TopicSpec {
    topic: Option<String>,
    callback: MessageCallback,
    qos: QosLevel,
    encoding: Encoding,
}

impl TopicSpec {
    /// Creates a spec for `topic` with QoS 0 and UTF-8 payloads.
    pub fn new(topic: impl Into<String>, callback: MessageCallback) -> Self {
        Self::from_optional(Some(topic), callback)
    }

    /// Creates a spec for a slot that should hold no subscription.
    #[must_use]
    pub fn disabled(callback: MessageCallback) -> Self {
        Self::from_optional(None::<String>, callback)
    }

    /// Creates a spec from an optional configured topic.
    pub fn from_optional(topic: Option<impl Into<String>>, callback: MessageCallback) -> Self {
        Self {
            topic: topic.map(Into::into),
            callback,
            qos: QosLevel::default(),
            encoding: Encoding::default(),
        }
    }

    /// Sets the QoS level.
    #[must_use]
    pub fn with_qos(mut self, qos: QosLevel) -> Self {
        self.qos = qos;
        self
    }

    /// Sets the payload encoding.
    #[must_use]
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Returns the topic, `None` for a disabled slot.
    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Returns the QoS level.
    #[must_use]
    pub fn qos(&self) -> QosLevel {
        self.qos
    }

    /// Returns the payload encoding.
    #[must_use]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }
}

impl fmt::Debug for TopicSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicSpec")
            .field("topic", &self.topic)
            .field("qos", &self.qos)
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}

/// Insertion-ordered set of [`TopicSpec`]s keyed by subscription key.
///
/// Keys are processed in insertion order. Inserting a key again replaces its
/// spec and keeps its position.
#[derive(Debug, Clone, Default)]
pub struct DesiredTopics {
    entries: Vec<(String, TopicSpec)>,
}

impl DesiredTopics {
    /// Creates an empty set; reconciling to it tears everything down.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the spec for `key`, returning the replaced one.
    pub fn insert(&mut self, key: impl Into<String>, spec: TopicSpec) -> Option<TopicSpec> {
        let key = key.into();
        if let Some((_, existing)) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(existing, spec));
        }
        self.entries.push((key, spec));
        None
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, spec: TopicSpec) -> Self {
        self.insert(key, spec);
        self
    }

    /// Returns the spec for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&TopicSpec> {
        self.entries
            .iter()
            .find_map(|(k, spec)| (k == key).then_some(spec))
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no key is desired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TopicSpec)> {
        self.entries.iter().map(|(k, spec)| (k.as_str(), spec))
    }
}

impl<K: Into<String>> FromIterator<(K, TopicSpec)> for DesiredTopics {
    fn from_iter<I: IntoIterator<Item = (K, TopicSpec)>>(iter: I) -> Self {
        let mut topics = Self::new();
        for (key, spec) in iter {
            topics.insert(key, spec);
        }
        topics
    }
}

impl IntoIterator for DesiredTopics {
    type Item = (String, TopicSpec);
    type IntoIter = std::vec::IntoIter<(String, TopicSpec)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// One slot of an entity's live subscription state.
#[derive(Clone)]
pub struct EntitySubscription {
    topic: Option<String>,
    callback: CallbackSlot,
    subscription_id: Option<SubscriptionId>,
    qos: QosLevel,
    encoding: Encoding,
}

impl EntitySubscription {
    pub(crate) fn from_spec(spec: TopicSpec) -> Self {
        Self {
            topic: spec.topic,
            callback: Arc::new(RwLock::new(spec.callback)),
            subscription_id: None,
            qos: spec.qos,
            encoding: spec.encoding,
        }
    }

    /// Returns the topic, `None` for a disabled slot.
    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Returns the QoS level.
    #[must_use]
    pub fn qos(&self) -> QosLevel {
        self.qos
    }

    /// Returns the payload encoding.
    #[must_use]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Returns the transport handle while subscribed.
    #[must_use]
    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        self.subscription_id
    }

    /// Returns `true` if a live transport subscription backs this slot.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscription_id.is_some()
    }

    /// Returns the callback messages are currently delivered to.
    #[must_use]
    pub fn callback(&self) -> MessageCallback {
        Arc::clone(&self.callback.read())
    }

    /// Returns `true` unless `previous` has the same topic, QoS and encoding.
    pub(crate) fn should_resubscribe(&self, previous: &Self) -> bool {
        self.topic != previous.topic
            || self.qos != previous.qos
            || self.encoding != previous.encoding
    }

    /// Takes over the live subscription of `previous`.
    ///
    /// The callback of `self` becomes the one the existing transport
    /// subscription delivers to.
    pub(crate) fn adopt(&mut self, previous: Self) {
        let callback = self.callback();
        *previous.callback.write() = callback;
        self.callback = previous.callback;
        self.subscription_id = previous.subscription_id;
    }

    pub(crate) fn callback_slot(&self) -> CallbackSlot {
        Arc::clone(&self.callback)
    }

    pub(crate) fn set_subscription_id(&mut self, id: SubscriptionId) {
        self.subscription_id = Some(id);
    }

    pub(crate) fn take_subscription_id(&mut self) -> Option<SubscriptionId> {
        self.subscription_id.take()
    }
}

impl PartialEq for EntitySubscription {
    fn eq(&self, other: &Self) -> bool {
        self.topic == other.topic
            && self.qos == other.qos
            && self.encoding == other.encoding
            && self.subscription_id == other.subscription_id
            && (Arc::ptr_eq(&self.callback, &other.callback)
                || Arc::ptr_eq(&self.callback(), &other.callback()))
    }
}

impl fmt::Debug for EntitySubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySubscription")
            .field("topic", &self.topic)
            .field("subscription_id", &self.subscription_id)
            .field("qos", &self.qos)
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}

/// Live subscriptions of one entity, keyed by subscription key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionState {
    entries: HashMap<String, EntitySubscription>,
}

impl SubscriptionState {
    /// Returns the entry for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&EntitySubscription> {
        self.entries.get(key)
    }

    /// Returns `true` if `key` has an entry.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the number of entries, subscribed or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of entries backed by a live transport subscription.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_subscribed()).count()
    }

    /// Iterates subscription keys in arbitrary order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterates entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &EntitySubscription)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    pub(crate) fn insert(&mut self, key: String, entry: EntitySubscription) {
        self.entries.insert(key, entry);
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<EntitySubscription> {
        self.entries.remove(key)
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = (String, EntitySubscription)> + '_ {
        self.entries.drain()
    }
}
