// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Serializable views of recorded debug information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::ReceiveMessage;
use crate::types::{EntityId, QosLevel};

/// Discovery payload that created or last updated an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryData {
    /// Topic the discovery message arrived on.
    pub topic: String,
    /// Discovery payload as parsed JSON.
    pub payload: serde_json::Value,
}

/// Debug information for one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDebugInfo {
    /// The entity the information belongs to.
    pub entity_id: EntityId,
    /// Subscribed topics, sorted by topic.
    pub subscriptions: Vec<SubscriptionDebugInfo>,
    /// Discovery data, if the entity was discovered.
    pub discovery_data: Option<DiscoveryData>,
}

/// Recent traffic on one subscribed topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionDebugInfo {
    /// The subscribed topic filter.
    pub topic: String,
    /// Number of live subscriptions the entity holds on the topic.
    pub count: usize,
    /// Recent messages, oldest first.
    pub messages: Vec<MessageDebugInfo>,
}

/// One recorded message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageDebugInfo {
    /// Payload as text; raw payloads are converted lossily.
    pub payload: String,
    /// Delivery QoS.
    pub qos: QosLevel,
    /// Retained flag.
    pub retain: bool,
    /// Time the message was received.
    pub time: DateTime<Utc>,
    /// Concrete topic the message was published to.
    pub topic: String,
}

impl From<&ReceiveMessage> for MessageDebugInfo {
    fn from(msg: &ReceiveMessage) -> Self {
        Self {
            payload: msg.payload.to_text_lossy().into_owned(),
            qos: msg.qos,
            retain: msg.retain,
            time: msg.timestamp,
            topic: msg.topic.clone(),
        }
    }
}
