// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transport layer for topic subscriptions.
//!
//! The reconciler never talks to a broker directly. It goes through the
//! [`Transport`] trait, which any pub/sub client can implement.
//!
//! # Implementations
//!
//! - [`MqttBroker`]: a real MQTT connection (feature `mqtt`)
//! - [`RecordingTransport`](crate::testing::RecordingTransport): in-memory
//!   transport for tests
//!
//! Both build on [`TopicRouter`], which keeps the subscriber table and
//! dispatches incoming messages.

mod message;
#[cfg(feature = "mqtt")]
mod mqtt_broker;
mod topic;
mod topic_router;

use std::future::Future;

pub use message::{Payload, ReceiveMessage};
#[cfg(feature = "mqtt")]
pub use mqtt_broker::{MqttBroker, MqttBrokerBuilder, MqttBrokerConfig};
pub use topic::{MAX_TOPIC_LEN, topic_matches, validate_subscribe_topic};
pub use topic_router::{Registration, Removal, TopicRouter};

use crate::error::Error;
use crate::subscription::{MessageCallback, SubscriptionId};
use crate::types::{Encoding, QosLevel};

/// A pub/sub client that subscriptions are created on.
///
/// Each call is a suspension point; other tasks may run between the calls a
/// reconciliation pass makes.
pub trait Transport: Send + Sync {
    /// Subscribes `callback` to `topic`.
    ///
    /// The callback receives every message published to a topic matched by
    /// the filter, decoded per `encoding`.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic is invalid or the broker request fails.
    fn subscribe(
        &self,
        topic: &str,
        callback: MessageCallback,
        qos: QosLevel,
        encoding: Encoding,
    ) -> impl Future<Output = Result<SubscriptionId, Error>> + Send;

    /// Removes a subscription created by [`subscribe`](Self::subscribe).
    ///
    /// Unsubscribing an unknown ID is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the broker request fails.
    fn unsubscribe(&self, id: SubscriptionId) -> impl Future<Output = Result<(), Error>> + Send;
}
