// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity subscription state and its reconciliation.
//!
//! An entity describes the topics it wants as [`DesiredTopics`]: one
//! [`TopicSpec`] per subscription key (`"state_topic"`,
//! `"availability_topic"`, ...). Reconciling that set against the previous
//! [`SubscriptionState`] subscribes, re-subscribes and unsubscribes only
//! what changed.
//!
//! # Overview
//!
//! - [`Reconciler`] - One reconciliation pass over borrowed collaborators
//! - [`EntitySubscriptions`] - Owns an entity's state and serializes passes
//! - [`SubscriptionId`] - Transport handle used to unsubscribe
//! - [`MessageCallback`] - Function receiving delivered messages
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//!
//! use opp_mqtt::debug_info::DebugInfoRegistry;
//! use opp_mqtt::subscription::{message_callback, DesiredTopics, EntitySubscriptions, TopicSpec};
//! use opp_mqtt::testing::RecordingTransport;
//! use opp_mqtt::types::{EntityId, QosLevel};
//!
//! # async fn example() -> opp_mqtt::Result<()> {
//! let transport = Arc::new(RecordingTransport::new());
//! let sensor = EntitySubscriptions::new(
//!     EntityId::new("sensor.outdoor")?,
//!     transport,
//!     Arc::new(DebugInfoRegistry::new()),
//! );
//!
//! let desired = DesiredTopics::new()
//!     .with("state_topic", TopicSpec::new("outdoor/temp", message_callback(|_| {})))
//!     .with(
//!         "availability_topic",
//!         TopicSpec::new("outdoor/status", message_callback(|_| {})).with_qos(QosLevel::AtLeastOnce),
//!     );
//!
//! sensor.update(desired.clone()).await?;
//!
//! // Nothing changed, nothing is sent to the transport.
//! sensor.update(desired).await?;
//! # Ok(())
//! # }
//! ```

mod callback;
mod entity;
mod reconcile;
mod state;

pub use callback::{MessageCallback, SubscriptionId, SubscriptionIdGenerator, message_callback};
pub use entity::EntitySubscriptions;
pub use reconcile::Reconciler;
pub use state::{DesiredTopics, EntitySubscription, SubscriptionState, TopicSpec};
