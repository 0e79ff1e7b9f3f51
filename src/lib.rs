// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `opp_mqtt` - MQTT topic subscriptions for Open Peer Power entities.
//!
//! Entities built from MQTT configuration (lights, sensors, switches) listen
//! on a handful of topics, one per role: state, availability, attributes. When
//! an entity is created, reconfigured or removed, its topic set has to be
//! brought in line with what is subscribed on the broker without dropping
//! subscriptions that did not change. This library does that, and keeps a
//! short per-entity history of received messages for diagnostics.
//!
//! # Features
//!
//! - **Reconciliation**: diff a desired topic set against live subscriptions,
//!   touching only what changed
//! - **Debug history**: bounded per-topic message log and discovery payload
//!   per entity
//! - **Broker connection**: `rumqttc`-based client with wildcard routing and
//!   resubscription after reconnect (feature `mqtt`, on by default)
//! - **Test transport**: in-memory [`testing::RecordingTransport`]
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use opp_mqtt::debug_info::DebugInfoRegistry;
//! use opp_mqtt::subscription::{message_callback, DesiredTopics, EntitySubscriptions, TopicSpec};
//! use opp_mqtt::types::EntityId;
//! use opp_mqtt::MqttBroker;
//!
//! #[tokio::main]
//! async fn main() -> opp_mqtt::Result<()> {
//!     let broker = Arc::new(MqttBroker::builder().host("192.168.1.50").build().await?);
//!     let debug_info = Arc::new(DebugInfoRegistry::new());
//!
//!     let light = EntitySubscriptions::new(
//!         EntityId::new("light.living_room")?,
//!         Arc::clone(&broker),
//!         Arc::clone(&debug_info),
//!     );
//!
//!     light
//!         .update(DesiredTopics::new().with(
//!             "state_topic",
//!             TopicSpec::new("living_room/light/state", message_callback(|msg| {
//!                 println!("state: {:?}", msg.payload);
//!             })),
//!         ))
//!         .await?;
//!
//!     // Later, when the entity goes away
//!     light.remove().await?;
//!     broker.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod debug_info;
pub mod error;
pub mod protocol;
pub mod subscription;
pub mod testing;
pub mod types;

pub use debug_info::{DebugInfoRegistry, EntityDebugInfo};
pub use error::{Error, ParseError, ProtocolError, ReconcileError, Result, ValueError};
#[cfg(feature = "mqtt")]
pub use protocol::{MqttBroker, MqttBrokerBuilder, MqttBrokerConfig};
pub use protocol::{Payload, ReceiveMessage, TopicRouter, Transport};
pub use subscription::{
    DesiredTopics, EntitySubscriptions, MessageCallback, Reconciler, SubscriptionId,
    SubscriptionState, TopicSpec,
};
pub use types::{Encoding, EntityId, QosLevel};
