// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Diagnostics history of MQTT traffic per entity.
//!
//! The [`DebugInfoRegistry`] keeps, per entity and subscribed topic, a
//! refcount of live subscriptions and a bounded FIFO of the most recent
//! messages. It also remembers the discovery payload an entity was created
//! from. Snapshots ([`EntityDebugInfo`]) are serializable for diagnostics
//! surfaces.
//!
//! Recording never affects delivery; every operation is infallible.

mod registry;
mod snapshot;

pub use registry::{DebugInfoRegistry, STORED_MESSAGES};
pub use snapshot::{DiscoveryData, EntityDebugInfo, MessageDebugInfo, SubscriptionDebugInfo};
