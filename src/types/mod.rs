// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared by the transport and the reconciler.
//!
//! Each type is validated at construction time.
//!
//! # Types
//!
//! - [`QosLevel`] - MQTT delivery guarantee (0-2)
//! - [`Encoding`] - Payload decoding requested by a subscriber
//! - [`EntityId`] - Identifier of the entity owning subscriptions

mod encoding;
mod entity_id;
mod qos;

pub use encoding::Encoding;
pub use entity_id::EntityId;
pub use qos::QosLevel;
