// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback and handle types shared by transports and the reconciler.
//!
//! - [`SubscriptionId`] - Handle returned by a transport, used to unsubscribe
//! - [`MessageCallback`] - Function invoked for every delivered message

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::protocol::ReceiveMessage;

/// Handle for one live transport subscription.
///
/// Returned by [`Transport::subscribe`](crate::protocol::Transport::subscribe)
/// and passed back to
/// [`Transport::unsubscribe`](crate::protocol::Transport::unsubscribe).
/// IDs are unique within the transport that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Creates a subscription ID with the given value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

/// Generator of unique subscription IDs for transport implementations.
#[derive(Debug)]
pub struct SubscriptionIdGenerator {
    next_id: AtomicU64,
}

impl SubscriptionIdGenerator {
    /// Creates a generator starting at 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the next unused ID.
    pub fn next_id(&self) -> SubscriptionId {
        SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriptionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Callback invoked with every message delivered on a subscription.
///
/// Messages are shared: every subscriber of the same filter and encoding
/// receives the same `Arc`.
pub type MessageCallback = Arc<dyn Fn(Arc<ReceiveMessage>) + Send + Sync>;

/// Wraps a closure into a [`MessageCallback`].
///
/// # Examples
///
/// ```
/// use opp_mqtt::subscription::message_callback;
///
/// let callback = message_callback(|msg| {
///     println!("{} -> {:?}", msg.topic, msg.payload);
/// });
/// ```
pub fn message_callback<F>(callback: F) -> MessageCallback
where
    F: Fn(Arc<ReceiveMessage>) + Send + Sync + 'static,
{
    Arc::new(callback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Payload;
    use crate::types::QosLevel;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn subscription_id_display() {
        let id = SubscriptionId::new(42);
        assert_eq!(id.to_string(), "Sub(42)");
    }

    #[test]
    fn subscription_id_hash() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(SubscriptionId::new(1));
        set.insert(SubscriptionId::new(2));
        set.insert(SubscriptionId::new(1));

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn generator_issues_unique_ids() {
        let generator = SubscriptionIdGenerator::new();
        let first = generator.next_id();
        let second = generator.next_id();

        assert_eq!(first.value(), 1);
        assert_ne!(first, second);
    }

    #[test]
    fn message_callback_invokes_closure() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);
        let callback = message_callback(move |_msg| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        let msg = Arc::new(ReceiveMessage::new(
            "t",
            Payload::Text("x".to_string()),
            QosLevel::AtMostOnce,
            false,
            "t",
        ));
        callback(Arc::clone(&msg));
        callback(msg);

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
