// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::{Error, ProtocolError};
use crate::protocol::{Transport, TopicRouter, validate_subscribe_topic};
use crate::subscription::{MessageCallback, SubscriptionId};
use crate::types::{Encoding, QosLevel};

/// A transport call observed by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    /// A successful subscribe.
    Subscribe {
        /// Subscribed topic filter.
        topic: String,
        /// Requested QoS.
        qos: QosLevel,
        /// Requested payload encoding.
        encoding: Encoding,
        /// Handle returned to the caller.
        id: SubscriptionId,
    },
    /// An unsubscribe, including ones for unknown handles.
    Unsubscribe {
        /// Handle passed by the caller.
        id: SubscriptionId,
    },
}

/// Transport that records every call and delivers locally published
/// messages.
///
/// Subscriptions go through a [`TopicRouter`], so wildcard matching and
/// payload decoding behave as on a broker connection. Failures can be
/// injected one call at a time.
///
/// # Examples
///
/// ```
/// use opp_mqtt::protocol::Transport;
/// use opp_mqtt::subscription::message_callback;
/// use opp_mqtt::testing::RecordingTransport;
/// use opp_mqtt::types::{Encoding, QosLevel};
///
/// # async fn example() -> opp_mqtt::Result<()> {
/// let transport = RecordingTransport::new();
/// let id = transport
///     .subscribe("home/+/temp", message_callback(|_| {}), QosLevel::AtMostOnce, Encoding::Utf8)
///     .await?;
///
/// assert_eq!(transport.publish("home/attic/temp", "18.5"), 1);
/// transport.unsubscribe(id).await?;
/// assert_eq!(transport.calls().len(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct RecordingTransport {
    router: TopicRouter,
    calls: Mutex<Vec<TransportCall>>,
    fail_subscribe: AtomicBool,
    fail_unsubscribe: AtomicBool,
}

impl RecordingTransport {
    /// Creates a transport with no subscriptions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `subscribe` call fail.
    pub fn fail_next_subscribe(&self) {
        self.fail_subscribe.store(true, Ordering::SeqCst);
    }

    /// Makes the next `unsubscribe` call fail.
    pub fn fail_next_unsubscribe(&self) {
        self.fail_unsubscribe.store(true, Ordering::SeqCst);
    }

    /// Returns every recorded call in order.
    #[must_use]
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().clone()
    }

    /// Forgets the recorded calls; live subscriptions stay.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Returns the number of recorded subscribe calls.
    #[must_use]
    pub fn subscribe_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, TransportCall::Subscribe { .. }))
            .count()
    }

    /// Returns the number of recorded unsubscribe calls.
    #[must_use]
    pub fn unsubscribe_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, TransportCall::Unsubscribe { .. }))
            .count()
    }

    /// Returns the number of live subscriptions.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.router.subscriber_count()
    }

    /// Delivers a QoS 0, non-retained message to matching subscribers.
    ///
    /// Returns the number of callbacks invoked.
    pub fn publish(&self, topic: &str, payload: impl AsRef<[u8]>) -> usize {
        self.publish_with(topic, payload, QosLevel::AtMostOnce, false)
    }

    /// Delivers a message with explicit QoS and retain flag.
    pub fn publish_with(
        &self,
        topic: &str,
        payload: impl AsRef<[u8]>,
        qos: QosLevel,
        retain: bool,
    ) -> usize {
        self.router.route(topic, payload.as_ref(), qos, retain)
    }
}

impl Transport for RecordingTransport {
    async fn subscribe(
        &self,
        topic: &str,
        callback: MessageCallback,
        qos: QosLevel,
        encoding: Encoding,
    ) -> Result<SubscriptionId, Error> {
        tokio::task::yield_now().await;

        if self.fail_subscribe.swap(false, Ordering::SeqCst) {
            return Err(ProtocolError::ConnectionFailed(format!("subscribe to {topic} rejected")).into());
        }
        validate_subscribe_topic(topic)?;

        let registration = self.router.add(topic, callback, qos, encoding);
        self.calls.lock().push(TransportCall::Subscribe {
            topic: topic.to_string(),
            qos,
            encoding,
            id: registration.id,
        });
        Ok(registration.id)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), Error> {
        tokio::task::yield_now().await;

        if self.fail_unsubscribe.swap(false, Ordering::SeqCst) {
            return Err(ProtocolError::ConnectionFailed(format!("unsubscribe of {id} rejected")).into());
        }

        self.router.remove(id);
        self.calls.lock().push(TransportCall::Unsubscribe { id });
        Ok(())
    }
}
