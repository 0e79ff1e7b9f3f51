// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Diffing a desired topic set against live subscriptions.

use std::sync::Arc;

use crate::debug_info::DebugInfoRegistry;
use crate::error::{Error, ReconcileError};
use crate::protocol::Transport;
use crate::types::EntityId;

use super::callback::{MessageCallback, message_callback};
use super::state::{CallbackSlot, DesiredTopics, EntitySubscription, SubscriptionState};

/// Brings one entity's transport subscriptions in line with a desired set.
///
/// A reconciler borrows its collaborators for the duration of a pass. Keys
/// whose topic, QoS and encoding are unchanged keep their live subscription;
/// everything else is torn down and, where a topic is given, subscribed anew.
/// Every subscription is registered in the debug registry under the entity,
/// and every delivered message is recorded there before the entity's
/// callback sees it.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use opp_mqtt::debug_info::DebugInfoRegistry;
/// use opp_mqtt::subscription::{message_callback, DesiredTopics, Reconciler, TopicSpec};
/// use opp_mqtt::testing::RecordingTransport;
/// use opp_mqtt::types::EntityId;
///
/// # async fn example() -> Result<(), opp_mqtt::ReconcileError> {
/// let transport = RecordingTransport::new();
/// let debug_info = Arc::new(DebugInfoRegistry::new());
/// let entity = EntityId::new("light.kitchen").unwrap();
///
/// let reconciler = Reconciler::new(&transport, &debug_info, &entity);
/// let desired = DesiredTopics::new()
///     .with("state_topic", TopicSpec::new("kitchen/light", message_callback(|_| {})));
///
/// let state = reconciler.reconcile(None, desired).await?;
/// assert_eq!(state.active_count(), 1);
///
/// let state = reconciler.unsubscribe_all(state).await?;
/// assert_eq!(state.active_count(), 0);
/// # Ok(())
/// # }
/// ```
pub struct Reconciler<'a, T: Transport> {
    transport: &'a T,
    debug_info: &'a Arc<DebugInfoRegistry>,
    entity_id: &'a EntityId,
}

impl<'a, T: Transport> Reconciler<'a, T> {
    /// Creates a reconciler for `entity_id`.
    #[must_use]
    pub fn new(
        transport: &'a T,
        debug_info: &'a Arc<DebugInfoRegistry>,
        entity_id: &'a EntityId,
    ) -> Self {
        Self {
            transport,
            debug_info,
            entity_id,
        }
    }

    /// Reconciles `previous` against `desired` and returns the new state.
    ///
    /// Keys are processed in `desired` insertion order. Previous keys absent
    /// from `desired` are torn down last.
    ///
    /// # Errors
    ///
    /// Stops at the first transport failure. The returned [`ReconcileError`]
    /// carries the state that is live at that point, which the caller should
    /// keep as `previous` for the next pass.
    pub async fn reconcile(
        &self,
        previous: Option<SubscriptionState>,
        desired: DesiredTopics,
    ) -> Result<SubscriptionState, ReconcileError> {
        let mut remaining = previous.unwrap_or_default();
        let mut state = SubscriptionState::default();

        for (key, spec) in desired {
            let mut candidate = EntitySubscription::from_spec(spec);

            if let Some(mut current) = remaining.remove(&key) {
                if !candidate.should_resubscribe(&current) {
                    candidate.adopt(current);
                    state.insert(key, candidate);
                    continue;
                }
                if let Err(source) = self.teardown(&key, &mut current).await {
                    state.insert(key, current);
                    return Err(Self::partial(source, state, remaining));
                }
            }

            if let Err(source) = self.subscribe(&key, &mut candidate).await {
                return Err(Self::partial(source, state, remaining));
            }
            state.insert(key, candidate);
        }

        let stale: Vec<String> = remaining.keys().map(str::to_string).collect();
        for key in stale {
            let Some(mut entry) = remaining.remove(&key) else {
                continue;
            };
            if let Err(source) = self.teardown(&key, &mut entry).await {
                state.insert(key, entry);
                return Err(Self::partial(source, state, remaining));
            }
        }

        Ok(state)
    }

    /// Tears down every subscription in `state`.
    ///
    /// # Errors
    ///
    /// Same as [`reconcile`](Self::reconcile).
    pub async fn unsubscribe_all(
        &self,
        state: SubscriptionState,
    ) -> Result<SubscriptionState, ReconcileError> {
        self.reconcile(Some(state), DesiredTopics::new()).await
    }

    async fn teardown(&self, key: &str, entry: &mut EntitySubscription) -> Result<(), Error> {
        let Some(id) = entry.subscription_id() else {
            return Ok(());
        };

        self.transport.unsubscribe(id).await?;
        entry.take_subscription_id();

        if let Some(topic) = entry.topic() {
            self.debug_info.remove_subscription(self.entity_id, topic);
            tracing::debug!(
                entity = %self.entity_id,
                key = %key,
                topic = %topic,
                id = %id,
                "Unsubscribed"
            );
        }
        Ok(())
    }

    async fn subscribe(&self, key: &str, entry: &mut EntitySubscription) -> Result<(), Error> {
        let Some(topic) = entry.topic().map(str::to_string) else {
            return Ok(());
        };

        self.debug_info.add_subscription(self.entity_id, &topic);
        let callback = self.recording_callback(entry.callback_slot());

        match self
            .transport
            .subscribe(&topic, callback, entry.qos(), entry.encoding())
            .await
        {
            Ok(id) => {
                entry.set_subscription_id(id);
                tracing::debug!(
                    entity = %self.entity_id,
                    key = %key,
                    topic = %topic,
                    qos = %entry.qos(),
                    id = %id,
                    "Subscribed"
                );
                Ok(())
            }
            Err(e) => {
                self.debug_info.remove_subscription(self.entity_id, &topic);
                tracing::warn!(
                    entity = %self.entity_id,
                    key = %key,
                    topic = %topic,
                    error = %e,
                    "Subscribe failed"
                );
                Err(e)
            }
        }
    }

    /// Wraps a callback slot so deliveries are recorded for the entity.
    fn recording_callback(&self, slot: CallbackSlot) -> MessageCallback {
        let debug_info = Arc::clone(self.debug_info);
        let entity_id = self.entity_id.clone();

        message_callback(move |msg| {
            debug_info.record_message(&entity_id, &msg);
            let callback = Arc::clone(&slot.read());
            callback(msg);
        })
    }

    fn partial(
        source: Error,
        mut state: SubscriptionState,
        mut remaining: SubscriptionState,
    ) -> ReconcileError {
        for (key, entry) in remaining.drain() {
            if !state.contains_key(&key) {
                state.insert(key, entry);
            }
        }
        ReconcileError { source, state }
    }
}

impl<T: Transport> std::fmt::Debug for Reconciler<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("entity_id", self.entity_id)
            .finish_non_exhaustive()
    }
}
