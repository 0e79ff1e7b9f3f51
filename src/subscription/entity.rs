// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-entity owner of a subscription state.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::debug_info::DebugInfoRegistry;
use crate::error::{Error, ReconcileError};
use crate::protocol::Transport;
use crate::types::EntityId;

use super::reconcile::Reconciler;
use super::state::{DesiredTopics, SubscriptionState};

/// Subscriptions of one entity, reconciled one pass at a time.
///
/// Concurrent calls on the same entity queue on an async mutex, so a pass
/// always starts from the state the previous one left behind. When a pass
/// fails, the partially reconciled state is kept and the next call repairs
/// it.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use opp_mqtt::debug_info::DebugInfoRegistry;
/// use opp_mqtt::subscription::{message_callback, DesiredTopics, EntitySubscriptions, TopicSpec};
/// use opp_mqtt::testing::RecordingTransport;
/// use opp_mqtt::types::EntityId;
///
/// # async fn example() -> opp_mqtt::Result<()> {
/// let transport = Arc::new(RecordingTransport::new());
/// let debug_info = Arc::new(DebugInfoRegistry::new());
/// let light = EntitySubscriptions::new(
///     EntityId::new("light.porch")?,
///     Arc::clone(&transport),
///     Arc::clone(&debug_info),
/// );
///
/// light
///     .update(DesiredTopics::new().with(
///         "state_topic",
///         TopicSpec::new("porch/light", message_callback(|msg| println!("{:?}", msg.payload))),
///     ))
///     .await?;
///
/// light.remove().await?;
/// assert_eq!(debug_info.entity_count(), 0);
/// # Ok(())
/// # }
/// ```
pub struct EntitySubscriptions<T: Transport> {
    entity_id: EntityId,
    transport: Arc<T>,
    debug_info: Arc<DebugInfoRegistry>,
    state: Mutex<SubscriptionState>,
}

impl<T: Transport> EntitySubscriptions<T> {
    /// Creates an entity with no subscriptions.
    #[must_use]
    pub fn new(entity_id: EntityId, transport: Arc<T>, debug_info: Arc<DebugInfoRegistry>) -> Self {
        Self {
            entity_id,
            transport,
            debug_info,
            state: Mutex::new(SubscriptionState::default()),
        }
    }

    /// Returns the entity ID.
    #[must_use]
    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    /// Reconciles the entity's subscriptions against `desired`.
    ///
    /// # Errors
    ///
    /// Returns the transport error that stopped the pass. The live part of
    /// the state is kept for the next call.
    ///
    /// # Cancel safety
    ///
    /// This method is not cancel-safe. The stored state is replaced only
    /// when the pass finishes, so dropping the future mid-pass (for example
    /// under `tokio::time::timeout`) keeps handles that may already be
    /// unsubscribed and loses the handles of subscriptions created so far.
    /// The same holds for [`unsubscribe_all`](Self::unsubscribe_all) and
    /// [`remove`](Self::remove).
    pub async fn update(&self, desired: DesiredTopics) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        let previous = state.clone();
        let reconciler = Reconciler::new(&*self.transport, &self.debug_info, &self.entity_id);

        let result = reconciler.reconcile(Some(previous), desired).await;
        self.store(&mut state, result)
    }

    /// Tears down every subscription of the entity.
    ///
    /// # Errors
    ///
    /// Same as [`update`](Self::update).
    pub async fn unsubscribe_all(&self) -> Result<(), Error> {
        self.update(DesiredTopics::new()).await
    }

    /// Tears down every subscription and forgets the entity's debug history.
    ///
    /// # Errors
    ///
    /// Returns the transport error if teardown fails; the debug history is
    /// kept in that case.
    pub async fn remove(&self) -> Result<(), Error> {
        self.unsubscribe_all().await?;
        self.debug_info.remove_entity(&self.entity_id);
        tracing::debug!(entity = %self.entity_id, "Entity removed");
        Ok(())
    }

    /// Returns a copy of the current subscription state.
    pub async fn state(&self) -> SubscriptionState {
        self.state.lock().await.clone()
    }

    fn store(
        &self,
        slot: &mut SubscriptionState,
        result: Result<SubscriptionState, ReconcileError>,
    ) -> Result<(), Error> {
        match result {
            Ok(state) => {
                *slot = state;
                Ok(())
            }
            Err(err) => {
                let (source, partial) = err.into_parts();
                tracing::warn!(
                    entity = %self.entity_id,
                    live = partial.active_count(),
                    error = %source,
                    "Reconciliation stopped early"
                );
                *slot = partial;
                Err(source)
            }
        }
    }
}

impl<T: Transport> std::fmt::Debug for EntitySubscriptions<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitySubscriptions")
            .field("entity_id", &self.entity_id)
            .finish_non_exhaustive()
    }
}
