// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity identifier type.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Identifier of the entity owning a set of subscriptions.
///
/// Entity ids look like `light.kitchen`. The id is reference counted so it
/// can be cloned into every message callback wrapper cheaply.
///
/// # Examples
///
/// ```
/// use opp_mqtt::types::EntityId;
///
/// let id = EntityId::new("light.kitchen").unwrap();
/// assert_eq!(id.as_str(), "light.kitchen");
/// assert_eq!(id.domain(), Some("light"));
///
/// assert!(EntityId::new("").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(Arc<str>);

impl EntityId {
    /// Creates an entity id.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::EmptyEntityId` if the id is empty.
    pub fn new(id: impl AsRef<str>) -> Result<Self, ValueError> {
        let id = id.as_ref().trim();
        if id.is_empty() {
            return Err(ValueError::EmptyEntityId);
        }
        Ok(Self(Arc::from(id)))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the domain part before the first dot, if any.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.0.split_once('.').map(|(domain, _)| domain)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EntityId {
    type Error = ValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for EntityId {
    type Error = ValueError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0.to_string()
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_whitespace() {
        let id = EntityId::new("  sensor.outside ").unwrap();
        assert_eq!(id.as_str(), "sensor.outside");
    }

    #[test]
    fn empty_is_rejected() {
        assert_eq!(EntityId::new("   "), Err(ValueError::EmptyEntityId));
    }

    #[test]
    fn domain_without_dot() {
        let id = EntityId::new("orphan").unwrap();
        assert_eq!(id.domain(), None);
    }

    #[test]
    fn clones_are_equal() {
        let id = EntityId::new("light.hall").unwrap();
        assert_eq!(id.clone(), id);
    }

    #[test]
    fn display_and_debug() {
        let id = EntityId::new("camera.door").unwrap();
        assert_eq!(id.to_string(), "camera.door");
        assert_eq!(format!("{id:?}"), "EntityId(camera.door)");
    }

    #[test]
    fn serde_round_trip_as_string() {
        let id = EntityId::new("vacuum.robot").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"vacuum.robot\"");

        assert!(serde_json::from_str::<EntityId>("\"\"").is_err());
    }
}
