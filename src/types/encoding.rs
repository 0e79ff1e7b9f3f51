// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Payload encoding requested by a subscriber.

use std::fmt;

use crate::error::ValueError;

/// How a subscriber wants payloads delivered.
///
/// Entity configurations name the encoding as a string, `"utf-8"` by
/// default; a missing encoding means raw bytes.
///
/// # Examples
///
/// ```
/// use opp_mqtt::types::Encoding;
///
/// assert_eq!(Encoding::from_name(Some("utf-8")).unwrap(), Encoding::Utf8);
/// assert_eq!(Encoding::from_name(Some("UTF8")).unwrap(), Encoding::Utf8);
/// assert_eq!(Encoding::from_name(None).unwrap(), Encoding::Raw);
/// assert!(Encoding::from_name(Some("latin-1")).is_err());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Decode payloads as UTF-8 text.
    #[default]
    Utf8,
    /// Deliver payloads as raw bytes.
    Raw,
}

impl Encoding {
    /// Parses an encoding name as found in entity configuration.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::UnsupportedEncoding` for anything other than a
    /// UTF-8 alias.
    pub fn from_name(name: Option<&str>) -> Result<Self, ValueError> {
        let Some(name) = name else {
            return Ok(Self::Raw);
        };
        match name.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" | "utf_8" => Ok(Self::Utf8),
            _ => Err(ValueError::UnsupportedEncoding(name.to_string())),
        }
    }

    /// Returns the configuration name, `None` for raw bytes.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        match self {
            Self::Utf8 => Some("utf-8"),
            Self::Raw => None,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name().unwrap_or("raw"))
    }
}
