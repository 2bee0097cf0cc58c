// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fan speed type.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::ValueError;

use super::raw::int_value;

/// Fan speed (`fspd` attribute).
///
/// The vendor codes are not contiguous: 2, 3, 4, 6 and 7. Unknown codes
/// normalise to [`FanSpeed::Low`].
///
/// # Examples
///
/// ```
/// use bluestar_lib::types::FanSpeed;
///
/// assert_eq!(FanSpeed::Turbo.code(), 6);
/// assert_eq!(FanSpeed::try_from(7).unwrap(), FanSpeed::Auto);
/// assert!(FanSpeed::try_from(5).is_err());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FanSpeed {
    /// Low speed.
    #[default]
    Low,
    /// Medium speed.
    Medium,
    /// High speed.
    High,
    /// Turbo (boost).
    Turbo,
    /// Device-selected speed.
    Auto,
}

impl FanSpeed {
    /// All speeds from slowest to fastest, then auto.
    pub const ALL: [Self; 5] = [Self::Low, Self::Medium, Self::High, Self::Turbo, Self::Auto];

    /// Returns the vendor code.
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::Low => 2,
            Self::Medium => 3,
            Self::High => 4,
            Self::Turbo => 6,
            Self::Auto => 7,
        }
    }

    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Turbo => "turbo",
            Self::Auto => "auto",
        }
    }

    /// Normalises a raw attribute value, falling back to [`FanSpeed::Low`].
    #[must_use]
    pub fn from_raw(value: Option<&Value>) -> Self {
        value
            .and_then(int_value)
            .and_then(|code| Self::try_from(code).ok())
            .unwrap_or_default()
    }
}

impl TryFrom<i64> for FanSpeed {
    type Error = ValueError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            2 => Ok(Self::Low),
            3 => Ok(Self::Medium),
            4 => Ok(Self::High),
            6 => Ok(Self::Turbo),
            7 => Ok(Self::Auto),
            _ => Err(ValueError::UnknownCode {
                kind: "fan speed",
                code,
            }),
        }
    }
}

impl fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FanSpeed {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "turbo" => Ok(Self::Turbo),
            "auto" => Ok(Self::Auto),
            _ => Err(ValueError::UnknownName {
                kind: "fan speed",
                name: s.to_string(),
            }),
        }
    }
}
