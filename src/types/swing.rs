// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Louver swing positions.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::ValueError;

use super::raw::int_value;

/// Swing position for the vertical (`vswing`) or horizontal (`hswing`) louver.
///
/// Codes 1 to 4 select a fixed angle, `-1` lets the louver sweep, `0` turns
/// swing off. Unknown codes normalise to [`SwingPosition::Off`].
///
/// # Examples
///
/// ```
/// use bluestar_lib::types::SwingPosition;
///
/// assert_eq!(SwingPosition::Auto.code(), -1);
/// assert_eq!(SwingPosition::try_from(2).unwrap(), SwingPosition::Angle30);
/// assert_eq!(SwingPosition::Angle45.as_str(), "45°");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SwingPosition {
    /// Swing disabled.
    #[default]
    Off,
    /// Fixed at position 1 (15°).
    Angle15,
    /// Fixed at position 2 (30°).
    Angle30,
    /// Fixed at position 3 (45°).
    Angle45,
    /// Fixed at position 4 (60°).
    Angle60,
    /// Continuous sweep.
    Auto,
}

impl SwingPosition {
    /// All positions in display order.
    pub const ALL: [Self; 6] = [
        Self::Off,
        Self::Angle15,
        Self::Angle30,
        Self::Angle45,
        Self::Angle60,
        Self::Auto,
    ];

    /// Returns the vendor code.
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::Off => 0,
            Self::Angle15 => 1,
            Self::Angle30 => 2,
            Self::Angle45 => 3,
            Self::Angle60 => 4,
            Self::Auto => -1,
        }
    }

    /// Returns the display label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Angle15 => "15°",
            Self::Angle30 => "30°",
            Self::Angle45 => "45°",
            Self::Angle60 => "60°",
            Self::Auto => "auto",
        }
    }

    /// Returns `true` for the fixed-angle positions.
    #[must_use]
    pub const fn is_fixed(&self) -> bool {
        matches!(
            self,
            Self::Angle15 | Self::Angle30 | Self::Angle45 | Self::Angle60
        )
    }

    /// Normalises a raw attribute value, falling back to [`SwingPosition::Off`].
    #[must_use]
    pub fn from_raw(value: Option<&Value>) -> Self {
        value
            .and_then(int_value)
            .and_then(|code| Self::try_from(code).ok())
            .unwrap_or_default()
    }
}

impl TryFrom<i64> for SwingPosition {
    type Error = ValueError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Off),
            1 => Ok(Self::Angle15),
            2 => Ok(Self::Angle30),
            3 => Ok(Self::Angle45),
            4 => Ok(Self::Angle60),
            -1 => Ok(Self::Auto),
            _ => Err(ValueError::UnknownCode {
                kind: "swing position",
                code,
            }),
        }
    }
}

impl fmt::Display for SwingPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwingPosition {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.trim_end_matches('°') {
            "off" | "0" => Ok(Self::Off),
            "15" => Ok(Self::Angle15),
            "30" => Ok(Self::Angle30),
            "45" => Ok(Self::Angle45),
            "60" => Ok(Self::Angle60),
            "auto" | "swing" => Ok(Self::Auto),
            _ => Err(ValueError::UnknownName {
                kind: "swing position",
                name: s.to_string(),
            }),
        }
    }
}
