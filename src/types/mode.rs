// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Operating mode of an air conditioner.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::ValueError;

use super::raw::int_value;

/// Operating mode (`mode` attribute).
///
/// | Code | Mode |
/// |------|------|
/// | 0    | Fan  |
/// | 2    | Cool |
/// | 3    | Dry  |
/// | 4    | Auto |
///
/// # Examples
///
/// ```
/// use bluestar_lib::types::AcMode;
///
/// assert_eq!(AcMode::Cool.code(), 2);
/// assert_eq!(AcMode::try_from(3).unwrap(), AcMode::Dry);
/// assert_eq!("fan_only".parse::<AcMode>().unwrap(), AcMode::Fan);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AcMode {
    /// Fan only, no compressor.
    Fan,
    /// Cooling.
    #[default]
    Cool,
    /// Dehumidify.
    Dry,
    /// Device-selected mode.
    Auto,
}

impl AcMode {
    /// All modes in display order.
    pub const ALL: [Self; 4] = [Self::Fan, Self::Cool, Self::Dry, Self::Auto];

    /// Returns the vendor code.
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::Fan => 0,
            Self::Cool => 2,
            Self::Dry => 3,
            Self::Auto => 4,
        }
    }

    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fan => "fan",
            Self::Cool => "cool",
            Self::Dry => "dry",
            Self::Auto => "auto",
        }
    }

    /// Normalises a raw attribute value, falling back to [`AcMode::Cool`].
    #[must_use]
    pub fn from_raw(value: Option<&Value>) -> Self {
        value
            .and_then(int_value)
            .and_then(|code| Self::try_from(code).ok())
            .unwrap_or_default()
    }
}

impl TryFrom<i64> for AcMode {
    type Error = ValueError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Fan),
            2 => Ok(Self::Cool),
            3 => Ok(Self::Dry),
            4 => Ok(Self::Auto),
            _ => Err(ValueError::UnknownCode { kind: "mode", code }),
        }
    }
}

impl fmt::Display for AcMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AcMode {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fan" | "fan_only" => Ok(Self::Fan),
            "cool" => Ok(Self::Cool),
            "dry" => Ok(Self::Dry),
            "auto" => Ok(Self::Auto),
            _ => Err(ValueError::UnknownName {
                kind: "mode",
                name: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn codes_round_trip() {
        for mode in AcMode::ALL {
            assert_eq!(AcMode::try_from(mode.code()).unwrap(), mode);
        }
    }

    #[test]
    fn code_one_is_not_a_mode() {
        assert!(matches!(
            AcMode::try_from(1),
            Err(ValueError::UnknownCode { kind: "mode", code: 1 })
        ));
    }

    #[test]
    fn from_raw_defaults_to_cool() {
        assert_eq!(AcMode::from_raw(Some(&json!(9))), AcMode::Cool);
        assert_eq!(AcMode::from_raw(Some(&json!("x"))), AcMode::Cool);
        assert_eq!(AcMode::from_raw(None), AcMode::Cool);
    }

    #[test]
    fn from_raw_accepts_strings() {
        assert_eq!(AcMode::from_raw(Some(&json!("0"))), AcMode::Fan);
        assert_eq!(AcMode::from_raw(Some(&json!(4))), AcMode::Auto);
    }

    #[test]
    fn parse_names() {
        assert_eq!("COOL".parse::<AcMode>().unwrap(), AcMode::Cool);
        assert!("heat".parse::<AcMode>().is_err());
    }
}
