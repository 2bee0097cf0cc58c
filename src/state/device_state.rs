// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Canonical projection of a device's raw attributes.

use serde_json::Value;

use crate::types::raw::{float_value, int_value};
use crate::types::{AcMode, FanSpeed, RawState, SwingPosition};

/// Normalised state of an air conditioner.
///
/// Derived from a [`Device`](super::Device)'s raw attributes on every poll and
/// never stored on its own. Enumerated fields always hold a valid variant:
/// unknown vendor codes fall back to each type's default.
///
/// # Examples
///
/// ```
/// use bluestar_lib::state::CanonicalDeviceState;
/// use bluestar_lib::types::{AcMode, FanSpeed, RawState};
/// use serde_json::json;
///
/// let raw: RawState = serde_json::from_value(json!({
///     "pow": 1, "mode": 2, "stemp": "24", "fspd": 4
/// })).unwrap();
///
/// let state = CanonicalDeviceState::from_raw(&raw);
/// assert!(state.power);
/// assert_eq!(state.mode, AcMode::Cool);
/// assert_eq!(state.target_temperature, Some(24.0));
/// assert_eq!(state.fan_speed, FanSpeed::High);
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CanonicalDeviceState {
    /// Compressor/fan power.
    pub power: bool,
    /// Operating mode.
    pub mode: AcMode,
    /// Set-point temperature.
    pub target_temperature: Option<f32>,
    /// Measured room temperature.
    pub current_temperature: Option<f32>,
    /// Fan speed.
    pub fan_speed: FanSpeed,
    /// Vertical louver position.
    pub vertical_swing: SwingPosition,
    /// Horizontal louver position.
    pub horizontal_swing: SwingPosition,
    /// Front panel display.
    pub display: bool,
    /// Wi-Fi signal strength in dBm.
    pub signal_strength: Option<i32>,
    /// Device error code, `0` when healthy.
    pub error_code: Option<i64>,
    /// Source tag of the last change (`anmq` for app-originated commands).
    pub source: Option<String>,
}

impl Default for CanonicalDeviceState {
    fn default() -> Self {
        Self {
            power: false,
            mode: AcMode::default(),
            target_temperature: None,
            current_temperature: None,
            fan_speed: FanSpeed::default(),
            vertical_swing: SwingPosition::default(),
            horizontal_swing: SwingPosition::default(),
            display: true,
            signal_strength: None,
            error_code: None,
            source: None,
        }
    }
}

impl CanonicalDeviceState {
    /// Projects a raw attribute map onto the canonical model.
    #[must_use]
    pub fn from_raw(raw: &RawState) -> Self {
        let defaults = Self::default();
        Self {
            power: flag(raw.get("pow")).unwrap_or(defaults.power),
            mode: AcMode::from_raw(raw.get("mode")),
            target_temperature: raw.get("stemp").and_then(float_value),
            current_temperature: raw.get("ctemp").and_then(float_value),
            fan_speed: FanSpeed::from_raw(raw.get("fspd")),
            vertical_swing: SwingPosition::from_raw(raw.get("vswing")),
            horizontal_swing: SwingPosition::from_raw(raw.get("hswing")),
            display: flag(raw.get("display")).unwrap_or(defaults.display),
            signal_strength: raw
                .get("rssi")
                .and_then(int_value)
                .and_then(|v| i32::try_from(v).ok()),
            error_code: raw.get("err").and_then(int_value),
            source: raw.get("src").and_then(Value::as_str).map(str::to_string),
        }
    }

    /// Returns `true` when the device reports an error.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.error_code.is_some_and(|code| code != 0)
    }
}

fn flag(value: Option<&Value>) -> Option<bool> {
    value.and_then(int_value).map(|v| v != 0)
}
