// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Control intents.

use serde_json::Value;

use crate::error::ValueError;
use crate::types::raw::{int_value, string_value};
use crate::types::{AcMode, FanSpeed, RawState, SwingPosition};

/// A requested state change for one device.
///
/// Built with typed setters that write the vendor attribute keys, or with
/// [`attribute`](Self::attribute) for raw key/value pairs.
///
/// # Examples
///
/// ```
/// use bluestar_lib::control::ControlIntent;
/// use bluestar_lib::types::{AcMode, FanSpeed};
/// use serde_json::json;
///
/// let intent = ControlIntent::new("24587ca091f8")
///     .power(true)
///     .mode(AcMode::Dry)
///     .fan_speed(FanSpeed::Auto)
///     .target_temperature(24.0)?;
///
/// assert_eq!(intent.attributes().get("mode"), Some(&json!(3)));
/// assert_eq!(intent.attributes().get("stemp"), Some(&json!("24")));
/// # Ok::<(), bluestar_lib::error::ValueError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ControlIntent {
    device_id: String,
    attributes: RawState,
}

impl ControlIntent {
    /// Lowest target temperature accepted, in degrees Celsius.
    pub const MIN_TEMPERATURE: f32 = 16.0;
    /// Highest target temperature accepted, in degrees Celsius.
    pub const MAX_TEMPERATURE: f32 = 30.0;

    /// Creates an empty intent for a device.
    #[must_use]
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            attributes: RawState::new(),
        }
    }

    /// Creates an intent from a raw attribute map.
    #[must_use]
    pub fn from_attributes(device_id: impl Into<String>, attributes: RawState) -> Self {
        Self {
            device_id: device_id.into(),
            attributes,
        }
    }

    /// Sets power (`pow`).
    #[must_use]
    pub fn power(self, on: bool) -> Self {
        self.attribute("pow", i64::from(on))
    }

    /// Sets the operating mode (`mode`).
    #[must_use]
    pub fn mode(self, mode: AcMode) -> Self {
        self.attribute("mode", mode.code())
    }

    /// Sets the target temperature (`stemp`), sent as a string.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::InvalidTemperature`] if the value is not finite
    /// and [`ValueError::TemperatureOutOfRange`] outside
    /// [`MIN_TEMPERATURE`](Self::MIN_TEMPERATURE)..=[`MAX_TEMPERATURE`](Self::MAX_TEMPERATURE).
    pub fn target_temperature(self, celsius: f32) -> Result<Self, ValueError> {
        if !celsius.is_finite() {
            return Err(ValueError::InvalidTemperature(celsius));
        }
        if !(Self::MIN_TEMPERATURE..=Self::MAX_TEMPERATURE).contains(&celsius) {
            return Err(ValueError::TemperatureOutOfRange {
                value: celsius,
                min: Self::MIN_TEMPERATURE,
                max: Self::MAX_TEMPERATURE,
            });
        }
        let formatted = if celsius.fract().abs() < f32::EPSILON {
            format!("{celsius:.0}")
        } else {
            format!("{celsius}")
        };
        Ok(self.attribute("stemp", formatted))
    }

    /// Sets the fan speed (`fspd`).
    #[must_use]
    pub fn fan_speed(self, speed: FanSpeed) -> Self {
        self.attribute("fspd", speed.code())
    }

    /// Sets the vertical louver position (`vswing`).
    #[must_use]
    pub fn vertical_swing(self, position: SwingPosition) -> Self {
        self.attribute("vswing", position.code())
    }

    /// Sets the horizontal louver position (`hswing`).
    #[must_use]
    pub fn horizontal_swing(self, position: SwingPosition) -> Self {
        self.attribute("hswing", position.code())
    }

    /// Turns the front panel display on or off (`display`).
    #[must_use]
    pub fn display(self, on: bool) -> Self {
        self.attribute("display", i64::from(on))
    }

    /// Sets a raw attribute, replacing any previous value for the key.
    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// The targeted device.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// The requested attributes.
    #[must_use]
    pub fn attributes(&self) -> &RawState {
        &self.attributes
    }

    /// Returns `true` if no attribute was set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Checks attributes that must have a specific shape.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::InvalidMode`] when `mode` is present but is not
    /// an integer code. Raw maps built with
    /// [`from_attributes`](Self::from_attributes) may carry such values.
    pub fn validate(&self) -> Result<(), ValueError> {
        match self.attributes.get("mode") {
            Some(value) if int_value(value).is_none() => {
                Err(ValueError::InvalidMode(string_value(value)))
            }
            _ => Ok(()),
        }
    }

    /// Splits the intent into device id and attributes.
    #[must_use]
    pub fn into_parts(self) -> (String, RawState) {
        (self.device_id, self.attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_setters_write_vendor_keys() {
        let intent = ControlIntent::new("abc")
            .power(false)
            .mode(AcMode::Fan)
            .fan_speed(FanSpeed::Turbo)
            .vertical_swing(SwingPosition::Auto)
            .horizontal_swing(SwingPosition::Angle30)
            .display(true);

        let attrs = intent.attributes();
        assert_eq!(attrs.get("pow"), Some(&json!(0)));
        assert_eq!(attrs.get("mode"), Some(&json!(0)));
        assert_eq!(attrs.get("fspd"), Some(&json!(6)));
        assert_eq!(attrs.get("vswing"), Some(&json!(-1)));
        assert_eq!(attrs.get("hswing"), Some(&json!(2)));
        assert_eq!(attrs.get("display"), Some(&json!(1)));
    }

    #[test]
    fn temperature_formatting() {
        let intent = ControlIntent::new("abc").target_temperature(24.0).unwrap();
        assert_eq!(intent.attributes().get("stemp"), Some(&json!("24")));

        let intent = ControlIntent::new("abc").target_temperature(24.5).unwrap();
        assert_eq!(intent.attributes().get("stemp"), Some(&json!("24.5")));
    }

    #[test]
    fn non_finite_temperature_rejected() {
        let err = ControlIntent::new("abc")
            .target_temperature(f32::NAN)
            .unwrap_err();
        assert!(matches!(err, ValueError::InvalidTemperature(_)));
    }

    #[test]
    fn temperature_range_enforced() {
        for celsius in [15.5, 30.5, 75.0] {
            let err = ControlIntent::new("abc")
                .target_temperature(celsius)
                .unwrap_err();
            assert!(matches!(err, ValueError::TemperatureOutOfRange { .. }));
        }

        assert!(ControlIntent::new("abc")
            .target_temperature(ControlIntent::MIN_TEMPERATURE)
            .is_ok());
        assert!(ControlIntent::new("abc")
            .target_temperature(ControlIntent::MAX_TEMPERATURE)
            .is_ok());
    }

    #[test]
    fn non_integer_mode_fails_validation() {
        for mode in [json!("3.5"), json!("cool"), json!(3.5)] {
            let intent = ControlIntent::new("abc").attribute("mode", mode);
            assert!(matches!(intent.validate(), Err(ValueError::InvalidMode(_))));
        }

        assert!(ControlIntent::new("abc").attribute("mode", "3").validate().is_ok());
        assert!(ControlIntent::new("abc").mode(AcMode::Dry).validate().is_ok());
        assert!(ControlIntent::new("abc").power(true).validate().is_ok());
    }

    #[test]
    fn later_setter_wins() {
        let intent = ControlIntent::new("abc").power(true).power(false);
        assert_eq!(intent.attributes().len(), 1);
        assert_eq!(intent.attributes().get("pow"), Some(&json!(0)));
    }

    #[test]
    fn empty_intent() {
        let intent = ControlIntent::new("abc");
        assert!(intent.is_empty());
        assert_eq!(intent.device_id(), "abc");
    }

    #[test]
    fn raw_attributes_round_into_parts() {
        let mut raw = RawState::new();
        raw.insert("pow".to_string(), json!(1));

        let (device_id, attributes) = ControlIntent::from_attributes("abc", raw.clone()).into_parts();
        assert_eq!(device_id, "abc");
        assert_eq!(attributes, raw);
    }
}
