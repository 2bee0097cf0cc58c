// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Helpers for reading the vendor's raw attribute map.
//!
//! The cloud API is inconsistent about encoding: the same attribute may be
//! reported as `2`, `2.0` or `"2"` depending on the firmware and the endpoint.
//! These helpers accept all three.

use serde_json::{Map, Value};

/// Raw device attributes as reported by the vendor API (`pow`, `mode`, ...).
pub type RawState = Map<String, Value>;

/// Reads an integer from a JSON number or a numeric string.
#[must_use]
pub fn int_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract().abs() < f64::EPSILON).map(float_to_int)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite() && f.fract().abs() < f64::EPSILON)
                        .map(float_to_int)
                })
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Reads a float from a JSON number or a numeric string.
#[must_use]
pub fn float_value(value: &Value) -> Option<f32> {
    #[allow(clippy::cast_possible_truncation)]
    let parsed = match value {
        Value::Number(n) => n.as_f64().map(|f| f as f32),
        Value::String(s) => s.trim().parse::<f32>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

/// Renders a raw value the way the preferences endpoint expects it.
///
/// Strings are passed through unquoted; everything else uses its JSON text.
#[must_use]
pub fn string_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        other => other.to_string(),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn float_to_int(f: f64) -> i64 {
    f as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn int_value_accepts_numbers_and_strings() {
        assert_eq!(int_value(&json!(2)), Some(2));
        assert_eq!(int_value(&json!(-1)), Some(-1));
        assert_eq!(int_value(&json!("4")), Some(4));
        assert_eq!(int_value(&json!(" 3 ")), Some(3));
        assert_eq!(int_value(&json!(6.0)), Some(6));
        assert_eq!(int_value(&json!("7.0")), Some(7));
        assert_eq!(int_value(&json!(true)), Some(1));
    }

    #[test]
    fn int_value_rejects_non_integers() {
        assert_eq!(int_value(&json!(2.5)), None);
        assert_eq!(int_value(&json!("abc")), None);
        assert_eq!(int_value(&json!(null)), None);
        assert_eq!(int_value(&json!({"a": 1})), None);
    }

    #[test]
    fn float_value_parses_temperatures() {
        assert_eq!(float_value(&json!("24")), Some(24.0));
        assert_eq!(float_value(&json!(23.5)), Some(23.5));
        assert_eq!(float_value(&json!("")), None);
        assert_eq!(float_value(&json!("NaN")), None);
    }

    #[test]
    fn string_value_formats_for_preferences() {
        assert_eq!(string_value(&json!(1)), "1");
        assert_eq!(string_value(&json!("24")), "24");
        assert_eq!(string_value(&json!(-1)), "-1");
        assert_eq!(string_value(&json!(false)), "0");
    }
}
