// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for Bluestar air-conditioner control.
//!
//! Each enumeration is a closed set mapped to the vendor's numeric codes.
//! Raw values outside a known table normalise to the type's default instead
//! of propagating an invalid state.
//!
//! # Types
//!
//! - [`AcMode`] - Operating mode (fan, cool, dry, auto)
//! - [`FanSpeed`] - Fan speed (low, medium, high, turbo, auto)
//! - [`SwingPosition`] - Louver position (off, fixed angle, auto)
//! - [`RawState`] - The vendor attribute map

mod fan_speed;
mod mode;
pub mod raw;
mod swing;

pub use fan_speed::FanSpeed;
pub use mode::AcMode;
pub use raw::RawState;
pub use swing::SwingPosition;
