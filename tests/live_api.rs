// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests against the real Blue Star cloud.
//!
//! These tests need an account with at least one air conditioner and are
//! ignored by default.
//! Run with: `cargo test --test live_api -- --ignored --test-threads=1`
//!
//! # Environment Variables
//!
//! - `BLUESTAR_PHONE` - Account phone number
//! - `BLUESTAR_PASSWORD` - Account password
//! - `BLUESTAR_DEVICE_ID` - Device to control (optional, control tests skip without it)
//!
//! # Example
//!
//! ```bash
//! export BLUESTAR_PHONE=9876543210
//! export BLUESTAR_PASSWORD=secret
//! export BLUESTAR_DEVICE_ID=24587ca091f8
//! cargo test --test live_api -- --ignored --test-threads=1
//! ```

use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bluestar_lib::{BluestarClient, ClientConfig, ControlIntent};
use tokio::time::sleep;

struct Account {
    phone: String,
    password: String,
}

impl Account {
    fn from_env() -> Self {
        Self {
            phone: env::var("BLUESTAR_PHONE").expect("BLUESTAR_PHONE not set"),
            password: env::var("BLUESTAR_PASSWORD").expect("BLUESTAR_PASSWORD not set"),
        }
    }
}

async fn connect(config: ClientConfig) -> BluestarClient {
    let account = Account::from_env();
    BluestarClient::connect(config, account.phone, account.password)
        .await
        .expect("Failed to connect")
}

#[tokio::test]
#[ignore = "requires a Blue Star account"]
async fn login_and_list_devices() {
    let client = connect(ClientConfig::new()).await;

    let devices = client.list_devices().unwrap();
    assert!(!devices.is_empty(), "account has no devices");

    for entry in client.snapshot().iter() {
        println!(
            "{} ({}) connected={} power={} mode={} target={:?}",
            entry.device.name,
            entry.device.id,
            entry.device.connected,
            entry.state.power,
            entry.state.mode,
            entry.state.target_temperature
        );
    }

    client.close().await;
}

#[tokio::test]
#[ignore = "requires a Blue Star account"]
async fn rest_only_refresh() {
    let client = connect(ClientConfig::new().rest_only()).await;
    assert!(!client.is_realtime_connected());

    let first = client.snapshot().generation();
    let snapshot = client.refresh_now().await.unwrap();
    assert_eq!(snapshot.generation(), first + 1);

    client.close().await;
}

#[tokio::test]
#[ignore = "requires a Blue Star account and BLUESTAR_DEVICE_ID"]
async fn toggle_display_and_restore() {
    let Ok(device_id) = env::var("BLUESTAR_DEVICE_ID") else {
        println!("BLUESTAR_DEVICE_ID not set, skipping");
        return;
    };

    let client = connect(ClientConfig::new()).await;
    let original = client.get_snapshot(&device_id).unwrap().state.display;

    let updates = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&updates);
    let sub_id = client.on_realtime_update(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let outcome = client
        .send_control(&ControlIntent::new(&device_id).display(!original))
        .await
        .unwrap();
    println!("display change delivered via {}", outcome.tier);

    sleep(Duration::from_secs(5)).await;
    client.refresh_now().await.unwrap();

    client
        .send_control(&ControlIntent::new(&device_id).display(original))
        .await
        .unwrap();

    println!("realtime updates received: {}", updates.load(Ordering::SeqCst));
    assert!(client.unsubscribe(sub_id));

    client.close().await;
}
