// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pilot-wire: DTOs for the duplex updates subscription.
//!
//! The HTTP/WS transport is a thin adapter; these are the payloads it
//! carries. JSON with a `type` tag on every message.

mod messages;

pub use messages::{ClientMessage, ServerMessage, EXPECTED_PING_INTERVAL, LIVENESS_TIMEOUT};
