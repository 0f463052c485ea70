// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capped exponential backoff shared by queue retries and reconnection.

use std::time::Duration;

/// Delay before attempt number `attempt` (0-based): `min(base * 2^attempt, cap)`.
///
/// The shift saturates so large attempt counts cannot overflow past the cap.
pub fn exponential_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    let delay = base.saturating_mul(factor.min(u32::MAX as u64) as u32);
    delay.min(cap)
}
