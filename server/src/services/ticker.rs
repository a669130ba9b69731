//! Tick scheduler — drains the dirty set and flushes every connection.
//!
//! DESIGN
//! ======
//! One fixed-rate loop bounds broadcast latency and coalesces all egress:
//! N paints within a tick become one broadcast blob of 8*D bytes (D =
//! distinct dirtied pixels), and each connection gets at most one socket
//! write per tick carrying its pending ping/result bytes plus the blob.
//!
//! The drain happens under the core lock; encoding and channel sends run
//! lock-free on the drained copy.

use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::board::DirtyPixel;
use crate::state::AppState;

/// Slack added to the tick period before an overrun is logged.
const OVERRUN_SLACK: Duration = Duration::from_millis(50);

/// Encode drained pixels as concatenated 0xFA records.
#[must_use]
pub fn encode_broadcast(pixels: &[DirtyPixel]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(pixels.len() * packets::PIXEL_UPDATE_LEN);
    for pixel in pixels {
        blob.extend_from_slice(&packets::encode_pixel_update(pixel.x, pixel.y, pixel.color));
    }
    blob
}

/// Run one tick: drain, encode, fan out.
pub fn run_tick(state: &AppState) {
    let dirty = state.core.lock().unwrap().board.drain_dirty();
    if !dirty.is_empty() {
        debug!(pixels = dirty.len(), "tick broadcast");
    }
    let blob = encode_broadcast(&dirty);
    state.connections.flush_tick(&blob);
}

/// Spawn the broadcast loop at `ticksPerSecond` Hz.
pub fn spawn_tick_task(state: AppState) -> JoinHandle<()> {
    let period = Duration::from_millis(state.config.tick_ms());
    let overrun = period + OVERRUN_SLACK;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick = Instant::now();

        loop {
            ticker.tick().await;

            let now = Instant::now();
            let elapsed = now.duration_since(last_tick);
            if elapsed > overrun {
                warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    period_ms = period.as_millis() as u64,
                    "tick overrun; server overloaded"
                );
            }
            last_tick = now;

            run_tick(&state);
        }
    })
}

#[cfg(test)]
#[path = "ticker_test.rs"]
mod tests;
