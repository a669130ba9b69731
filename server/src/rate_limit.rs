//! Packet-rate limiting and IP bans.
//!
//! DESIGN
//! ======
//! Two independent mechanisms:
//! - [`PacketWindow`] is a per-connection counter over a fixed one-second
//!   window anchored at the first packet of the window. It is owned by the
//!   connection task, so no locking is involved.
//! - [`IpBans`] is a shared map from IP to ban expiry, checked by both the
//!   HTTP middleware and the WS upgrade path. Expired entries are removed
//!   lazily on lookup.
//!
//! Uid bans live with the paint state in [`crate::state::Core`]; they gate
//! paint semantics, not transport.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Window length for the per-connection packet counter.
pub const PACKET_WINDOW: Duration = Duration::from_secs(1);

/// Ban applied when a connection exceeds the packet rate.
pub const RATE_LIMIT_BAN: Duration = Duration::from_secs(15);

// =============================================================================
// PACKET WINDOW
// =============================================================================

/// Fixed one-second packet counter for a single connection.
#[derive(Debug)]
pub struct PacketWindow {
    window_start: Instant,
    packets_in_window: u32,
}

impl PacketWindow {
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self { window_start: now, packets_in_window: 0 }
    }

    /// Record one packet. Returns false when the packet pushes the count
    /// past `limit` within the current window.
    pub fn record(&mut self, now: Instant, limit: u32) -> bool {
        if now.duration_since(self.window_start) >= PACKET_WINDOW {
            self.window_start = now;
            self.packets_in_window = 0;
        }
        self.packets_in_window += 1;
        self.packets_in_window <= limit
    }
}

// =============================================================================
// IP BANS
// =============================================================================

/// Shared IP ban table with expiry.
#[derive(Clone)]
pub struct IpBans {
    inner: Arc<Mutex<HashMap<IpAddr, Instant>>>,
}

impl IpBans {
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Ban an IP for `duration` from now. Extends but never shortens an
    /// existing ban.
    pub fn ban(&self, ip: IpAddr, duration: Duration) {
        self.ban_at(ip, duration, Instant::now());
    }

    fn ban_at(&self, ip: IpAddr, duration: Duration, now: Instant) {
        let expiry = now + duration;
        let mut bans = self.inner.lock().unwrap();
        let entry = bans.entry(ip).or_insert(expiry);
        if *entry < expiry {
            *entry = expiry;
        }
    }

    /// Whether the IP is currently banned. Removes the entry when expired.
    pub fn is_banned(&self, ip: IpAddr) -> bool {
        self.is_banned_at(ip, Instant::now())
    }

    fn is_banned_at(&self, ip: IpAddr, now: Instant) -> bool {
        let mut bans = self.inner.lock().unwrap();
        match bans.get(&ip) {
            Some(&expiry) if expiry > now => true,
            Some(_) => {
                bans.remove(&ip);
                false
            }
            None => false,
        }
    }

    /// Remaining ban time in whole seconds, rounded up. None if not banned.
    pub fn retry_after_secs(&self, ip: IpAddr) -> Option<u64> {
        self.retry_after_secs_at(ip, Instant::now())
    }

    fn retry_after_secs_at(&self, ip: IpAddr, now: Instant) -> Option<u64> {
        let mut bans = self.inner.lock().unwrap();
        match bans.get(&ip) {
            Some(&expiry) if expiry > now => {
                let remaining = expiry - now;
                Some(remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0))
            }
            Some(_) => {
                bans.remove(&ip);
                None
            }
            None => None,
        }
    }

    /// Lift a ban early.
    pub fn unban(&self, ip: IpAddr) {
        self.inner.lock().unwrap().remove(&ip);
    }
}

impl Default for IpBans {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================
