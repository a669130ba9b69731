//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! Paint-visible state (board, tokens, cooldowns, uid bans) lives behind a
//! single [`Core`] mutex: a paint is O(1) work under the lock and never
//! crosses an await point while holding it, so `try_paint` and the tick
//! drain can never observe each other's partial state.
//!
//! `Connections` is the fan-out registry. Each WebSocket task registers an
//! egress channel and a send buffer; paint results and ping bytes are
//! appended between ticks, and the tick scheduler flushes every buffer
//! (plus the shared broadcast blob) as one message per connection per tick.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::SqlitePool;
use tokio::sync::mpsc;

use crate::board::PixelStore;
use crate::config::Config;
use crate::rate_limit::IpBans;
use crate::services::tokens::TokenRegistry;

/// Current time as milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

// =============================================================================
// CORE
// =============================================================================

/// All state a paint operation touches, guarded by one lock.
pub struct Core {
    pub board: PixelStore,
    pub tokens: TokenRegistry,
    /// Last successful paint per uid, ms since epoch.
    pub cooldowns: HashMap<u32, i64>,
    /// Uids denied painting regardless of token validity.
    pub uid_bans: HashSet<u32>,
}

impl Core {
    #[must_use]
    pub fn new(board: PixelStore) -> Self {
        Self {
            board,
            tokens: TokenRegistry::new(),
            cooldowns: HashMap::new(),
            uid_bans: HashSet::new(),
        }
    }
}

// =============================================================================
// CONNECTIONS
// =============================================================================

/// Message sent to a connection task through its egress channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Egress {
    /// Write these bytes to the socket as one binary message.
    Flush(Vec<u8>),
    /// Close the socket with this code.
    Close(u16),
}

struct ConnEntry {
    ip: IpAddr,
    /// Bytes accumulated since the last tick flush.
    buf: Vec<u8>,
    tx: mpsc::Sender<Egress>,
}

/// Registry of live WebSocket connections.
#[derive(Clone)]
pub struct Connections {
    inner: Arc<Mutex<HashMap<u64, ConnEntry>>>,
    next_id: Arc<AtomicU64>,
}

impl Connections {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Register a connection and subscribe it to tick flushes.
    pub fn register(&self, ip: IpAddr, tx: mpsc::Sender<Egress>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .lock()
            .unwrap()
            .insert(id, ConnEntry { ip, buf: Vec::new(), tx });
        id
    }

    pub fn unregister(&self, id: u64) {
        self.inner.lock().unwrap().remove(&id);
    }

    /// Append bytes to one connection's send buffer. They go out with the
    /// next tick flush.
    pub fn append(&self, id: u64, bytes: &[u8]) {
        let mut conns = self.inner.lock().unwrap();
        if let Some(entry) = conns.get_mut(&id) {
            entry.buf.extend_from_slice(bytes);
        }
    }

    /// Number of live connections from this IP.
    #[must_use]
    pub fn count_for_ip(&self, ip: IpAddr) -> usize {
        self.inner
            .lock()
            .unwrap()
            .values()
            .filter(|entry| entry.ip == ip)
            .count()
    }

    /// Total live connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    /// Ask every connection from `ip` to close with `code`. Returns how many
    /// connections were signalled.
    pub fn close_ip(&self, ip: IpAddr, code: u16) -> usize {
        let targets: Vec<mpsc::Sender<Egress>> = {
            let conns = self.inner.lock().unwrap();
            conns
                .values()
                .filter(|entry| entry.ip == ip)
                .map(|entry| entry.tx.clone())
                .collect()
        };
        for tx in &targets {
            // Best-effort: a full channel means the task is already wedged
            // and will be torn down by its own error path.
            let _ = tx.try_send(Egress::Close(code));
        }
        targets.len()
    }

    /// Flush every connection's send buffer, appending the shared broadcast
    /// blob first. Each connection receives at most one message per call.
    pub fn flush_tick(&self, broadcast: &[u8]) {
        let outgoing: Vec<(mpsc::Sender<Egress>, Vec<u8>)> = {
            let mut conns = self.inner.lock().unwrap();
            let mut out = Vec::new();
            for entry in conns.values_mut() {
                entry.buf.extend_from_slice(broadcast);
                if entry.buf.is_empty() {
                    continue;
                }
                out.push((entry.tx.clone(), std::mem::take(&mut entry.buf)));
            }
            out
        };
        for (tx, bytes) in outgoing {
            let _ = tx.try_send(Egress::Flush(bytes));
        }
    }
}

impl Default for Connections {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub core: Arc<Mutex<Core>>,
    pub connections: Connections,
    pub ip_bans: IpBans,
    /// None when `useDB` is off or storage failed to open.
    pub pool: Option<SqlitePool>,
    /// Serializes token rotation across the registry and storage so a crash
    /// or interleaving cannot leave two valid tokens for one uid.
    pub issue_gate: Arc<tokio::sync::Mutex<()>>,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config, core: Core, pool: Option<SqlitePool>) -> Self {
        Self {
            config: Arc::new(config),
            core: Arc::new(Mutex::new(core)),
            connections: Connections::new(),
            ip_bans: IpBans::new(),
            pool,
            issue_gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use crate::config::Config;

    /// Config for a 4x2 board with a one-second cooldown.
    #[must_use]
    pub fn test_config() -> Config {
        Config::from_str(r#"{"port": 0, "paintDelay": 1000, "width": 4, "height": 2}"#)
            .expect("test config should parse")
    }

    /// App state over a blank 4x2 board, no storage.
    #[must_use]
    pub fn test_app_state() -> AppState {
        let config = test_config();
        let core = Core::new(PixelStore::new(config.width, config.height));
        AppState::new(config, core, None)
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
