//! WebSocket handler — paint ingress and tick-buffered egress.
//!
//! DESIGN
//! ======
//! Each connection is one task owning its socket. Ingress packets are
//! decoded inline ([`packets::PacketReader`] loops over concatenated
//! packets in a single binary message) and answered by appending bytes to
//! the connection's send buffer in the registry; the tick scheduler flushes
//! that buffer through the egress channel, so the socket sees at most one
//! write per tick.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → ban/limit checks → register in the connection registry
//! 2. select! over socket ingress, egress channel, heartbeat timers, idle
//! 3. Any protocol violation closes the socket with the matching code
//! 4. Unregister on exit
//!
//! ERROR HANDLING
//! ==============
//! A broken frame takes down its own connection only. Paint semantic
//! failures are normal 0xFF replies and never close the socket.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use packets::{Packet, PacketReader, ResultCode};
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::rate_limit::{PacketWindow, RATE_LIMIT_BAN};
use crate::services::paint;
use crate::state::{now_ms, AppState, Egress};

// Close codes used by the protocol.
const CLOSE_GOING_AWAY: u16 = 1001;
const CLOSE_PROTOCOL_ERROR: u16 = 1002;
const CLOSE_POLICY: u16 = 1008;
const CLOSE_TRY_AGAIN: u16 = 1013;

/// Drop connections silent for this long.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// How long a ping may go unanswered.
const PONG_TIMEOUT: Duration = Duration::from_secs(3);

const PING_DELAY_MIN_MS: u64 = 1_000;
const PING_DELAY_MAX_MS: u64 = 30_000;

/// Per-connection egress channel depth. One flush per tick means this only
/// fills when the socket writer is badly behind.
const EGRESS_QUEUE: usize = 64;

// =============================================================================
// HEARTBEAT
// =============================================================================

/// Uniform random delay before the next ping, in [1s, 30s).
fn random_ping_delay() -> Duration {
    Duration::from_millis(rand::rng().random_range(PING_DELAY_MIN_MS..PING_DELAY_MAX_MS))
}

/// Ping/pong state machine for one connection.
struct Heartbeat {
    waiting_pong: bool,
    next_ping: Instant,
    pong_deadline: Option<Instant>,
}

impl Heartbeat {
    fn new(now: Instant) -> Self {
        Self {
            waiting_pong: false,
            next_ping: now + random_ping_delay(),
            pong_deadline: None,
        }
    }

    /// The ping timer fired: start waiting for the answer.
    fn fire_ping(&mut self, now: Instant) {
        self.waiting_pong = true;
        self.pong_deadline = Some(now + PONG_TIMEOUT);
    }

    /// A pong arrived. Returns false when no ping was outstanding, which is
    /// a protocol violation.
    fn on_pong(&mut self, now: Instant) -> bool {
        if !self.waiting_pong {
            return false;
        }
        self.waiting_pong = false;
        self.pong_deadline = None;
        self.next_ping = now + random_ping_delay();
        true
    }
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state, addr.ip()))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, ip: IpAddr) {
    if state.ip_bans.is_banned(ip) {
        close_with(&mut socket, CLOSE_POLICY, "ip banned").await;
        return;
    }

    let limit = state.config.max_web_socket_per_ip as usize;
    if limit > 0 && state.connections.count_for_ip(ip) >= limit {
        state.ip_bans.ban(ip, Duration::from_millis(state.config.ban_duration));
        let closed = state.connections.close_ip(ip, CLOSE_POLICY);
        warn!(%ip, closed, "connection limit reached; ip banned");
        close_with(&mut socket, CLOSE_POLICY, "connection limit").await;
        return;
    }

    let (tx, mut rx) = mpsc::channel::<Egress>(EGRESS_QUEUE);
    let conn_id = state.connections.register(ip, tx);
    info!(conn_id, %ip, "ws: client connected");

    let mut seen_tokens: HashSet<Uuid> = HashSet::new();
    let close = connection_loop(&mut socket, &state, conn_id, ip, &mut rx, &mut seen_tokens).await;

    state.connections.unregister(conn_id);
    if let Some((code, reason)) = close {
        close_with(&mut socket, code, reason).await;
    }
    if state.config.enable_token_counting {
        info!(conn_id, distinct_tokens = seen_tokens.len(), "ws: token count");
    }
    info!(conn_id, %ip, "ws: client disconnected");
}

/// Drive one connection until it closes. Returns the close code to send, or
/// None when the peer is already gone.
async fn connection_loop(
    socket: &mut WebSocket,
    state: &AppState,
    conn_id: u64,
    ip: IpAddr,
    rx: &mut mpsc::Receiver<Egress>,
    seen_tokens: &mut HashSet<Uuid>,
) -> Option<(u16, &'static str)> {
    let mut heartbeat = Heartbeat::new(Instant::now());
    let mut window = PacketWindow::new(Instant::now().into_std());
    let mut idle_deadline = Instant::now() + IDLE_TIMEOUT;

    loop {
        // select! evaluates the disabled sleep too; give it a harmless
        // deadline when no pong is outstanding.
        let pong_deadline = heartbeat
            .pong_deadline
            .unwrap_or_else(|| Instant::now() + PONG_TIMEOUT);

        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { return None };
                idle_deadline = Instant::now() + IDLE_TIMEOUT;
                match msg {
                    Message::Binary(data) => {
                        if let Some(close) =
                            process_frame(state, conn_id, ip, &data, &mut window, &mut heartbeat, seen_tokens)
                        {
                            return Some(close);
                        }
                    }
                    Message::Text(_) => return Some((CLOSE_PROTOCOL_ERROR, "binary frames only")),
                    Message::Close(_) => return None,
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
            egress = rx.recv() => {
                match egress {
                    Some(Egress::Flush(bytes)) => {
                        if socket.send(Message::Binary(bytes.into())).await.is_err() {
                            return None;
                        }
                    }
                    Some(Egress::Close(code)) => return Some((code, "closed by server")),
                    None => return None,
                }
            }
            _ = tokio::time::sleep_until(heartbeat.next_ping), if !heartbeat.waiting_pong => {
                heartbeat.fire_ping(Instant::now());
                state.connections.append(conn_id, &[packets::TAG_PING]);
            }
            _ = tokio::time::sleep_until(pong_deadline), if heartbeat.waiting_pong => {
                debug!(conn_id, "pong deadline expired");
                return Some((CLOSE_GOING_AWAY, "pong timeout"));
            }
            _ = tokio::time::sleep_until(idle_deadline) => {
                return Some((CLOSE_GOING_AWAY, "idle timeout"));
            }
        }
    }
}

// =============================================================================
// INGRESS
// =============================================================================

/// Decode every packet in one binary message. Returns a close code on a
/// protocol or policy violation, None to keep the connection open.
fn process_frame(
    state: &AppState,
    conn_id: u64,
    ip: IpAddr,
    data: &[u8],
    window: &mut PacketWindow,
    heartbeat: &mut Heartbeat,
    seen_tokens: &mut HashSet<Uuid>,
) -> Option<(u16, &'static str)> {
    for packet in PacketReader::new(data) {
        if !window.record(std::time::Instant::now(), state.config.max_packet_per_second) {
            state.ip_bans.ban(ip, RATE_LIMIT_BAN);
            let closed = state.connections.close_ip(ip, CLOSE_TRY_AGAIN);
            warn!(conn_id, %ip, closed, "packet rate exceeded; ip banned");
            return Some((CLOSE_TRY_AGAIN, "packet rate exceeded"));
        }

        match packet {
            Ok(Packet::Pong) => {
                if !heartbeat.on_pong(Instant::now()) {
                    return Some((CLOSE_PROTOCOL_ERROR, "unexpected pong"));
                }
            }
            Ok(Packet::Paint(req)) => {
                handle_paint(state, conn_id, &req, seen_tokens);
            }
            Err(e) => {
                warn!(conn_id, error = %e, "ws: malformed frame");
                return Some((CLOSE_PROTOCOL_ERROR, "malformed packet"));
            }
        }
    }
    None
}

/// Run one paint attempt and queue the 0xFF reply.
fn handle_paint(
    state: &AppState,
    conn_id: u64,
    req: &packets::PaintRequest,
    seen_tokens: &mut HashSet<Uuid>,
) {
    let token = Uuid::from_bytes(req.token);
    if state.config.enable_token_counting && seen_tokens.insert(token) {
        debug!(conn_id, distinct_tokens = seen_tokens.len(), "ws: new token observed");
    }

    // A poisoned core lock is the one internal fault a client can observe;
    // it maps to ServerError rather than killing the task.
    let code = match state.core.lock() {
        Ok(mut core) => paint::try_paint(
            &mut core,
            &token,
            req.uid,
            u32::from(req.x),
            u32::from(req.y),
            req.color,
            now_ms(),
            state.config.paint_delay as i64,
        ),
        Err(_) => ResultCode::ServerError,
    };

    state
        .connections
        .append(conn_id, &packets::encode_paint_result(req.request_id, code));
}

// =============================================================================
// HELPERS
// =============================================================================

async fn close_with(socket: &mut WebSocket, code: u16, reason: &'static str) {
    let frame = CloseFrame { code, reason: reason.into() };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
