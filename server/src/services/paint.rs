//! Paint engine — validates one paint attempt and applies it.
//!
//! DESIGN
//! ======
//! `try_paint` is infallible by construction: every outcome maps to a wire
//! [`ResultCode`], so a malicious or broken client can never surface an
//! error past the 0xFF response. The check order is fixed: uid ban, token,
//! cooldown, bounds. The cooldown entry is only written on success, so a
//! cooling or out-of-bounds attempt does not push the next allowed paint
//! further out.
//!
//! The cooldown is keyed by uid rather than token: rotating a token must
//! not reset the clock.

use packets::{Color, ResultCode};
use uuid::Uuid;

use crate::state::Core;

/// Validate and apply one paint attempt. `now_ms` is wall-clock ms.
pub fn try_paint(
    core: &mut Core,
    token: &Uuid,
    uid: u32,
    x: u32,
    y: u32,
    color: Color,
    now_ms: i64,
    paint_delay_ms: i64,
) -> ResultCode {
    if core.uid_bans.contains(&uid) {
        return ResultCode::NoPermission;
    }

    match core.tokens.lookup(token) {
        Some(bound_uid) if bound_uid == uid => {}
        _ => return ResultCode::InvalidToken,
    }

    if let Some(&last) = core.cooldowns.get(&uid) {
        if now_ms - last < paint_delay_ms {
            return ResultCode::Cooling;
        }
    }

    if !core.board.set(x, y, color) {
        return ResultCode::BadFormat;
    }

    core.cooldowns.insert(uid, now_ms);
    ResultCode::Success
}

#[cfg(test)]
#[path = "paint_test.rs"]
mod tests;
