//! Shared binary wire protocol for the paintboard WS transport.
//!
//! This crate owns the wire representation used by the server and any
//! native client. All multi-byte integers are little-endian. A single
//! binary WebSocket message may concatenate several packets back to
//! back; [`PacketReader`] walks such a message packet by packet.

use thiserror::Error;

// =============================================================================
// TAGS
// =============================================================================

/// Client → server: paint one pixel. 31 bytes.
pub const TAG_PAINT: u8 = 0xFE;
/// Server → client: result of a paint request. 6 bytes.
pub const TAG_PAINT_RESULT: u8 = 0xFF;
/// Server → client: one changed pixel in a tick broadcast. 8 bytes.
pub const TAG_PIXEL_UPDATE: u8 = 0xFA;
/// Server → client heartbeat probe. 1 byte.
pub const TAG_PING: u8 = 0xFC;
/// Client → server heartbeat answer. 1 byte.
pub const TAG_PONG: u8 = 0xFB;

/// Total size of a paint request packet.
pub const PAINT_PACKET_LEN: usize = 31;
/// Total size of a paint result packet.
pub const PAINT_RESULT_LEN: usize = 6;
/// Total size of a pixel update record.
pub const PIXEL_UPDATE_LEN: usize = 8;

// =============================================================================
// TYPES
// =============================================================================

/// An RGB color, channel order R, G, B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Outcome of a paint attempt, carried in the result packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResultCode {
    Success = 0xEF,
    Cooling = 0xEE,
    InvalidToken = 0xED,
    BadFormat = 0xEC,
    NoPermission = 0xEB,
    ServerError = 0xEA,
}

impl ResultCode {
    /// Wire byte for this result.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ResultCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0xEF => Ok(Self::Success),
            0xEE => Ok(Self::Cooling),
            0xED => Ok(Self::InvalidToken),
            0xEC => Ok(Self::BadFormat),
            0xEB => Ok(Self::NoPermission),
            0xEA => Ok(Self::ServerError),
            other => Err(other),
        }
    }
}

/// A decoded paint request (tag 0xFE).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaintRequest {
    pub x: u16,
    pub y: u16,
    pub color: Color,
    /// 24-bit user id.
    pub uid: u32,
    /// Raw 128-bit token bytes, canonicalized by the server.
    pub token: [u8; 16],
    /// Client-chosen id echoed back in the result packet.
    pub request_id: u32,
}

/// One client → server packet pulled out of a binary message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packet {
    Paint(PaintRequest),
    Pong,
}

/// Error produced while walking a binary message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unknown packet tag 0x{0:02X}")]
    UnknownTag(u8),
    #[error("truncated packet 0x{tag:02X}: need {expected} bytes, have {actual}")]
    Truncated { tag: u8, expected: usize, actual: usize },
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encode a paint request. Used by clients and tests; the server only decodes.
#[must_use]
pub fn encode_paint_request(req: &PaintRequest) -> [u8; PAINT_PACKET_LEN] {
    let mut out = [0u8; PAINT_PACKET_LEN];
    out[0] = TAG_PAINT;
    out[1..3].copy_from_slice(&req.x.to_le_bytes());
    out[3..5].copy_from_slice(&req.y.to_le_bytes());
    out[5] = req.color.r;
    out[6] = req.color.g;
    out[7] = req.color.b;
    out[8..11].copy_from_slice(&req.uid.to_le_bytes()[..3]);
    out[11..27].copy_from_slice(&req.token);
    out[27..31].copy_from_slice(&req.request_id.to_le_bytes());
    out
}

/// Encode a paint result packet (tag 0xFF).
#[must_use]
pub fn encode_paint_result(request_id: u32, code: ResultCode) -> [u8; PAINT_RESULT_LEN] {
    let mut out = [0u8; PAINT_RESULT_LEN];
    out[0] = TAG_PAINT_RESULT;
    out[1..5].copy_from_slice(&request_id.to_le_bytes());
    out[5] = code.as_u8();
    out
}

/// Encode one pixel update record (tag 0xFA).
#[must_use]
pub fn encode_pixel_update(x: u16, y: u16, color: Color) -> [u8; PIXEL_UPDATE_LEN] {
    let mut out = [0u8; PIXEL_UPDATE_LEN];
    out[0] = TAG_PIXEL_UPDATE;
    out[1..3].copy_from_slice(&x.to_le_bytes());
    out[3..5].copy_from_slice(&y.to_le_bytes());
    out[5] = color.r;
    out[6] = color.g;
    out[7] = color.b;
    out
}

// =============================================================================
// DECODING
// =============================================================================

fn decode_paint(body: &[u8; PAINT_PACKET_LEN]) -> PaintRequest {
    let mut uid_bytes = [0u8; 4];
    uid_bytes[..3].copy_from_slice(&body[8..11]);
    let mut token = [0u8; 16];
    token.copy_from_slice(&body[11..27]);

    PaintRequest {
        x: u16::from_le_bytes([body[1], body[2]]),
        y: u16::from_le_bytes([body[3], body[4]]),
        color: Color::new(body[5], body[6], body[7]),
        uid: u32::from_le_bytes(uid_bytes),
        token,
        request_id: u32::from_le_bytes([body[27], body[28], body[29], body[30]]),
    }
}

/// Walks a binary message, yielding one packet at a time until the buffer
/// is consumed. Stops permanently after the first error.
pub struct PacketReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, tag: u8, len: usize) -> Result<&'a [u8], CodecError> {
        let remaining = self.buf.len() - self.pos;
        if remaining < len {
            self.pos = self.buf.len();
            return Err(CodecError::Truncated { tag, expected: len, actual: remaining });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }
}

impl Iterator for PacketReader<'_> {
    type Item = Result<Packet, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.buf.len() {
            return None;
        }

        let tag = self.buf[self.pos];
        let result = match tag {
            TAG_PONG => {
                self.pos += 1;
                Ok(Packet::Pong)
            }
            TAG_PAINT => self.take(tag, PAINT_PACKET_LEN).map(|slice| {
                let mut body = [0u8; PAINT_PACKET_LEN];
                body.copy_from_slice(slice);
                Packet::Paint(decode_paint(&body))
            }),
            other => {
                self.pos = self.buf.len();
                Err(CodecError::UnknownTag(other))
            }
        };
        Some(result)
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
