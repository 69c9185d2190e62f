use bytes::{Buf, Bytes, BytesMut};

/// Bytes occupied by the length prefix plus the type byte.
pub const FRAME_HEADER_LEN: usize = 5;

/// One length-prefixed typed message peeled off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub msg_type: u8,
    pub payload: Bytes,
}

/// Try to peel one complete frame off the front of `buf`.
///
/// The length prefix is a big-endian u32 counting the type byte plus the
/// payload, so a frame occupies `size + 4` bytes total. Returns `None`
/// while the buffer holds less than one complete frame; the caller keeps
/// accumulating. A zero-length prefix is malformed but must not wedge the
/// stream: it is consumed as a type-only frame with an empty payload.
///
/// All framing state lives in the caller's buffer.
pub fn carve(buf: &mut BytesMut) -> Option<Frame> {
    if buf.len() < FRAME_HEADER_LEN {
        return None;
    }
    let size = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if buf.len() < size + 4 {
        return None;
    }

    let msg_type = buf[4];
    let total = (size + 4).max(FRAME_HEADER_LEN);
    let mut frame = buf.split_to(total);
    frame.advance(FRAME_HEADER_LEN);
    Some(Frame {
        msg_type,
        payload: frame.freeze(),
    })
}
