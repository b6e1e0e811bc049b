//! Length-prefix framing.
//!
//! Every message on the wire is a 4-byte big-endian payload length followed
//! by that many payload bytes. Both halves of the connection reject frames
//! whose declared length exceeds [`MAX_MESSAGE_SIZE`].

use crate::Error;

/// Upper bound on a single message payload (4 MB).
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Width of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Frame a payload as `[len (u32 BE)][payload]`.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, Error> {
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(Error::InvalidMessage(format!(
            "payload of {} bytes exceeds the {} byte limit",
            payload.len(),
            MAX_MESSAGE_SIZE
        )));
    }

    let mut framed = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    framed.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    framed.extend_from_slice(payload);
    Ok(framed)
}

/// Parse a length prefix, enforcing the size limit.
pub fn decode_frame_length(header: &[u8; LENGTH_PREFIX_SIZE]) -> Result<usize, Error> {
    let declared = u32::from_be_bytes(*header) as usize;
    if declared > MAX_MESSAGE_SIZE {
        return Err(Error::InvalidMessage(format!(
            "declared frame length {} exceeds the {} byte limit",
            declared, MAX_MESSAGE_SIZE
        )));
    }
    Ok(declared)
}

/// Borrow the payload out of a framed buffer.
///
/// Trailing bytes past the declared length are ignored.
pub fn extract_payload(frame: &[u8]) -> Result<&[u8], Error> {
    let header: &[u8; LENGTH_PREFIX_SIZE] = frame
        .get(..LENGTH_PREFIX_SIZE)
        .and_then(|h| h.try_into().ok())
        .ok_or_else(|| Error::InvalidMessage("frame shorter than length prefix".to_string()))?;
    let declared = decode_frame_length(header)?;

    frame
        .get(LENGTH_PREFIX_SIZE..LENGTH_PREFIX_SIZE + declared)
        .ok_or_else(|| {
            Error::InvalidMessage(format!(
                "truncated frame: declared {} payload bytes, got {}",
                declared,
                frame.len() - LENGTH_PREFIX_SIZE
            ))
        })
}
