//! Data-channel frame codec (C2): flat, length-prefixed binary frames.
//!
//! Wire layout: `[type: u8][len: u32 little-endian][payload: len bytes]`.
//! SDP payloads are zlib-deflated UTF-8 JSON of a [`crate::rtc::SessionDescription`].

use crate::rtc::SessionDescription;
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::io::{Read, Write};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum MessageType {
    Ping = 0,
    Pong = 1,
    Sdp = 2,
    LossRate = 3,
    Rtt = 4,
    Jitter = 5,
    Lock = 6,
    Unlock = 7,
}

impl MessageType {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(MessageType::Ping),
            1 => Some(MessageType::Pong),
            2 => Some(MessageType::Sdp),
            3 => Some(MessageType::LossRate),
            4 => Some(MessageType::Rtt),
            5 => Some(MessageType::Jitter),
            6 => Some(MessageType::Lock),
            7 => Some(MessageType::Unlock),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum DataChannelError {
    #[error("frame too short: {0} bytes")]
    Truncated(usize),
    #[error("unknown message type byte {0}")]
    UnknownType(u8),
    #[error("length prefix {declared} exceeds remaining {remaining} bytes")]
    LengthMismatch { declared: u32, remaining: usize },
    #[error("zlib error: {0}")]
    Zlib(#[from] std::io::Error),
    #[error("invalid SDP JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encodes a frame with an optional raw payload.
pub fn encode_message(msg_type: MessageType, payload: Option<&[u8]>) -> Vec<u8> {
    let payload = payload.unwrap_or(&[]);
    let mut out = Vec::with_capacity(1 + 4 + payload.len());
    out.push(msg_type as u8);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Decodes a frame back into its type and optional payload.
pub fn decode_message(bytes: &[u8]) -> Result<(MessageType, Option<Vec<u8>>), DataChannelError> {
    if bytes.len() < 5 {
        return Err(DataChannelError::Truncated(bytes.len()));
    }
    let msg_type = MessageType::from_byte(bytes[0]).ok_or(DataChannelError::UnknownType(bytes[0]))?;
    let len = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
    let remaining = &bytes[5..];
    if len as usize > remaining.len() {
        return Err(DataChannelError::LengthMismatch {
            declared: len,
            remaining: remaining.len(),
        });
    }
    let payload = &remaining[..len as usize];
    let payload = if payload.is_empty() {
        None
    } else {
        Some(payload.to_vec())
    };
    Ok((msg_type, payload))
}

/// Deflates the JSON-serialized SDP description (zlib, per §3).
pub fn encode_sdp(desc: &SessionDescription) -> Result<Vec<u8>, DataChannelError> {
    let json = serde_json::to_vec(desc)?;
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

/// Inflates and parses an SDP description previously produced by [`encode_sdp`].
pub fn decode_sdp(bytes: &[u8]) -> Result<SessionDescription, DataChannelError> {
    let mut decoder = flate2::read::ZlibDecoder::new(bytes);
    let mut json = Vec::new();
    decoder.read_to_end(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}

/// Encodes an f64 metric sample (LossRate/RTT/Jitter) as 8 big-endian bytes.
pub fn encode_f64(v: f64) -> [u8; 8] {
    v.to_be_bytes()
}

pub fn decode_f64(bytes: &[u8]) -> Option<f64> {
    let arr: [u8; 8] = bytes.try_into().ok()?;
    Some(f64::from_be_bytes(arr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtc::SdpType;

    #[test]
    fn round_trips_with_no_payload() {
        for t in [MessageType::Ping, MessageType::Pong, MessageType::Unlock] {
            let encoded = encode_message(t, None);
            let (decoded_type, payload) = decode_message(&encoded).unwrap();
            assert_eq!(decoded_type, t);
            assert!(payload.is_none());
        }
    }

    #[test]
    fn round_trips_with_payload() {
        let encoded = encode_message(MessageType::Lock, Some(&[1]));
        let (decoded_type, payload) = decode_message(&encoded).unwrap();
        assert_eq!(decoded_type, MessageType::Lock);
        assert_eq!(payload, Some(vec![1]));
    }

    #[test]
    fn rejects_truncated_frame() {
        assert!(decode_message(&[0, 1, 2]).is_err());
    }

    #[test]
    fn rejects_length_mismatch() {
        let mut bytes = encode_message(MessageType::Ping, Some(b"hi"));
        bytes.truncate(bytes.len() - 1);
        assert!(decode_message(&bytes).is_err());
    }

    #[test]
    fn sdp_round_trips_byte_identical() {
        let desc = SessionDescription {
            sdp_type: SdpType::Offer,
            sdp: "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\n".to_string(),
        };
        let encoded = encode_sdp(&desc).unwrap();
        let framed = encode_message(MessageType::Sdp, Some(&encoded));
        let (t, payload) = decode_message(&framed).unwrap();
        assert_eq!(t, MessageType::Sdp);
        let decoded = decode_sdp(&payload.unwrap()).unwrap();
        assert_eq!(decoded.sdp, desc.sdp);
        assert_eq!(decoded.sdp_type, desc.sdp_type);
    }

    #[test]
    fn f64_round_trips() {
        let v = 0.0234_f64;
        assert_eq!(decode_f64(&encode_f64(v)).unwrap(), v);
    }
}
