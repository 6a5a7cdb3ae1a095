//! WebSocket envelope between an integrator and the control plane (§6).
//!
//! Wire form is a two-element msgpack array: `[type: string, data: any]`.
//! Each `type` selects the shape of `data`; unrecognized payloads for a known
//! type are a protocol error (§7.4) and are logged + discarded, never fatal.

use crate::rtc::Message as RtcMessage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("envelope is not a [type, data] pair")]
    NotAPair,
    #[error("unknown envelope type {0:?}")]
    UnknownType(String),
    #[error("data payload did not match type {0:?}: {1}")]
    BadPayload(String, rmpv::ext::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinData {
    #[serde(rename = "groupID")]
    pub group_id: String,
    #[serde(rename = "callID")]
    pub call_id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
    #[serde(default)]
    pub props: HashMap<String, serde_json::Value>,
}

impl JoinData {
    /// `dcSignaling=true` in props prefers the data channel over the
    /// WebSocket for SDP once the data channel is open (§4.6).
    pub fn wants_dc_signaling(&self) -> bool {
        self.props
            .get("dcSignaling")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn av1_support(&self) -> bool {
        self.props
            .get("av1Support")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveData {
    #[serde(rename = "sessionID")]
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloData {
    #[serde(rename = "connID")]
    pub conn_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectData {
    #[serde(rename = "sessionID")]
    pub session_id: String,
    #[serde(rename = "connID")]
    pub conn_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadData {
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseData {
    #[serde(rename = "sessionID")]
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorData {
    pub message: String,
}

macro_rules! envelope_enum {
    ($name:ident { $($variant:ident($ty:ty) => $tag:literal),+ $(,)? }) => {
        #[derive(Debug, Clone)]
        pub enum $name {
            $($variant($ty)),+
        }

        impl $name {
            pub fn type_tag(&self) -> &'static str {
                match self {
                    $($name::$variant(_) => $tag),+
                }
            }

            pub fn to_value_pair(&self) -> Result<(String, rmpv::Value), rmpv::ext::Error> {
                let value = match self {
                    $($name::$variant(d) => rmpv::ext::to_value(d)?),+
                };
                Ok((self.type_tag().to_string(), value))
            }

            pub fn encode_msgpack(&self) -> Result<Vec<u8>, EnvelopeError> {
                let (tag, value) = self
                    .to_value_pair()
                    .map_err(|e| EnvelopeError::BadPayload(self.type_tag().to_string(), e))?;
                let pair = rmpv::Value::Array(vec![rmpv::Value::String(tag.into()), value]);
                let mut buf = Vec::new();
                rmpv::encode::write_value(&mut buf, &pair).expect("encoding to Vec is infallible");
                Ok(buf)
            }

            pub fn decode_msgpack(bytes: &[u8]) -> Result<Self, EnvelopeError> {
                let value = rmpv::decode::read_value(&mut &bytes[..])
                    .map_err(|_| EnvelopeError::NotAPair)?;
                let items = match value {
                    rmpv::Value::Array(items) if items.len() == 2 => items,
                    _ => return Err(EnvelopeError::NotAPair),
                };
                let tag = items[0].as_str().ok_or(EnvelopeError::NotAPair)?.to_string();
                let data = items[1].clone();
                match tag.as_str() {
                    $($tag => {
                        let parsed: $ty = rmpv::ext::from_value(data)
                            .map_err(|e| EnvelopeError::BadPayload(tag.clone(), e))?;
                        Ok($name::$variant(parsed))
                    })+
                    other => Err(EnvelopeError::UnknownType(other.to_string())),
                }
            }
        }
    };
}

envelope_enum!(ClientEnvelope {
    Join(JoinData) => "join",
    Leave(LeaveData) => "leave",
    Rtc(RtcMessage) => "rtc",
    Hello(HelloData) => "hello",
    Reconnect(ReconnectData) => "reconnect",
    Vad(VadData) => "vad",
    Close(CloseData) => "close",
});

envelope_enum!(ServerEnvelope {
    Rtc(RtcMessage) => "rtc",
    Hello(HelloData) => "hello",
    Vad(VadData) => "vad",
    Error(ErrorData) => "error",
    Close(CloseData) => "close",
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtc::RtcMessageType;

    #[test]
    fn join_round_trips() {
        let mut props = HashMap::new();
        props.insert("dcSignaling".to_string(), serde_json::Value::Bool(true));
        let env = ClientEnvelope::Join(JoinData {
            group_id: "g".into(),
            call_id: "c".into(),
            user_id: "u".into(),
            session_id: "s1".into(),
            props,
        });
        let bytes = env.encode_msgpack().unwrap();
        let back = ClientEnvelope::decode_msgpack(&bytes).unwrap();
        match back {
            ClientEnvelope::Join(d) => {
                assert_eq!(d.session_id, "s1");
                assert!(d.wants_dc_signaling());
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn rtc_envelope_preserves_binary_payload() {
        let msg = RtcMessage {
            group_id: "g".into(),
            user_id: "u".into(),
            call_id: "c".into(),
            session_id: "s1".into(),
            msg_type: RtcMessageType::Ice,
            data: vec![9, 8, 7],
        };
        let env = ClientEnvelope::Rtc(msg);
        let bytes = env.encode_msgpack().unwrap();
        let back = ClientEnvelope::decode_msgpack(&bytes).unwrap();
        match back {
            ClientEnvelope::Rtc(m) => assert_eq!(m.data, vec![9, 8, 7]),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn unknown_type_is_an_error() {
        let pair = rmpv::Value::Array(vec![
            rmpv::Value::String("bogus".into()),
            rmpv::Value::Nil,
        ]);
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &pair).unwrap();
        assert!(matches!(
            ClientEnvelope::decode_msgpack(&buf),
            Err(EnvelopeError::UnknownType(_))
        ));
    }
}
