//! The `rtc` control envelope carried inside a [`crate::ws::ClientEnvelope`]
//! or [`crate::ws::ServerEnvelope`] (§3, §6).

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Discriminates the payload carried in [`Message::data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum RtcMessageType {
    Ice = 1,
    Sdp = 2,
    Mute = 3,
    Unmute = 4,
    ScreenOn = 5,
    ScreenOff = 6,
    VoiceOn = 7,
    VoiceOff = 8,
}

/// The control envelope, binary-packed as msgpack on the wire (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "groupID")]
    pub group_id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "callID")]
    pub call_id: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
    #[serde(rename = "type")]
    pub msg_type: RtcMessageType,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

impl Message {
    /// Non-empty `sessionID` and a recognized `type` (§4.1 inbound validation).
    pub fn is_well_formed(&self) -> bool {
        !self.session_id.is_empty()
    }
}

/// SDP offer/answer carried as JSON inside [`RtcMessageType::Sdp`] data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// ICE candidate carried as JSON inside [`RtcMessageType::Ice`] data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceCandidateInit {
    pub candidate: String,
    #[serde(rename = "sdpMid", skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_round_trips_through_msgpack() {
        let msg = Message {
            group_id: "g".into(),
            user_id: "u".into(),
            call_id: "c".into(),
            session_id: "s1".into(),
            msg_type: RtcMessageType::Sdp,
            data: vec![1, 2, 3],
        };
        let bytes = rmp_serde::to_vec_named(&msg).unwrap();
        let back: Message = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(back.session_id, "s1");
        assert_eq!(back.msg_type, RtcMessageType::Sdp);
        assert_eq!(back.data, vec![1, 2, 3]);
    }

    #[test]
    fn rejects_empty_session_id() {
        let msg = Message {
            group_id: "g".into(),
            user_id: "u".into(),
            call_id: "c".into(),
            session_id: "".into(),
            msg_type: RtcMessageType::Ice,
            data: vec![],
        };
        assert!(!msg.is_well_formed());
    }
}
