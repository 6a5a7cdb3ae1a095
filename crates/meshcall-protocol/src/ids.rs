//! Identifiers: local track naming (§4.12) and the random session/track IDs.

use rand::Rng;
use serde::{Deserialize, Serialize};

const BASE36_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// A cryptographically-random 26 character base-36 identifier, used for
/// session IDs and as the random suffix of a local track ID.
pub fn new_random_id() -> String {
    let mut rng = rand::thread_rng();
    (0..26)
        .map(|_| {
            let idx = rng.gen_range(0..BASE36_ALPHABET.len());
            BASE36_ALPHABET[idx] as char
        })
        .collect()
}

/// The kind of a local (outbound) track, encoded as the first token of its ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackType {
    Voice,
    Screen,
    ScreenAudio,
}

impl TrackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackType::Voice => "voice",
            TrackType::Screen => "screen",
            TrackType::ScreenAudio => "screen-audio",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "voice" => Some(TrackType::Voice),
            "screen" => Some(TrackType::Screen),
            "screen-audio" => Some(TrackType::ScreenAudio),
            _ => None,
        }
    }
}

/// Builds a local track ID as `"{type}_{baseID}_{8-char suffix}"`.
pub fn new_track_id(track_type: TrackType, base_id: &str) -> String {
    let suffix: String = new_random_id().chars().take(8).collect();
    format!("{}_{}_{}", track_type.as_str(), base_id, suffix)
}

/// Accepts iff `type` is a known [`TrackType`] and the ID splits into exactly
/// three non-empty, underscore-separated tokens.
pub fn is_valid_track_id(id: &str) -> bool {
    let parts: Vec<&str> = id.split('_').collect();
    if parts.len() != 3 {
        return false;
    }
    if parts.iter().any(|p| p.is_empty()) {
        return false;
    }
    TrackType::from_str(parts[0]).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_id_is_26_chars_base36() {
        let id = new_random_id();
        assert_eq!(id.chars().count(), 26);
        assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn track_id_has_three_tokens() {
        let id = new_track_id(TrackType::Screen, "sess1");
        assert!(is_valid_track_id(&id));
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts[0], "screen");
        assert_eq!(parts[1], "sess1");
        assert_eq!(parts[2].len(), 8);
    }

    #[test]
    fn rejects_unknown_type() {
        assert!(!is_valid_track_id("video_sess1_abcdefgh"));
    }

    #[test]
    fn rejects_wrong_token_count() {
        assert!(!is_valid_track_id("voice_sess1"));
        assert!(!is_valid_track_id("voice_sess1_abc_def"));
    }

    #[test]
    fn rejects_empty_token() {
        assert!(!is_valid_track_id("voice__abcdefgh"));
    }
}
