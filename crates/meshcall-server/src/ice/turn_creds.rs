//! TURN credential issuance (§4.5).
//!
//! Time-limited TURN credentials per RFC 5766's shared-secret mechanism:
//! `username = "<expiry-unix-ts>:<caller-username>"`,
//! `password = base64(HMAC-SHA1(secret, username))`.

use crate::config::IceServerEntry;
use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceServerCredential {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// Generates a time-limited `(username, password)` credential for one
/// TURN server entry. `expiry_unix_ts` is the caller-supplied expiry
/// timestamp (in seconds), not a duration, so the function is pure and
/// deterministic given identical inputs.
pub fn gen_turn_credential(
    caller_username: &str,
    secret: &str,
    expiry_unix_ts: i64,
) -> (String, String) {
    let username = format!("{expiry_unix_ts}:{caller_username}");
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(username.as_bytes());
    let password = STANDARD.encode(mac.finalize().into_bytes());
    (username, password)
}

/// Builds the final ICE server list: static entries pass through
/// unchanged; entries with neither `username` nor `credential` get a
/// freshly minted TURN credential when `static_auth_secret` is configured
/// (already validated non-empty expiry by [`crate::config::Config::load`]).
pub fn build_ice_servers(
    entries: &[IceServerEntry],
    caller_username: &str,
    static_auth_secret: &str,
    credentials_expiration_minutes: u32,
    now_unix_ts: i64,
) -> Vec<IceServerCredential> {
    let expiry = now_unix_ts + i64::from(credentials_expiration_minutes) * 60;

    entries
        .iter()
        .map(|entry| match entry {
            IceServerEntry::Url(url) => {
                if url.starts_with("turn:") || url.starts_with("turns:") {
                    if static_auth_secret.is_empty() {
                        IceServerCredential {
                            urls: vec![url.clone()],
                            username: None,
                            credential: None,
                        }
                    } else {
                        let (username, password) =
                            gen_turn_credential(caller_username, static_auth_secret, expiry);
                        IceServerCredential {
                            urls: vec![url.clone()],
                            username: Some(username),
                            credential: Some(password),
                        }
                    }
                } else {
                    IceServerCredential {
                        urls: vec![url.clone()],
                        username: None,
                        credential: None,
                    }
                }
            }
            IceServerEntry::Full {
                urls,
                username,
                credential,
            } => {
                if username.is_some() || credential.is_some() || static_auth_secret.is_empty() {
                    IceServerCredential {
                        urls: urls.clone(),
                        username: username.clone(),
                        credential: credential.clone(),
                    }
                } else {
                    let (username, password) =
                        gen_turn_credential(caller_username, static_auth_secret, expiry);
                    IceServerCredential {
                        urls: urls.clone(),
                        username: Some(username),
                        credential: Some(password),
                    }
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_inputs() {
        let a = gen_turn_credential("alice", "sekret", 1_700_000_000);
        let b = gen_turn_credential("alice", "sekret", 1_700_000_000);
        assert_eq!(a, b);
    }

    #[test]
    fn username_embeds_expiry() {
        let (username, _) = gen_turn_credential("alice", "sekret", 1_700_000_000);
        assert_eq!(username, "1700000000:alice");
    }

    #[test]
    fn different_secret_changes_password() {
        let (_, p1) = gen_turn_credential("alice", "sekret-a", 1_700_000_000);
        let (_, p2) = gen_turn_credential("alice", "sekret-b", 1_700_000_000);
        assert_ne!(p1, p2);
    }

    #[test]
    fn static_entries_pass_through_unchanged() {
        let entries = vec![IceServerEntry::Full {
            urls: vec!["turn:example.com".into()],
            username: Some("fixed".into()),
            credential: Some("fixedpass".into()),
        }];
        let out = build_ice_servers(&entries, "alice", "sekret", 60, 0);
        assert_eq!(out[0].username.as_deref(), Some("fixed"));
    }
}
