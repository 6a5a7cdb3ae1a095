//! Group/Call/Session registry (C7) and the session arena (§9 design notes).
//!
//! The naive `Group owns Call owns Session` tree would force a session
//! that only knows its own ID to walk back up through its parents to
//! find itself. Instead the server keeps a flat `sessionID -> (groupID,
//! callID)` arena alongside the tree, so routers reach a session
//! directly without a parent walk, while the tree remains the source of
//! truth for membership and teardown ordering.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::session::Session;
use super::track_forwarding::TrackForwarder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub group_id: String,
    pub call_id: String,
    pub session_id: String,
}

/// A call: a set of sessions plus at most one designated screen-sharer (§3).
pub struct Call {
    pub id: String,
    pub sessions: RwLock<HashMap<String, Arc<Session>>>,
    pub screen_session_id: RwLock<Option<String>>,
    /// Every live `TrackForwarder` in this call, keyed by its local track
    /// ID, so a subscriber's RTCP feedback loop can map a PLI referring to
    /// an outbound SSRC back to the forwarder that owns it (§4.3).
    forwarders: RwLock<HashMap<String, Arc<TrackForwarder>>>,
    /// AND of every session's `av1Support` join flag seen so far (§4.2):
    /// starts true, latched false the first time a session without AV1
    /// support joins.
    av1_support: RwLock<bool>,
}

impl Call {
    fn new(id: String) -> Self {
        Self {
            id,
            sessions: RwLock::new(HashMap::new()),
            screen_session_id: RwLock::new(None),
            forwarders: RwLock::new(HashMap::new()),
            av1_support: RwLock::new(true),
        }
    }

    #[cfg(test)]
    pub(crate) fn new_for_tests(id: String) -> Self {
        Self::new(id)
    }

    pub async fn get_session(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Designates `session_id` as the call's screen-sharer. No-op if
    /// already set to the same session (§4.1 `ScreenOnMessage`).
    pub async fn set_screen_session(&self, session_id: &str) {
        let mut current = self.screen_session_id.write().await;
        if current.as_deref() != Some(session_id) {
            *current = Some(session_id.to_string());
        }
    }

    /// Clears the screen-sharer only if `session_id` is the one currently
    /// holding it; returns true if it was cleared (§4.1 `ScreenOffMessage`).
    pub async fn clear_screen_session(&self, session_id: &str) -> bool {
        let mut current = self.screen_session_id.write().await;
        if current.as_deref() == Some(session_id) {
            *current = None;
            true
        } else {
            false
        }
    }

    /// Registers a freshly-announced forwarder so its local track ID can
    /// be mapped back to it from a subscriber's RTCP feedback loop (§4.3).
    pub async fn register_forwarder(&self, track_id: String, forwarder: Arc<TrackForwarder>) {
        self.forwarders.write().await.insert(track_id, forwarder);
    }

    pub async fn get_forwarder(&self, track_id: &str) -> Option<Arc<TrackForwarder>> {
        self.forwarders.read().await.get(track_id).cloned()
    }

    /// Whether every session that has joined this call so far advertised
    /// `av1Support` (§4.2). Read before building a new session's peer
    /// connection, then narrowed by `record_av1_support` once that
    /// session's own flag is known.
    pub async fn all_av1_support(&self) -> bool {
        *self.av1_support.read().await
    }

    /// Narrows the call's AV1 eligibility if `supported` is false; never
    /// widens it back once narrowed (§4.2's "all sessions" is monotonic).
    pub async fn record_av1_support(&self, supported: bool) {
        if !supported {
            *self.av1_support.write().await = false;
        }
    }

    /// Invokes `cb` for every session except `skip_user_id`. The call's
    /// read lock is held only while snapshotting the session list, not
    /// while `cb` runs, to avoid deadlocking a callback that re-enters
    /// the registry (§4.10).
    pub async fn iter_sessions_except<F, Fut>(&self, skip_user_id: Option<&str>, mut cb: F)
    where
        F: FnMut(Arc<Session>) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        let snapshot: Vec<Arc<Session>> = {
            let sessions = self.sessions.read().await;
            sessions
                .values()
                .filter(|s| skip_user_id != Some(s.user_id.as_str()))
                .cloned()
                .collect()
        };
        for session in snapshot {
            cb(session).await;
        }
    }
}

/// A tenant: a set of calls, created lazily and destroyed when the last
/// call empties (§3).
pub struct Group {
    pub id: String,
    pub calls: RwLock<HashMap<String, Arc<Call>>>,
}

impl Group {
    fn new(id: String) -> Self {
        Self {
            id,
            calls: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_call(&self, call_id: &str) -> Option<Arc<Call>> {
        self.calls.read().await.get(call_id).cloned()
    }

    pub async fn is_empty(&self) -> bool {
        self.calls.read().await.is_empty()
    }
}

/// Owns the `groupID -> callID -> sessionID` tree plus the flat session
/// arena (§9). All mutation goes top-down and bottom-up within a single
/// call, never holding two layers' locks across an `.await` on a
/// callback.
pub struct Registry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
    arena: RwLock<HashMap<String, SessionKey>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
            arena: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_group(&self, group_id: &str) -> Option<Arc<Group>> {
        self.groups.read().await.get(group_id).cloned()
    }

    pub async fn get_call(&self, group_id: &str, call_id: &str) -> Option<Arc<Call>> {
        self.get_group(group_id).await?.get_call(call_id).await
    }

    pub async fn get_session(&self, group_id: &str, call_id: &str, session_id: &str) -> Option<Arc<Session>> {
        self.get_call(group_id, call_id).await?.get_session(session_id).await
    }

    /// Looks a session up by ID alone, via the arena, without needing its
    /// group/call (§9).
    pub async fn get_session_by_id(&self, session_id: &str) -> Option<Arc<Session>> {
        let key = self.arena.read().await.get(session_id).cloned()?;
        self.get_session(&key.group_id, &key.call_id, &key.session_id).await
    }

    pub async fn session_key(&self, session_id: &str) -> Option<SessionKey> {
        self.arena.read().await.get(session_id).cloned()
    }

    /// Inserts `session` under `(groupID, callID)`, creating the group and
    /// call lazily. Returns `(session, created)` where `created` is true
    /// if this call was lazily created by this insertion.
    pub async fn add_session(
        &self,
        group_id: &str,
        call_id: &str,
        session: Arc<Session>,
    ) -> (Arc<Session>, bool) {
        let group = {
            let mut groups = self.groups.write().await;
            groups
                .entry(group_id.to_string())
                .or_insert_with(|| Arc::new(Group::new(group_id.to_string())))
                .clone()
        };

        let (call, created) = {
            let mut calls = group.calls.write().await;
            if let Some(call) = calls.get(call_id) {
                (call.clone(), false)
            } else {
                let call = Arc::new(Call::new(call_id.to_string()));
                calls.insert(call_id.to_string(), call.clone());
                (call, true)
            }
        };

        call.sessions
            .write()
            .await
            .insert(session.session_id.clone(), session.clone());

        self.arena.write().await.insert(
            session.session_id.clone(),
            SessionKey {
                group_id: group_id.to_string(),
                call_id: call_id.to_string(),
                session_id: session.session_id.clone(),
            },
        );

        (session, created)
    }

    /// Removes a session from the tree bottom-up: session out of call,
    /// call out of group if now empty, group out of the registry if now
    /// empty. Returns the call it was removed from, if any, so callers
    /// can run call-level cleanup (clearing `screenSession`, etc).
    pub async fn remove_session(&self, session_id: &str) -> Option<Arc<Call>> {
        let key = self.arena.write().await.remove(session_id)?;

        let group = self.get_group(&key.group_id).await?;
        let call = group.get_call(&key.call_id).await?;

        call.sessions.write().await.remove(session_id);
        call.clear_screen_session(session_id).await;

        if call.is_empty().await {
            group.calls.write().await.remove(&key.call_id);
        }
        if group.is_empty().await {
            self.groups.write().await.remove(&key.group_id);
        }

        Some(call)
    }

    pub async fn group_count(&self) -> usize {
        self.groups.read().await.len()
    }

    pub async fn session_count(&self) -> usize {
        self.arena.read().await.len()
    }

    /// Snapshot of every live session ID, used by drain-aware shutdown
    /// (§5 "Stop is drain-aware").
    pub async fn all_session_ids(&self) -> Vec<String> {
        self.arena.read().await.keys().cloned().collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
