//! Tracking of in-flight model requests per session
//!
//! At most one request is active per session. Starting a new one cancels
//! the previous request, and a [`RequestGuard`] clears its own entry when
//! the request finishes, however it finishes.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct ActiveRequest {
    request_id: String,
    started_at: DateTime<Utc>,
    started: Instant,
    token: CancellationToken,
}

/// Snapshot of a session's request state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStatus {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Elapsed time in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
}

impl RequestStatus {
    fn idle() -> Self {
        Self {
            active: false,
            request_id: None,
            duration: None,
            start_time: None,
        }
    }
}

/// Registry of active requests keyed by session id
#[derive(Debug, Default)]
pub struct ActiveRequests {
    requests: DashMap<String, ActiveRequest>,
}

impl ActiveRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new request for `session_id`, cancelling any request
    /// already running for that session.
    pub fn begin(self: &Arc<Self>, session_id: &str) -> RequestGuard {
        let request_id = uuid::Uuid::new_v4().to_string();
        let token = CancellationToken::new();
        let request = ActiveRequest {
            request_id: request_id.clone(),
            started_at: Utc::now(),
            started: Instant::now(),
            token: token.clone(),
        };

        if let Some(previous) = self.requests.insert(session_id.to_string(), request) {
            previous.token.cancel();
            tracing::info!(
                "Superseded request {} for session {}",
                previous.request_id,
                session_id
            );
        }

        RequestGuard {
            registry: Arc::clone(self),
            session_id: session_id.to_string(),
            request_id,
            token,
        }
    }

    /// Cancel the active request for `session_id`.
    ///
    /// Returns `false` when nothing was running.
    pub fn cancel(&self, session_id: &str) -> bool {
        match self.requests.remove(session_id) {
            Some((_, request)) => {
                request.token.cancel();
                tracing::info!(
                    "Cancelled request {} for session {}",
                    request.request_id,
                    session_id
                );
                true
            }
            None => false,
        }
    }

    pub fn status(&self, session_id: &str) -> RequestStatus {
        match self.requests.get(session_id) {
            Some(request) => RequestStatus {
                active: true,
                request_id: Some(request.request_id.clone()),
                duration: Some(request.started.elapsed().as_millis() as u64),
                start_time: Some(request.started_at),
            },
            None => RequestStatus::idle(),
        }
    }

    fn finish(&self, session_id: &str, request_id: &str) {
        self.requests
            .remove_if(session_id, |_, request| request.request_id == request_id);
    }
}

/// Handle for one in-flight request; removes its registry entry on drop
/// unless a newer request has replaced it.
#[derive(Debug)]
pub struct RequestGuard {
    registry: Arc<ActiveRequests>,
    session_id: String,
    request_id: String,
    token: CancellationToken,
}

impl RequestGuard {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.registry.finish(&self.session_id, &self.request_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_clears_entry_on_drop() {
        let registry = Arc::new(ActiveRequests::new());
        {
            let guard = registry.begin("s1");
            let status = registry.status("s1");
            assert!(status.active);
            assert_eq!(status.request_id.as_deref(), Some(guard.request_id()));
            assert!(status.start_time.is_some());
        }
        assert!(!registry.status("s1").active);
        assert_eq!(registry.status("s1"), RequestStatus::idle());
    }

    #[test]
    fn new_request_supersedes_previous() {
        let registry = Arc::new(ActiveRequests::new());
        let first = registry.begin("s1");
        let second = registry.begin("s1");

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert_eq!(registry.requests.len(), 1);

        // The superseded guard must not remove the newer entry
        drop(first);
        assert_eq!(
            registry.status("s1").request_id.as_deref(),
            Some(second.request_id())
        );
        drop(second);
        assert!(registry.requests.is_empty());
    }

    #[test]
    fn cancel_signals_and_removes() {
        let registry = Arc::new(ActiveRequests::new());
        let guard = registry.begin("s1");
        assert!(registry.cancel("s1"));
        assert!(guard.is_cancelled());
        assert!(!registry.status("s1").active);
        assert!(!registry.cancel("s1"));
    }

    #[test]
    fn sessions_are_independent() {
        let registry = Arc::new(ActiveRequests::new());
        let a = registry.begin("a");
        let _b = registry.begin("b");
        assert!(registry.cancel("b"));
        assert!(!a.is_cancelled());
        assert!(registry.status("a").active);
    }

    #[test]
    fn idle_status_serializes_without_optional_fields() {
        let json = serde_json::to_value(RequestStatus::idle()).unwrap();
        assert_eq!(json, serde_json::json!({ "active": false }));
    }
}
