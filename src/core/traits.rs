//! Core traits for the domain layer
//!
//! These traits define the interfaces that domain components depend on,
//! allowing infrastructure to be injected and tests to use mocks.

use super::session_store::Session;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Session storage abstraction
///
/// Sessions are handed out as owned snapshots; callers mutate a copy and
/// write it back with [`SessionStore::save`].
pub trait SessionStore: Send + Sync {
    /// Create and store a new empty session with a generated id
    fn create(&self) -> Session;

    /// Load a session by id
    fn get(&self, id: &str) -> Option<Session>;

    /// Insert or replace a session
    fn save(&self, session: Session);

    /// Delete a session by id, returning whether it existed
    fn delete(&self, id: &str) -> bool;

    /// Remove every session created before `cutoff`
    fn remove_created_before(&self, cutoff: DateTime<Utc>) -> usize;

    /// Number of stored sessions
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load `id`, or create it when absent. `None` always creates a new
    /// session with a generated id.
    fn get_or_create(&self, id: Option<&str>) -> Session {
        match id {
            Some(id) => self.get(id).unwrap_or_else(|| {
                let session = Session::with_id(id);
                self.save(session.clone());
                session
            }),
            None => self.create(),
        }
    }

    /// Remove sessions older than `max_age`
    fn sweep(&self, max_age: Duration) -> usize {
        let Ok(age) = chrono::Duration::from_std(max_age) else {
            return 0;
        };
        match Utc::now().checked_sub_signed(age) {
            Some(cutoff) => self.remove_created_before(cutoff),
            None => 0,
        }
    }
}
