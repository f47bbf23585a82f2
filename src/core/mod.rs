//! Core domain modules
//!
//! Session state, in-flight request tracking and the error types the chat
//! pipeline reports to its callers.

pub mod errors;
pub mod requests;
pub mod session_store;
pub mod traits;

pub use errors::ChatError;
pub use requests::{ActiveRequests, RequestGuard, RequestStatus};
pub use session_store::{spawn_sweeper, InMemorySessionStore, Session};
pub use traits::SessionStore;
