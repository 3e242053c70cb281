//! Session Management Module
//!
//! Holds the authoritative session state, its persisted mirror, and the
//! manager that moves between them.

pub mod manager;
pub mod storage;
pub mod types;

pub use manager::{SessionManager, SessionSettings};
pub use storage::{FileSessionStore, MemorySessionStore, TOKEN_KEY, USER_KEY};
pub use types::*;
