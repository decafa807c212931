//! Session Management Module
//!
//! One current session per client context: issued on login, bumped on
//! activity, persisted through a [`SessionStore`] slot, expired by idle or
//! absolute timeout.

pub mod manager;
pub mod storage;
pub mod types;

pub use manager::{SessionManager, SessionManagerBuilder};
pub use storage::{
    decode_session, encode_session, FileSessionStore, MemorySessionStore, SessionStore,
    CURRENT_SESSION_KEY,
};
pub use types::*;
