//! User registration store.
//!
//! Provides:
//! - User registration with a username-uniqueness guard
//! - Username/password authentication against stored credentials
//! - Roster enumeration (usernames only)
//! - SQLite-backed persistent storage
//!
//! ## Design Decisions
//! - The store is an explicit object constructed by the caller and passed
//!   where needed — no process-wide connection.
//! - A duplicate registration is a distinct [`AddUserOutcome`] variant
//!   rather than a swallowed error, so callers can tell it apart from a
//!   real storage failure.
//! - Credentials are stored and compared verbatim; records are never
//!   updated or deleted once written.

pub mod users;

pub use users::{AddUserOutcome, StoreError, UserRecord, UserStore};
