//! rollcall — a small local user-registration roster.
//!
//! One SQLite table, three operations: register a user, check a
//! username/password pair, list who is registered. See [`store::UserStore`].

pub mod store;

pub use store::{AddUserOutcome, StoreError, UserRecord, UserStore};
