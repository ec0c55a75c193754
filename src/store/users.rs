use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors surfaced by [`UserStore`] operations.
///
/// A duplicate registration is *not* an error — it is reported through
/// [`AddUserOutcome`] so callers can tell it apart from a real storage
/// failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database file could not be opened or initialized.
    #[error("failed to open user database at {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// A query against an already-open store failed.
    #[error("user store query failed")]
    Query(#[from] rusqlite::Error),

    /// Writing the roster to an output stream failed.
    #[error("failed to write user roster")]
    Io(#[from] io::Error),
}

/// Result of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddUserOutcome {
    /// The user was inserted.
    Added,
    /// A record with this username already exists; the store was not touched.
    DuplicateUsername,
}

impl AddUserOutcome {
    pub fn is_added(self) -> bool {
        matches!(self, Self::Added)
    }
}

/// One registered identity, as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// SQLite-backed user registration store.
///
/// Owns the single `users` table: `username` (primary key), `email`,
/// `password`, all text. Credentials are stored and compared verbatim.
pub struct UserStore {
    conn: Mutex<Connection>,
}

impl UserStore {
    /// Open (or create) the user database at the given path.
    ///
    /// Installs the schema if it is not already present; reopening an
    /// existing database never drops rows.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let open_err = |source| StoreError::Open {
            path: db_path.to_path_buf(),
            source,
        };

        let conn = Connection::open(db_path).map_err(open_err)?;

        // WAL mode for crash safety on a single local file
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(open_err)?;

        Self::init_schema(&conn).map_err(open_err)?;

        tracing::debug!(path = %db_path.display(), "user database opened");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                email    TEXT NOT NULL,
                password TEXT NOT NULL
            );",
        )
    }

    /// Re-install the schema. Idempotent: safe to call on an already
    /// initialized store, and never erases existing rows.
    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        Self::init_schema(&conn)?;
        Ok(())
    }

    // ── Registration ────────────────────────────────────────────────

    /// Register a new user.
    ///
    /// Returns [`AddUserOutcome::DuplicateUsername`] when the username is
    /// already taken, leaving the existing record untouched. Any other
    /// storage failure propagates as an error.
    pub fn add_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AddUserOutcome, StoreError> {
        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO users (username, email, password) VALUES (?1, ?2, ?3)",
            params![username, email, password],
        );

        match result {
            Ok(_) => {
                tracing::info!(username, "user registered");
                Ok(AddUserOutcome::Added)
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                tracing::debug!(username, "registration rejected: username taken");
                Ok(AddUserOutcome::DuplicateUsername)
            }
            Err(e) => Err(e.into()),
        }
    }

    // ── Authentication ──────────────────────────────────────────────

    /// Check a username/password pair against the stored record.
    ///
    /// Username lookup is an exact, case-sensitive match; the password
    /// must equal the stored credential verbatim. An unknown username is
    /// a plain `false`, not an error. No side effects.
    pub fn authenticate_user(&self, username: &str, password: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let stored: Result<String, _> = conn.query_row(
            "SELECT password FROM users WHERE username = ?1",
            params![username],
            |row| row.get(0),
        );

        match stored {
            Ok(stored) => Ok(stored == password),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Look up the full record for a username. `None` on miss.
    pub fn find_user(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let conn = self.conn.lock();
        let row = conn.query_row(
            "SELECT username, email, password FROM users WHERE username = ?1",
            params![username],
            |row| {
                Ok(UserRecord {
                    username: row.get(0)?,
                    email: row.get(1)?,
                    password: row.get(2)?,
                })
            },
        );

        match row {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All registered usernames, in storage order.
    pub fn usernames(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT username FROM users")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Count registered users.
    pub fn user_count(&self) -> Result<u64, StoreError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ── Roster output ───────────────────────────────────────────────

    /// Stream every registered username to `out`, one per line, in
    /// storage order. Emails and passwords never appear in this output.
    pub fn write_roster(&self, out: &mut dyn Write) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT username FROM users")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let username: String = row.get(0)?;
            writeln!(out, "{username}")?;
        }
        Ok(())
    }

    /// Print the roster of registered usernames to standard output.
    pub fn display_users(&self) -> Result<(), StoreError> {
        let stdout = io::stdout();
        self.write_roster(&mut stdout.lock())
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, UserStore) {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("users.db");
        let store = UserStore::open(&db_path).unwrap();
        (tmp, store)
    }

    #[test]
    fn register_and_authenticate() {
        let (_tmp, store) = test_store();

        let outcome = store.add_user("alice", "a@x.com", "pw1").unwrap();
        assert!(outcome.is_added());
        assert!(store.authenticate_user("alice", "pw1").unwrap());
    }

    #[test]
    fn duplicate_username_rejected_without_mutation() {
        let (_tmp, store) = test_store();

        store.add_user("alice", "a@x.com", "pw1").unwrap();
        let second = store.add_user("alice", "a2@x.com", "pw2").unwrap();
        assert_eq!(second, AddUserOutcome::DuplicateUsername);

        // Original record survives untouched
        let record = store.find_user("alice").unwrap().unwrap();
        assert_eq!(record.email, "a@x.com");
        assert_eq!(record.password, "pw1");
        assert_eq!(store.user_count().unwrap(), 1);

        // And the losing credentials never authenticate
        assert!(!store.authenticate_user("alice", "pw2").unwrap());
    }

    #[test]
    fn authenticate_unknown_user_returns_false() {
        let (_tmp, store) = test_store();

        assert!(!store.authenticate_user("ghost", "anything").unwrap());
    }

    #[test]
    fn authenticate_wrong_password_returns_false() {
        let (_tmp, store) = test_store();

        store.add_user("bob", "bob@x.com", "secret").unwrap();
        assert!(!store.authenticate_user("bob", "not-secret").unwrap());
    }

    #[test]
    fn authentication_is_case_sensitive() {
        let (_tmp, store) = test_store();

        store.add_user("Carol", "c@x.com", "Passw0rd").unwrap();
        assert!(store.authenticate_user("Carol", "Passw0rd").unwrap());
        assert!(!store.authenticate_user("carol", "Passw0rd").unwrap());
        assert!(!store.authenticate_user("Carol", "passw0rd").unwrap());
    }

    #[test]
    fn find_user_returns_stored_record() {
        let (_tmp, store) = test_store();

        store.add_user("dave", "d@x.com", "hunter2").unwrap();
        let record = store.find_user("dave").unwrap().unwrap();
        assert_eq!(
            record,
            UserRecord {
                username: "dave".into(),
                email: "d@x.com".into(),
                password: "hunter2".into(),
            }
        );

        assert!(store.find_user("nobody").unwrap().is_none());
    }

    #[test]
    fn roster_contains_usernames_only() {
        let (_tmp, store) = test_store();

        store.add_user("bob", "bob@x.com", "secret").unwrap();
        store.add_user("eve", "eve@x.com", "p4ss").unwrap();

        let mut out = Vec::new();
        store.write_roster(&mut out).unwrap();
        let roster = String::from_utf8(out).unwrap();

        assert!(roster.contains("bob"));
        assert!(roster.contains("eve"));
        assert!(!roster.contains("secret"));
        assert!(!roster.contains("p4ss"));
        assert!(!roster.contains("bob@x.com"));
    }

    #[test]
    fn roster_follows_insertion_order() {
        let (_tmp, store) = test_store();

        for name in ["first", "second", "third"] {
            store.add_user(name, "u@x.com", "pw").unwrap();
        }

        assert_eq!(store.usernames().unwrap(), ["first", "second", "third"]);
    }

    #[test]
    fn empty_store_has_no_users() {
        let (_tmp, store) = test_store();

        assert_eq!(store.user_count().unwrap(), 0);
        assert!(store.usernames().unwrap().is_empty());
    }

    #[test]
    fn ensure_schema_is_idempotent() {
        let (_tmp, store) = test_store();

        store.add_user("alice", "a@x.com", "pw1").unwrap();
        store.ensure_schema().unwrap();
        store.ensure_schema().unwrap();

        assert_eq!(store.user_count().unwrap(), 1);
        assert!(store.authenticate_user("alice", "pw1").unwrap());
    }

    #[test]
    fn reopen_preserves_existing_rows() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("users.db");

        {
            let store = UserStore::open(&db_path).unwrap();
            store.add_user("alice", "a@x.com", "pw1").unwrap();
        }

        let store = UserStore::open(&db_path).unwrap();
        assert_eq!(store.user_count().unwrap(), 1);
        assert!(store.authenticate_user("alice", "pw1").unwrap());
    }

    #[test]
    fn open_unwritable_path_fails() {
        let result = UserStore::open(Path::new("/nonexistent-dir/users.db"));
        assert!(matches!(result, Err(StoreError::Open { .. })));
    }
}
