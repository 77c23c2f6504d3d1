//! SQLite-backed single-file store.
//!
//! A development stand-in for the platform keychain on hosts that lack one.
//! Payloads are written as plain BLOBs: the file is restricted to its owner
//! (mode 0600 on Unix) but nothing is encrypted at rest.
//!
//! # Schema
//!
//! One table, `items`, with a row per credential. Identity attributes are
//! nullable columns so that "attribute absent" and "attribute empty" stay
//! distinct, exactly as on the keychain. Row ids give insertion order.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Value;
use rusqlite::{Connection, Transaction, TransactionBehavior, params, params_from_iter};

use super::{
    BackendError, ERR_SEC_IO, SecureBackend, check_attributes, plan_update, stored_attributes,
};
use crate::query::{Attributes, Changes, Item, ItemClass, Query};

impl From<rusqlite::Error> for BackendError {
    fn from(err: rusqlite::Error) -> Self {
        BackendError::from_status(ERR_SEC_IO, format!("sqlite: {err}"))
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::from_status(ERR_SEC_IO, format!("io: {err}"))
    }
}

/// File-backed [`SecureBackend`].
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open (or create) the store at `path`, creating parent directories and
    /// running schema migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "opening sqlite credential store");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::configure_connection(&conn)?;
        Self::run_migrations(&conn)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a store that lives only as long as this value.
    pub fn open_in_memory() -> Result<Self, BackendError> {
        let conn = Connection::open_in_memory()?;
        Self::configure_connection(&conn)?;
        Self::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn configure_connection(conn: &Connection) -> Result<(), BackendError> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;",
        )?;
        Ok(())
    }

    fn run_migrations(conn: &Connection) -> Result<(), BackendError> {
        tracing::debug!("running credential store migrations");

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS items (
                id      INTEGER PRIMARY KEY AUTOINCREMENT,
                class   TEXT NOT NULL CHECK(class IN ('inet','genp')),
                account TEXT,
                server  TEXT,
                port    INTEGER,
                label   TEXT,
                data    BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_items_class_account ON items(class, account);",
        )
        .map_err(|e| BackendError::from_status(ERR_SEC_IO, format!("migration failed: {e}")))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, BackendError> {
        self.conn
            .lock()
            .map_err(|_| BackendError::internal("sqlite backend lock poisoned"))
    }

    // -- Internal helpers ---------------------------------------------------

    /// `WHERE` clause and positional parameters for `query`'s constraints.
    fn filter_clause(query: &Query) -> (String, Vec<Value>) {
        let mut clauses = vec!["class = ?"];
        let mut values = vec![Value::Text(query.class.as_str().to_owned())];

        let attrs = &query.attributes;
        if let Some(account) = &attrs.account {
            clauses.push("account = ?");
            values.push(Value::Text(account.clone()));
        }
        if let Some(server) = &attrs.server {
            clauses.push("server = ?");
            values.push(Value::Text(server.clone()));
        }
        if let Some(port) = attrs.port {
            clauses.push("port = ?");
            values.push(Value::Integer(i64::from(port)));
        }
        if let Some(label) = &attrs.label {
            clauses.push("label = ?");
            values.push(Value::Text(label.clone()));
        }

        (clauses.join(" AND "), values)
    }

    /// Rows matching `query` in insertion order, capped by its limit.
    fn select_rows(tx: &Transaction<'_>, query: &Query) -> Result<Vec<Row>, BackendError> {
        let (clause, values) = Self::filter_clause(query);
        let mut sql = format!(
            "SELECT id, class, account, server, port, label, data FROM items WHERE {clause} ORDER BY id"
        );
        if let Some(cap) = query.limit.cap() {
            sql.push_str(&format!(" LIMIT {cap}"));
        }

        let mut stmt = tx.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), Row::from_sql)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Identity attributes of every row of `query`'s class.
    fn class_identities(
        tx: &Transaction<'_>,
        query: &Query,
    ) -> Result<Vec<(i64, Attributes)>, BackendError> {
        let mut stmt = tx.prepare(
            "SELECT id, class, account, server, port, label, data FROM items WHERE class = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![query.class.as_str()], Row::from_sql)?;
        let mut out = Vec::new();
        for row in rows {
            let row = row?;
            out.push((row.id, row.attributes()?));
        }
        Ok(out)
    }
}

impl SecureBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn store(&self, query: &Query, payload: &[u8]) -> Result<(), BackendError> {
        check_attributes(query.class, &query.attributes)?;
        let attrs = stored_attributes(query);

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM items
             WHERE class = ?1 AND account IS ?2 AND server IS ?3 AND port IS ?4 AND label IS ?5)",
            params![
                query.class.as_str(),
                attrs.account,
                attrs.server,
                attrs.port,
                attrs.label,
            ],
            |row| row.get(0),
        )?;
        if exists {
            return Err(BackendError::DuplicateItem);
        }

        tx.execute(
            "INSERT INTO items (class, account, server, port, label, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                query.class.as_str(),
                attrs.account,
                attrs.server,
                attrs.port,
                attrs.label,
                payload,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn find(&self, query: &Query) -> Result<Vec<Item>, BackendError> {
        check_attributes(query.class, &query.attributes)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let rows = Self::select_rows(&tx, query)?;
        tx.finish()?;

        if rows.is_empty() {
            return Err(BackendError::ItemNotFound);
        }

        rows.into_iter()
            .map(|row| row.into_item().map(|item| item.project(query)))
            .collect()
    }

    fn update(&self, query: &Query, changes: &Changes) -> Result<(), BackendError> {
        check_attributes(query.class, &query.attributes)?;
        check_attributes(query.class, &changes.attributes)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let targets: Vec<i64> = Self::select_rows(&tx, query)?
            .into_iter()
            .map(|row| row.id)
            .collect();
        if targets.is_empty() {
            return Err(BackendError::ItemNotFound);
        }

        let live = Self::class_identities(&tx, query)?;
        for (id, attrs) in plan_update(&live, &targets, &changes.attributes)? {
            tx.execute(
                "UPDATE items SET account = ?1, server = ?2, port = ?3, label = ?4 WHERE id = ?5",
                params![attrs.account, attrs.server, attrs.port, attrs.label, id],
            )?;
            if let Some(data) = &changes.data {
                tx.execute(
                    "UPDATE items SET data = ?1 WHERE id = ?2",
                    params![data, id],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn erase(&self, query: &Query) -> Result<usize, BackendError> {
        check_attributes(query.class, &query.attributes)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let rows = Self::select_rows(&tx, query)?;
        if rows.is_empty() {
            return Err(BackendError::ItemNotFound);
        }
        for row in &rows {
            tx.execute("DELETE FROM items WHERE id = ?1", params![row.id])?;
        }

        tx.commit()?;
        Ok(rows.len())
    }
}

// ---------------------------------------------------------------------------
// Internal row type (avoid leaking rusqlite details)
// ---------------------------------------------------------------------------

struct Row {
    id: i64,
    class: String,
    account: Option<String>,
    server: Option<String>,
    port: Option<i64>,
    label: Option<String>,
    data: Vec<u8>,
}

impl Row {
    fn from_sql(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            class: row.get(1)?,
            account: row.get(2)?,
            server: row.get(3)?,
            port: row.get(4)?,
            label: row.get(5)?,
            data: row.get(6)?,
        })
    }

    fn into_item(self) -> Result<Item, BackendError> {
        let class = ItemClass::parse(&self.class).ok_or_else(|| {
            BackendError::internal(format!("row {} has unknown class {:?}", self.id, self.class))
        })?;
        let attributes = self.attributes()?;
        Ok(Item {
            class,
            attributes,
            data: Some(self.data),
        })
    }

    fn attributes(&self) -> Result<Attributes, BackendError> {
        let port = self
            .port
            .map(u16::try_from)
            .transpose()
            .map_err(|_| BackendError::internal(format!("row {} has an out-of-range port", self.id)))?;

        Ok(Attributes {
            account: self.account.clone(),
            server: self.server.clone(),
            port,
            label: self.label.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{ItemClass, MatchLimit};

    fn inet(account: &str, server: &str) -> Query {
        Query::new(ItemClass::InternetPassword)
            .account(account)
            .server(server)
    }

    #[test]
    fn store_and_find_round_trip() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend
            .store(&inet("alice", "example.com").label(Some("")), b"pw")
            .unwrap();

        let found = backend
            .find(&inet("alice", "example.com").returning_all())
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].class, ItemClass::InternetPassword);
        assert_eq!(found[0].attributes.account.as_deref(), Some("alice"));
        assert_eq!(found[0].attributes.port, Some(0));
        assert_eq!(found[0].attributes.label.as_deref(), Some(""));
        assert_eq!(found[0].data.as_deref(), Some(&b"pw"[..]));
    }

    #[test]
    fn duplicate_identity_is_rejected() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let query = inet("alice", "example.com").label(Some(""));
        backend.store(&query, b"one").unwrap();
        assert_eq!(
            backend.store(&query, b"two"),
            Err(BackendError::DuplicateItem)
        );

        // A different label is a different identity.
        backend
            .store(&inet("alice", "example.com").label(Some("work")), b"two")
            .unwrap();
    }

    #[test]
    fn generic_items_have_no_network_columns() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let query = Query::new(ItemClass::GenericPassword).account("alice");
        backend.store(&query, b"pw").unwrap();

        let found = backend.find(&query.clone().returning_all()).unwrap();
        assert_eq!(found[0].attributes.server, None);
        assert_eq!(found[0].attributes.port, None);
    }

    #[test]
    fn update_patches_only_named_columns() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend
            .store(&inet("alice", "example.com").port(Some(22)), b"pw")
            .unwrap();

        let changes = Changes {
            attributes: Attributes {
                label: Some("ops".into()),
                ..Default::default()
            },
            data: Some(b"rotated".to_vec()),
        };
        backend
            .update(&inet("alice", "example.com"), &changes)
            .unwrap();

        let found = backend
            .find(&inet("alice", "example.com").returning_all())
            .unwrap();
        assert_eq!(found[0].attributes.port, Some(22));
        assert_eq!(found[0].attributes.label.as_deref(), Some("ops"));
        assert_eq!(found[0].data.as_deref(), Some(&b"rotated"[..]));
    }

    #[test]
    fn update_collision_leaves_rows_untouched() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend.store(&inet("alice", "example.com"), b"a").unwrap();
        backend.store(&inet("bob", "example.com"), b"b").unwrap();

        let rename = Changes {
            attributes: Attributes {
                account: Some("bob".into()),
                ..Default::default()
            },
            data: None,
        };
        assert_eq!(
            backend.update(&inet("alice", "example.com"), &rename),
            Err(BackendError::DuplicateItem)
        );
        assert!(backend.find(&inet("alice", "example.com")).is_ok());
    }

    #[test]
    fn erase_honours_limit() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        for port in 1..=3 {
            backend
                .store(&inet("alice", "example.com").port(Some(port)), b"pw")
                .unwrap();
        }

        assert_eq!(backend.erase(&inet("alice", "example.com")).unwrap(), 1);
        let left = backend
            .find(
                &inet("alice", "example.com")
                    .returning_all()
                    .limit(MatchLimit::All),
            )
            .unwrap();
        assert_eq!(left.len(), 2);
        assert_eq!(left[0].attributes.port, Some(2));

        let removed = backend
            .erase(&inet("alice", "example.com").limit(MatchLimit::All))
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(
            backend.erase(&inet("alice", "example.com")),
            Err(BackendError::ItemNotFound)
        );
    }

    #[test]
    fn reopen_preserves_items() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.db");

        {
            let backend = SqliteBackend::open(&path).unwrap();
            backend.store(&inet("alice", "example.com"), b"pw").unwrap();
        }

        let backend = SqliteBackend::open(&path).unwrap();
        let found = backend
            .find(&inet("alice", "example.com").returning_all())
            .unwrap();
        assert_eq!(found[0].data.as_deref(), Some(&b"pw"[..]));
    }

    #[cfg(unix)]
    #[test]
    fn store_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.db");
        let _backend = SqliteBackend::open(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
