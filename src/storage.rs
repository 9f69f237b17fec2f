use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::engine::state::DashboardState;

/// Last known good dashboard states, one JSON row per applied transition.
pub struct SessionStore {
    conn: Connection,
}

impl SessionStore {
    pub fn new(path: &str) -> Result<Self> {
        Ok(Self { conn: Connection::open(path)? })
    }

    pub fn init(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts INTEGER NOT NULL,
                seq INTEGER NOT NULL,
                state_hash TEXT NOT NULL,
                state TEXT NOT NULL
            );
            COMMIT;",
        )?;
        Ok(())
    }

    pub fn persist(&mut self, ts: u64, state: &DashboardState) -> Result<()> {
        let body = serde_json::to_string(state)?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO sessions (ts, seq, state_hash, state) VALUES (?1, ?2, ?3, ?4)",
            params![
                ts as i64,
                state.seq as i64,
                format!("{:016x}", state.hash()),
                body
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn load_latest(&self) -> Result<Option<DashboardState>> {
        let row: Option<String> = self
            .conn
            .query_row(
                "SELECT state FROM sessions ORDER BY id DESC LIMIT 1",
                [],
                |r| r.get(0),
            )
            .optional()?;
        row.map(|body| serde_json::from_str::<DashboardState>(&body).context("corrupt session row"))
            .transpose()
    }

    /// Keep only the newest `keep` rows
    pub fn prune(&mut self, keep: u64) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM sessions WHERE id NOT IN (SELECT id FROM sessions ORDER BY id DESC LIMIT ?1)",
            params![keep as i64],
        )?;
        Ok(removed)
    }

    pub fn count(&self) -> Result<u64> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))?;
        Ok(n as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn open() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.sqlite");
        let mut store = SessionStore::new(path.to_str().unwrap()).unwrap();
        store.init().unwrap();
        (dir, store)
    }

    #[test]
    fn test_empty_store_loads_nothing() {
        let (_dir, store) = open();
        assert!(store.load_latest().unwrap().is_none());
    }

    #[test]
    fn test_latest_state_wins() {
        let (_dir, mut store) = open();
        let mut s = DashboardState::default();
        s.active_context = Some("NVDA".to_string());
        store.persist(1, &s).unwrap();

        s.active_context = Some("TSLA".to_string());
        s.risk_result = Some(json!({"shares": 66}));
        s.seq = 2;
        store.persist(2, &s).unwrap();

        let loaded = store.load_latest().unwrap().unwrap();
        assert_eq!(loaded, s);
        assert_eq!(loaded.hash(), s.hash());
    }

    #[test]
    fn test_corrupt_row_is_an_error() {
        let (_dir, store) = open();
        store
            .conn
            .execute(
                "INSERT INTO sessions (ts, seq, state_hash, state) VALUES (0, 0, '0', 'not json')",
                [],
            )
            .unwrap();
        assert!(store.load_latest().is_err());
    }

    #[test]
    fn test_prune_keeps_newest() {
        let (_dir, mut store) = open();
        let mut s = DashboardState::default();
        for i in 0..5 {
            s.seq = i;
            store.persist(i, &s).unwrap();
        }
        assert_eq!(store.prune(2).unwrap(), 3);
        assert_eq!(store.count().unwrap(), 2);
        assert_eq!(store.load_latest().unwrap().unwrap().seq, 4);
    }
}
