mod schema;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::info;

/// A stored note row. `vector_id` is the id of the paired vector point.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRow {
    pub id: i64,
    pub agent_name: Option<String>,
    pub title: Option<String>,
    pub content: String,
    pub vector_id: String,
    pub embedding_model: String,
    pub created_at: String,
}

/// A stored conversation exchange.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRow {
    pub id: i64,
    pub agent_name: String,
    pub user_input: String,
    pub agent_response: String,
    pub vector_id: Option<String>,
    pub created_at: String,
}

/// Fields for a new note. The vector point must already exist; its id keys
/// the row so a retried write replaces rather than duplicates.
#[derive(Debug, Clone)]
pub struct NewNote {
    pub agent_name: Option<String>,
    pub title: Option<String>,
    pub content: String,
    pub vector_id: String,
    pub embedding_model: String,
}

/// Relational store for note and conversation metadata.
///
/// The vector store is the source of truth; rows here only add relational
/// context (timestamps, titles, agent attribution) keyed by vector id.
/// Cheaply cloneable; the inner connection is shared behind a mutex.
#[derive(Clone)]
pub struct MetadataStore {
    conn: Arc<Mutex<Connection>>,
}

impl MetadataStore {
    /// Open (or create) the store at `<state_dir>/metadata.db` and run
    /// migrations.
    pub fn open(state_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_dir)
            .with_context(|| format!("failed to create state dir {}", state_dir.display()))?;
        let db_path = state_dir.join("metadata.db");
        let conn = Connection::open(&db_path)
            .with_context(|| format!("failed to open metadata db at {}", db_path.display()))?;
        schema::run_migrations(&conn)?;
        info!(db = %db_path.display(), "metadata store ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Verify the store is reachable. Used by health checks.
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Notes
    // ------------------------------------------------------------------

    pub fn insert_note(&self, note: NewNote) -> Result<NoteRow> {
        let created_at = Utc::now().to_rfc3339();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO notes
                (agent_name, title, content, vector_id, embedding_model, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                note.agent_name,
                note.title,
                note.content,
                note.vector_id,
                note.embedding_model,
                created_at
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(NoteRow {
            id,
            agent_name: note.agent_name,
            title: note.title,
            content: note.content,
            vector_id: note.vector_id,
            embedding_model: note.embedding_model,
            created_at,
        })
    }

    pub fn get_note(&self, id: i64) -> Result<Option<NoteRow>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, agent_name, title, content, vector_id, embedding_model, created_at
                 FROM notes WHERE id = ?1",
                params![id],
                note_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn get_note_by_vector(&self, vector_id: &str) -> Result<Option<NoteRow>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, agent_name, title, content, vector_id, embedding_model, created_at
                 FROM notes WHERE vector_id = ?1",
                params![vector_id],
                note_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn list_notes(&self, skip: usize, limit: usize) -> Result<Vec<NoteRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, agent_name, title, content, vector_id, embedding_model, created_at
             FROM notes ORDER BY id LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt
            .query_map(params![limit as i64, skip as i64], note_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Delete a note row, returning it so the caller can clean up the paired
    /// vector point.
    pub fn delete_note(&self, id: i64) -> Result<Option<NoteRow>> {
        let note = self.get_note(id)?;
        if note.is_some() {
            let conn = self.conn.lock();
            conn.execute("DELETE FROM notes WHERE id = ?1", params![id])?;
        }
        Ok(note)
    }

    // ------------------------------------------------------------------
    // Conversations
    // ------------------------------------------------------------------

    pub fn insert_conversation(
        &self,
        agent_name: &str,
        user_input: &str,
        agent_response: &str,
        vector_id: Option<&str>,
    ) -> Result<ConversationRow> {
        let created_at = Utc::now().to_rfc3339();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO conversations
                (agent_name, user_input, agent_response, vector_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![agent_name, user_input, agent_response, vector_id, created_at],
        )?;
        let id = conn.last_insert_rowid();
        Ok(ConversationRow {
            id,
            agent_name: agent_name.to_string(),
            user_input: user_input.to_string(),
            agent_response: agent_response.to_string(),
            vector_id: vector_id.map(str::to_string),
            created_at,
        })
    }

    pub fn list_conversations(&self, agent_name: &str, limit: usize) -> Result<Vec<ConversationRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, agent_name, user_input, agent_response, vector_id, created_at
             FROM conversations WHERE agent_name = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![agent_name, limit as i64], |row| {
                Ok(ConversationRow {
                    id: row.get(0)?,
                    agent_name: row.get(1)?,
                    user_input: row.get(2)?,
                    agent_response: row.get(3)?,
                    vector_id: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<NoteRow> {
    Ok(NoteRow {
        id: row.get(0)?,
        agent_name: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        vector_id: row.get(4)?,
        embedding_model: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_note(vector_id: &str) -> NewNote {
        NewNote {
            agent_name: None,
            title: Some("Refunds".to_string()),
            content: "Refund policy lasts 30 days".to_string(),
            vector_id: vector_id.to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
        }
    }

    #[test]
    fn note_round_trip() {
        let store = MetadataStore::open_in_memory().unwrap();
        let inserted = store.insert_note(sample_note("v-1")).unwrap();

        let fetched = store.get_note(inserted.id).unwrap().unwrap();
        assert_eq!(fetched.content, "Refund policy lasts 30 days");
        assert_eq!(fetched.vector_id, "v-1");

        let by_vector = store.get_note_by_vector("v-1").unwrap().unwrap();
        assert_eq!(by_vector.id, inserted.id);
    }

    #[test]
    fn retried_insert_replaces_by_vector_id() {
        let store = MetadataStore::open_in_memory().unwrap();
        store.insert_note(sample_note("v-1")).unwrap();
        let mut retry = sample_note("v-1");
        retry.title = Some("Refunds v2".to_string());
        store.insert_note(retry).unwrap();

        let all = store.list_notes(0, 10).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title.as_deref(), Some("Refunds v2"));
    }

    #[test]
    fn list_notes_paginates() {
        let store = MetadataStore::open_in_memory().unwrap();
        for i in 0..5 {
            store.insert_note(sample_note(&format!("v-{i}"))).unwrap();
        }
        let page = store.list_notes(2, 2).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].vector_id, "v-2");
    }

    #[test]
    fn delete_note_returns_row() {
        let store = MetadataStore::open_in_memory().unwrap();
        let inserted = store.insert_note(sample_note("v-1")).unwrap();
        let deleted = store.delete_note(inserted.id).unwrap().unwrap();
        assert_eq!(deleted.vector_id, "v-1");
        assert!(store.get_note(inserted.id).unwrap().is_none());
        assert!(store.delete_note(inserted.id).unwrap().is_none());
    }

    #[test]
    fn conversation_round_trip() {
        let store = MetadataStore::open_in_memory().unwrap();
        store
            .insert_conversation("cara", "hi", "hello!", Some("v-9"))
            .unwrap();
        let rows = store.list_conversations("cara", 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].vector_id.as_deref(), Some("v-9"));
    }
}
