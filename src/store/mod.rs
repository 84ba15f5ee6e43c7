use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

use crate::wire::{ActionType, NewProject, Project, ProjectUpdate};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    language    TEXT NOT NULL,
    prompt      TEXT NOT NULL DEFAULT '',
    code        TEXT NOT NULL DEFAULT '',
    files       TEXT NOT NULL DEFAULT '{}',
    is_public   INTEGER NOT NULL DEFAULT 0,
    created_at  INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS projects_user ON projects(user_id);

CREATE TABLE IF NOT EXISTS usage_events (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     TEXT NOT NULL,
    action_type TEXT NOT NULL,
    tokens      INTEGER NOT NULL,
    metadata    TEXT,
    created_at  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS usage_user_time ON usage_events(user_id, created_at);

CREATE TABLE IF NOT EXISTS subscriptions (
    user_id    TEXT PRIMARY KEY,
    tier       TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;

/// SQLite database of record. One connection behind a mutex; every call is a
/// short statement so contention stays low.
pub struct Store {
    conn: Mutex<Connection>,
}

fn millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    let files: String = row.get("files")?;
    Ok(Project {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        language: row.get("language")?,
        prompt: row.get("prompt")?,
        code: row.get("code")?,
        files: serde_json::from_str(&files).unwrap_or_default(),
        is_public: row.get::<_, i64>("is_public")? != 0,
        created_at: from_millis(row.get("created_at")?),
        updated_at: from_millis(row.get("updated_at")?),
    })
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("opening database {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).context("applying schema")?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    // ---- projects ----

    pub fn insert_project(&self, user_id: &str, p: NewProject) -> Result<Project> {
        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: p.name,
            description: p.description,
            language: p.language,
            prompt: p.prompt,
            code: p.code,
            files: p.files,
            is_public: p.is_public,
            created_at: now,
            updated_at: now,
        };
        self.conn.lock().execute(
            "INSERT INTO projects (id, user_id, name, description, language, prompt, code, files, is_public, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                project.id,
                project.user_id,
                project.name,
                project.description,
                project.language,
                project.prompt,
                project.code,
                serde_json::to_string(&project.files)?,
                project.is_public as i64,
                millis(now),
                millis(now),
            ],
        )?;
        Ok(project)
    }

    pub fn get_project(&self, id: &str) -> Result<Option<Project>> {
        let conn = self.conn.lock();
        let p = conn
            .query_row("SELECT * FROM projects WHERE id = ?1", params![id], project_from_row)
            .optional()?;
        Ok(p)
    }

    pub fn list_projects(&self, user_id: &str) -> Result<Vec<Project>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT * FROM projects WHERE user_id = ?1 ORDER BY updated_at DESC")?;
        let rows = stmt.query_map(params![user_id], project_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Apply the provided fields; `None` when the project does not exist.
    pub fn update_project(&self, id: &str, u: ProjectUpdate) -> Result<Option<Project>> {
        let Some(mut p) = self.get_project(id)? else { return Ok(None) };
        if let Some(v) = u.name {
            p.name = v;
        }
        if let Some(v) = u.description {
            p.description = v;
        }
        if let Some(v) = u.language {
            p.language = v;
        }
        if let Some(v) = u.prompt {
            p.prompt = v;
        }
        if let Some(v) = u.code {
            p.code = v;
        }
        if let Some(v) = u.files {
            p.files = v;
        }
        if let Some(v) = u.is_public {
            p.is_public = v;
        }
        p.updated_at = Utc::now();

        self.conn.lock().execute(
            "UPDATE projects SET name = ?2, description = ?3, language = ?4, prompt = ?5, code = ?6,
                 files = ?7, is_public = ?8, updated_at = ?9 WHERE id = ?1",
            params![
                p.id,
                p.name,
                p.description,
                p.language,
                p.prompt,
                p.code,
                serde_json::to_string(&p.files)?,
                p.is_public as i64,
                millis(p.updated_at),
            ],
        )?;
        Ok(Some(p))
    }

    pub fn save_files(&self, id: &str, files: &BTreeMap<String, String>) -> Result<bool> {
        let n = self.conn.lock().execute(
            "UPDATE projects SET files = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, serde_json::to_string(files)?, millis(Utc::now())],
        )?;
        Ok(n > 0)
    }

    pub fn delete_project(&self, id: &str) -> Result<bool> {
        let n = self.conn.lock().execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    // ---- usage ----

    pub fn insert_usage(
        &self,
        user_id: &str,
        action: ActionType,
        tokens: u64,
        metadata: Option<&serde_json::Value>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let tokens = i64::try_from(tokens).context("token count out of range")?;
        let metadata = metadata.map(serde_json::to_string).transpose()?;
        self.conn.lock().execute(
            "INSERT INTO usage_events (user_id, action_type, tokens, metadata, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, action.as_str(), tokens, metadata, millis(at)],
        )?;
        Ok(())
    }

    /// (all-time total, total since `since`)
    pub fn usage_totals(&self, user_id: &str, since: DateTime<Utc>) -> Result<(u64, u64)> {
        let conn = self.conn.lock();
        let (all, period): (i64, i64) = conn.query_row(
            "SELECT COALESCE(SUM(tokens), 0),
                    COALESCE(SUM(CASE WHEN created_at >= ?2 THEN tokens ELSE 0 END), 0)
             FROM usage_events WHERE user_id = ?1",
            params![user_id, millis(since)],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        Ok((all.max(0) as u64, period.max(0) as u64))
    }

    pub fn subscription_tier(&self, user_id: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let tier = conn
            .query_row(
                "SELECT tier FROM subscriptions WHERE user_id = ?1",
                params![user_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(tier)
    }

    pub fn set_subscription(&self, user_id: &str, tier: &str) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO subscriptions (user_id, tier, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET tier = excluded.tier, updated_at = excluded.updated_at",
            params![user_id, tier, millis(Utc::now())],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_project(name: &str) -> NewProject {
        NewProject { name: name.into(), language: "react".into(), ..Default::default() }
    }

    #[test]
    fn project_crud_round_trip() {
        let store = Store::open_in_memory().unwrap();
        let mut p = new_project("todo");
        p.files.insert("src/App.js".into(), "app".into());
        let created = store.insert_project("u1", p).unwrap();

        let fetched = store.get_project(&created.id).unwrap().unwrap();
        assert_eq!(fetched.name, "todo");
        assert_eq!(fetched.files.get("src/App.js").map(String::as_str), Some("app"));

        let updated = store
            .update_project(
                &created.id,
                ProjectUpdate {
                    name: Some("todos".into()),
                    is_public: Some(true),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "todos");
        assert!(updated.is_public);
        assert_eq!(updated.language, "react");

        assert_eq!(store.list_projects("u1").unwrap().len(), 1);
        assert!(store.list_projects("u2").unwrap().is_empty());

        assert!(store.delete_project(&created.id).unwrap());
        assert!(store.get_project(&created.id).unwrap().is_none());
        assert!(store.update_project(&created.id, ProjectUpdate::default()).unwrap().is_none());
    }

    #[test]
    fn usage_totals_split_by_period() {
        let store = Store::open_in_memory().unwrap();
        let now = Utc::now();
        store.insert_usage("u", ActionType::Chat, 300, None, now - Duration::days(60)).unwrap();
        let meta = serde_json::json!({"model": "m"});
        store.insert_usage("u", ActionType::Chat, 200, Some(&meta), now).unwrap();
        store.insert_usage("other", ActionType::Chat, 999, None, now).unwrap();
        assert_eq!(store.usage_totals("u", now - Duration::days(1)).unwrap(), (500, 200));
        assert_eq!(store.usage_totals("nobody", now).unwrap(), (0, 0));
    }

    #[test]
    fn subscription_upserts() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.subscription_tier("u").unwrap(), None);
        store.set_subscription("u", "pro").unwrap();
        store.set_subscription("u", "free").unwrap();
        assert_eq!(store.subscription_tier("u").unwrap().as_deref(), Some("free"));
    }

    #[test]
    fn file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vibe.sqlite");
        let id = {
            let store = Store::open(&path).unwrap();
            store.insert_project("u", new_project("p")).unwrap().id
        };
        let store = Store::open(&path).unwrap();
        assert!(store.get_project(&id).unwrap().is_some());
    }
}
