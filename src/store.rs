// Copyright 2026 EduBase Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;
use std::thread::sleep;
use std::time::Duration;
use std::time::Instant;

use anyhow::Context;
use anyhow::Result;
use fs2::FileExt;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use rusqlite::params_from_iter;
use sha2::Digest;
use sha2::Sha256;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::model::AttachmentRow;
use crate::model::UserRow;

pub struct Store {
    pub conn: Connection,
    pub path: PathBuf,
    lock: Option<StoreLock>,
}

struct StoreLock {
    _file: File,
    path: PathBuf,
    mode: StoreMode,
}

impl StoreLock {
    fn new(file: File, path: PathBuf, mode: StoreMode) -> Self {
        Self {
            _file: file,
            path,
            mode,
        }
    }
}

const SCHEMA_VERSION: i64 = 1;
const FTS_VERSION: &str = "fts5-v1";

#[derive(Debug, Clone, Copy)]
pub enum StoreMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub user_count: i64,
    pub material_count: i64,
    pub attachment_count: i64,
    pub favorite_count: i64,
    pub db_size_bytes: u64,
}

#[derive(Debug)]
pub struct IntegrityReport {
    pub status: String,
    pub stats: StoreStats,
}

/// Material table vs. full-text projection counts. The projection is
/// trigger-maintained, so any drift here means the index needs a rebuild.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConsistencyReport {
    pub material_count: i64,
    pub fts_count: i64,
    pub fts_missing: i64,
}

impl ConsistencyReport {
    pub fn fts_ok(&self) -> bool {
        self.material_count == self.fts_count && self.fts_missing == 0
    }
}

pub fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format timestamp")
}

impl Store {
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("store already exists at {}", path.display());
        }
        let _lock = Self::acquire_lock(path, StoreMode::ReadWrite)?;
        let conn = Self::open_connection(path, StoreMode::ReadWrite)?;
        Self::apply_pragmas(&conn, StoreMode::ReadWrite)?;
        Self::create_schema(&conn)?;
        Self::set_meta(&conn, "schema_version", &SCHEMA_VERSION.to_string())?;
        Self::set_meta(&conn, "fts_version", FTS_VERSION)?;
        Ok(())
    }

    pub fn open(path: &Path, mode: StoreMode) -> Result<Self> {
        let mut lock = Self::acquire_lock(path, mode)?;
        let mut conn = Self::open_connection(path, mode)?;
        Self::apply_pragmas(&conn, mode)?;
        if matches!(mode, StoreMode::ReadWrite) {
            Self::migrate(&conn)?;
            return Ok(Self {
                conn,
                path: path.to_path_buf(),
                lock: Some(lock),
            });
        }

        let version = Self::schema_version(&conn)?;
        if version != SCHEMA_VERSION {
            drop(conn);
            drop(lock);
            let lock_rw = Self::acquire_lock(path, StoreMode::ReadWrite)?;
            let conn_rw = Self::open_connection(path, StoreMode::ReadWrite)?;
            Self::apply_pragmas(&conn_rw, StoreMode::ReadWrite)?;
            Self::migrate(&conn_rw)?;
            drop(conn_rw);
            drop(lock_rw);

            lock = Self::acquire_lock(path, StoreMode::ReadOnly)?;
            conn = Self::open_connection(path, StoreMode::ReadOnly)?;
            Self::apply_pragmas(&conn, StoreMode::ReadOnly)?;
        }

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            lock: Some(lock),
        })
    }

    fn open_connection(path: &Path, mode: StoreMode) -> Result<Connection> {
        let flags = match mode {
            StoreMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            StoreMode::ReadWrite => {
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
        };
        let conn = Connection::open_with_flags(path, flags)
            .with_context(|| format!("open {}", path.display()))?;
        conn.busy_timeout(Duration::from_millis(5000))
            .context("set busy timeout")?;
        Ok(conn)
    }

    fn apply_pragmas(conn: &Connection, mode: StoreMode) -> Result<()> {
        let mut batch = String::from("PRAGMA foreign_keys=ON;");
        if matches!(mode, StoreMode::ReadWrite) {
            batch = format!("PRAGMA journal_mode=DELETE;\nPRAGMA synchronous=NORMAL;\n{batch}");
        }
        conn.execute_batch(&batch).context("apply pragmas")?;
        Ok(())
    }

    fn lock_path_for(path: &Path) -> Result<PathBuf> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string_lossy().as_bytes());
        let hash = hex::encode(hasher.finalize());
        let mut dir = std::env::temp_dir();
        dir.push("edubase");
        fs::create_dir_all(&dir).with_context(|| format!("create lock dir {}", dir.display()))?;
        Ok(dir.join(format!("edubase-{hash}.lock")))
    }

    fn acquire_lock(path: &Path, mode: StoreMode) -> Result<StoreLock> {
        let lock_path = Self::lock_path_for(path)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("open lock file {}", lock_path.display()))?;
        let deadline = Instant::now() + Duration::from_millis(5000);
        loop {
            let locked = match mode {
                StoreMode::ReadOnly => file.try_lock_shared().map_err(|err| err.to_string()),
                StoreMode::ReadWrite => file.try_lock_exclusive().map_err(|err| err.to_string()),
            };
            match locked {
                Ok(()) => return Ok(StoreLock::new(file, lock_path, mode)),
                Err(_) if Instant::now() >= deadline => {
                    let mode_label = match mode {
                        StoreMode::ReadOnly => "read",
                        StoreMode::ReadWrite => "write",
                    };
                    anyhow::bail!(
                        "store is locked for {mode_label} access; another process may be using {}",
                        path.display()
                    );
                }
                Err(_) => {
                    sleep(Duration::from_millis(50));
                }
            }
        }
    }

    fn create_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS meta (\n  key TEXT PRIMARY KEY,\n  value TEXT\n);\n\nCREATE TABLE IF NOT EXISTS user (\n  id INTEGER PRIMARY KEY AUTOINCREMENT,\n  email TEXT UNIQUE NOT NULL,\n  name TEXT NOT NULL,\n  created_at TEXT NOT NULL\n);\n\nCREATE TABLE IF NOT EXISTS material (\n  id INTEGER PRIMARY KEY AUTOINCREMENT,\n  user_id INTEGER NOT NULL,\n  title TEXT NOT NULL,\n  subject TEXT NOT NULL,\n  grade TEXT NOT NULL,\n  type TEXT NOT NULL,\n  description TEXT,\n  link TEXT,\n  file_url TEXT,\n  file_name TEXT,\n  size INTEGER,\n  mime_type TEXT,\n  views INTEGER NOT NULL DEFAULT 0,\n  downloads INTEGER NOT NULL DEFAULT 0,\n  created_at TEXT NOT NULL,\n  FOREIGN KEY(user_id) REFERENCES user(id)\n);\n\nCREATE TABLE IF NOT EXISTS material_file (\n  id INTEGER PRIMARY KEY AUTOINCREMENT,\n  material_id INTEGER NOT NULL,\n  file_url TEXT NOT NULL,\n  file_name TEXT NOT NULL,\n  is_main INTEGER DEFAULT 0,\n  size INTEGER,\n  mime_type TEXT,\n  created_at TEXT NOT NULL,\n  FOREIGN KEY(material_id) REFERENCES material(id) ON DELETE CASCADE\n);\n\nCREATE TABLE IF NOT EXISTS favorite (\n  user_id INTEGER NOT NULL,\n  material_id INTEGER NOT NULL,\n  created_at TEXT NOT NULL,\n  PRIMARY KEY (user_id, material_id),\n  FOREIGN KEY(user_id) REFERENCES user(id),\n  FOREIGN KEY(material_id) REFERENCES material(id) ON DELETE CASCADE\n);\n\nCREATE INDEX IF NOT EXISTS idx_material_user ON material(user_id);\nCREATE INDEX IF NOT EXISTS idx_material_subject ON material(subject);\nCREATE INDEX IF NOT EXISTS idx_material_created ON material(created_at);\nCREATE INDEX IF NOT EXISTS idx_material_file_material ON material_file(material_id);\nCREATE INDEX IF NOT EXISTS idx_favorite_material ON favorite(material_id);\n\nCREATE VIRTUAL TABLE IF NOT EXISTS material_fts USING fts5(title, description, content='material', content_rowid='id');\n\nCREATE TRIGGER IF NOT EXISTS material_ai AFTER INSERT ON material BEGIN\n  INSERT INTO material_fts(rowid, title, description) VALUES (new.id, new.title, new.description);\nEND;\n\nCREATE TRIGGER IF NOT EXISTS material_ad AFTER DELETE ON material BEGIN\n  INSERT INTO material_fts(material_fts, rowid, title, description) VALUES('delete', old.id, old.title, old.description);\nEND;\n\nCREATE TRIGGER IF NOT EXISTS material_au AFTER UPDATE ON material BEGIN\n  INSERT INTO material_fts(material_fts, rowid, title, description) VALUES('delete', old.id, old.title, old.description);\n  INSERT INTO material_fts(rowid, title, description) VALUES (new.id, new.title, new.description);\nEND;",
        )
        .context("create schema")?;
        Ok(())
    }

    fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .context("set meta")?;
        Ok(())
    }

    fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                params![name],
                |row| row.get(0),
            )
            .context("check table")?;
        Ok(count > 0)
    }

    fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", table))
            .context("table info")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
        for row in rows {
            if row? == column {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn schema_version(conn: &Connection) -> Result<i64> {
        if !Self::table_exists(conn, "meta")? {
            return Ok(0);
        }
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key='schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()
            .context("read schema_version")?;
        Ok(value.and_then(|v| v.parse::<i64>().ok()).unwrap_or(0))
    }

    fn ensure_column(conn: &Connection, table: &str, column: &str, decl: &str) -> Result<()> {
        if !Self::column_exists(conn, table, column)? {
            conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {column} {decl}"), [])
                .with_context(|| format!("add {table}.{column} column"))?;
        }
        Ok(())
    }

    fn migrate(conn: &Connection) -> Result<()> {
        let version = Self::schema_version(conn)?;
        if version > SCHEMA_VERSION {
            anyhow::bail!(
                "store schema version {} is newer than supported {}",
                version,
                SCHEMA_VERSION
            );
        }
        if version == SCHEMA_VERSION {
            return Ok(());
        }

        // Databases from before the popularity counters and multi-attachment
        // support lack these columns; they must exist before the schema pass
        // creates the FTS triggers that reference them.
        if Self::table_exists(conn, "material")? {
            Self::ensure_column(conn, "material", "description", "TEXT")?;
            Self::ensure_column(conn, "material", "views", "INTEGER NOT NULL DEFAULT 0")?;
            Self::ensure_column(conn, "material", "downloads", "INTEGER NOT NULL DEFAULT 0")?;
        }
        if Self::table_exists(conn, "material_file")? {
            Self::ensure_column(conn, "material_file", "is_main", "INTEGER DEFAULT 0")?;
        }
        Self::create_schema(conn)?;
        Self::set_meta(conn, "schema_version", &SCHEMA_VERSION.to_string())?;
        Self::set_meta(conn, "fts_version", FTS_VERSION)?;
        Self::rebuild_fts_conn(conn)?;
        Ok(())
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let user_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM user", [], |row| row.get(0))
            .context("count users")?;
        let material_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM material", [], |row| row.get(0))
            .context("count materials")?;
        let attachment_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM material_file", [], |row| row.get(0))
            .context("count attachments")?;
        let favorite_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM favorite", [], |row| row.get(0))
            .context("count favorites")?;
        let db_size_bytes = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        Ok(StoreStats {
            user_count,
            material_count,
            attachment_count,
            favorite_count,
            db_size_bytes,
        })
    }

    pub fn integrity_check(&self) -> Result<IntegrityReport> {
        let status: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))
            .context("integrity_check")?;
        let stats = self.stats()?;
        Ok(IntegrityReport { status, stats })
    }

    pub fn consistency_report(&self) -> Result<ConsistencyReport> {
        let material_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM material", [], |row| row.get(0))
            .context("count materials")?;
        let fts_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM material_fts", [], |row| row.get(0))
            .context("count fts")?;
        let fts_missing: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*)\n                 FROM material\n                 LEFT JOIN material_fts ON material_fts.rowid = material.id\n                 WHERE material_fts.rowid IS NULL",
                [],
                |row| row.get(0),
            )
            .context("fts missing")?;
        Ok(ConsistencyReport {
            material_count,
            fts_count,
            fts_missing,
        })
    }

    pub fn rebuild_fts(&self) -> Result<()> {
        Self::rebuild_fts_conn(&self.conn)
    }

    fn rebuild_fts_conn(conn: &Connection) -> Result<()> {
        conn.execute("INSERT INTO material_fts(material_fts) VALUES('rebuild')", [])
            .context("rebuild fts")?;
        Ok(())
    }

    pub fn compact(&self) -> Result<()> {
        self.conn.execute_batch("VACUUM;").context("vacuum")?;
        Ok(())
    }

    pub fn create_user(&self, email: &str, name: &str) -> Result<UserRow> {
        let created_at = now_rfc3339()?;
        let email = email.trim().to_lowercase();
        self.conn
            .execute(
                "INSERT INTO user (email, name, created_at) VALUES (?1, ?2, ?3)",
                params![email, name, created_at],
            )
            .context("insert user")?;
        Ok(UserRow {
            id: self.conn.last_insert_rowid(),
            email,
            name: name.to_string(),
            created_at,
        })
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.conn
            .query_row(
                "SELECT id, email, name, created_at FROM user WHERE lower(email) = lower(?1)",
                params![email],
                map_user_row,
            )
            .optional()
            .context("find user by email")
    }

    pub fn find_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.conn
            .query_row(
                "SELECT id, email, name, created_at FROM user WHERE id = ?1",
                params![id],
                map_user_row,
            )
            .optional()
            .context("find user by id")
    }

    pub fn material_exists(&self, id: i64) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM material WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .context("check material")?;
        Ok(count > 0)
    }

    /// Stored main-file link of a material, for the download path.
    pub fn material_link(&self, id: i64) -> Result<Option<(Option<String>, Option<String>)>> {
        self.conn
            .query_row(
                "SELECT file_url, file_name FROM material WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("read material link")
    }

    pub fn add_favorite(&self, user_id: i64, material_id: i64) -> Result<()> {
        let created_at = now_rfc3339()?;
        self.conn
            .execute(
                "INSERT OR IGNORE INTO favorite (user_id, material_id, created_at) VALUES (?1, ?2, ?3)",
                params![user_id, material_id, created_at],
            )
            .context("insert favorite")?;
        Ok(())
    }

    pub fn remove_favorite(&self, user_id: i64, material_id: i64) -> Result<usize> {
        self.conn
            .execute(
                "DELETE FROM favorite WHERE user_id = ?1 AND material_id = ?2",
                params![user_id, material_id],
            )
            .context("delete favorite")
    }

    pub fn increment_views(&self, material_id: i64) -> Result<usize> {
        self.conn
            .execute(
                "UPDATE material SET views = views + 1 WHERE id = ?1",
                params![material_id],
            )
            .context("increment views")
    }

    pub fn increment_downloads(&self, material_id: i64) -> Result<usize> {
        self.conn
            .execute(
                "UPDATE material SET downloads = downloads + 1 WHERE id = ?1",
                params![material_id],
            )
            .context("increment downloads")
    }

    /// Attachments for a set of materials, newest first. Used by the caller
    /// of the listing query to enrich a returned page.
    pub fn list_files_by_material_ids(&self, ids: &[i64]) -> Result<Vec<AttachmentRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, material_id, file_url, file_name, is_main, size, mime_type\n             FROM material_file\n             WHERE material_id IN ({})\n             ORDER BY datetime(created_at) DESC, id DESC",
            placeholders
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
            Ok(AttachmentRow {
                id: row.get(0)?,
                material_id: row.get(1)?,
                file_url: row.get(2)?,
                file_name: row.get(3)?,
                is_main: row.get::<_, i64>(4)? != 0,
                size: row.get(5)?,
                mime_type: row.get(6)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn map_user_row(row: &rusqlite::Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Some(lock) = self.lock.take() {
            let path = lock.path.clone();
            let mode = lock.mode;
            drop(lock);
            if matches!(mode, StoreMode::ReadWrite) {
                let _ = fs::remove_file(path);
            }
        }
    }
}
