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

//! Material lifecycle: create, partial update, delete. The FTS projection
//! and the favorite/attachment relations follow along via triggers and
//! cascading deletes; nothing here touches the search path.

use anyhow::Context;
use anyhow::Result;
use rusqlite::params;

use crate::store::Store;
use crate::store::now_rfc3339;

#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub file_url: String,
    pub file_name: String,
    pub size: Option<i64>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewMaterial {
    pub author: i64,
    pub title: String,
    pub subject: String,
    pub grade: String,
    pub kind: String,
    pub description: Option<String>,
    pub link: Option<String>,
    pub files: Vec<NewAttachment>,
}

#[derive(Debug, Clone, Default)]
pub struct MaterialPatch {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub grade: Option<String>,
    pub kind: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
}

/// Insert a material with its attachments in one transaction. The first file
/// becomes the main file on the material row itself; the rest are stored as
/// additional attachment rows.
pub fn create_material(store: &Store, new: &NewMaterial) -> Result<i64> {
    for (label, value) in [
        ("title", &new.title),
        ("subject", &new.subject),
        ("grade", &new.grade),
        ("type", &new.kind),
    ] {
        if value.trim().is_empty() {
            anyhow::bail!("{label} is required");
        }
    }
    if store.find_user_by_id(new.author)?.is_none() {
        anyhow::bail!("author {} not found", new.author);
    }

    let created_at = now_rfc3339()?;
    let main = new.files.first();

    store
        .conn
        .execute_batch("BEGIN")
        .context("begin transaction")?;
    let result = (|| -> Result<i64> {
        store.conn.execute(
            "INSERT INTO material (user_id, title, subject, grade, type, description, link,\n                                    file_url, file_name, size, mime_type, created_at)\n             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                new.author,
                new.title,
                new.subject,
                new.grade,
                new.kind,
                new.description,
                new.link,
                main.map(|f| f.file_url.clone()),
                main.map(|f| f.file_name.clone()),
                main.and_then(|f| f.size),
                main.and_then(|f| f.mime_type.clone()),
                created_at,
            ],
        )
        .context("insert material")?;
        let id = store.conn.last_insert_rowid();

        for file in new.files.iter().skip(1) {
            store.conn.execute(
                "INSERT INTO material_file (material_id, file_url, file_name, is_main, size,\n                                             mime_type, created_at)\n                 VALUES (?1, ?2, ?3, 1, ?4, ?5, ?6)",
                params![
                    id,
                    file.file_url,
                    file.file_name,
                    file.size,
                    file.mime_type,
                    created_at
                ],
            )
            .context("insert attachment")?;
        }
        Ok(id)
    })();

    match result {
        Ok(id) => {
            store
                .conn
                .execute_batch("COMMIT")
                .context("commit transaction")?;
            Ok(id)
        }
        Err(err) => {
            let _ = store.conn.execute_batch("ROLLBACK");
            Err(err)
        }
    }
}

/// Apply a partial update over the editable columns. Returns the number of
/// updated rows (0 when the material does not exist or the patch is empty).
pub fn update_material(store: &Store, id: i64, patch: &MaterialPatch) -> Result<usize> {
    let mut setters: Vec<&str> = Vec::new();
    let mut values: Vec<rusqlite::types::Value> = Vec::new();
    for (setter, value) in [
        ("title = ?", &patch.title),
        ("subject = ?", &patch.subject),
        ("grade = ?", &patch.grade),
        ("type = ?", &patch.kind),
        ("description = ?", &patch.description),
        ("link = ?", &patch.link),
    ] {
        if let Some(value) = value {
            setters.push(setter);
            values.push(rusqlite::types::Value::from(value.clone()));
        }
    }
    if setters.is_empty() {
        return Ok(0);
    }
    values.push(rusqlite::types::Value::from(id));
    let sql = format!("UPDATE material SET {} WHERE id = ?", setters.join(", "));
    store
        .conn
        .execute(&sql, rusqlite::params_from_iter(values))
        .context("update material")
}

/// Hard delete. Attachments and favorites cascade; the FTS entry is removed
/// by the delete trigger.
pub fn delete_material(store: &Store, id: i64) -> Result<usize> {
    store
        .conn
        .execute("DELETE FROM material WHERE id = ?1", params![id])
        .context("delete material")
}
