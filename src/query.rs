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

//! Ranked listing of materials.
//!
//! Takes a [`NormalizedQuery`], folds the active filters into one SELECT over
//! the material table (joined with the author table, and with the FTS index
//! when text search is active), and returns a page of rows in the resolved
//! order. Read-only and stateless; storage errors propagate to the caller.

use anyhow::Result;
use rusqlite::Row;
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;

use crate::model::MaterialRow;
use crate::normalize::NormalizedQuery;
use crate::normalize::SortMode;
use crate::sql::SqlColumn;
use crate::sql::SqlExpr;
use crate::sql::SqlFragment;
use crate::sql::SqlJoin;
use crate::sql::SqlOrderBy;
use crate::sql::SqlSelectBuilder;
use crate::sql::SqlSelectItem;
use crate::sql::SqlTable;
use crate::store::Store;

/// One active filter. All active predicates AND-compose.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals { column: SqlColumn, value: String },
    TextMatch { expr: String },
    FavoriteOf { user_id: i64 },
}

pub fn predicates(nq: &NormalizedQuery) -> Vec<Predicate> {
    let mut preds = Vec::new();
    for (column, value) in [
        (SqlColumn::MaterialSubject, &nq.subject),
        (SqlColumn::MaterialGrade, &nq.grade),
        (SqlColumn::MaterialType, &nq.kind),
    ] {
        if !value.is_empty() {
            preds.push(Predicate::Equals {
                column,
                value: value.clone(),
            });
        }
    }
    if nq.text_search_active() {
        preds.push(Predicate::TextMatch {
            expr: nq.match_expr.clone(),
        });
    }
    if let Some(user_id) = nq.favorite_of {
        preds.push(Predicate::FavoriteOf { user_id });
    }
    preds
}

fn fold_predicates(preds: &[Predicate]) -> SqlFragment {
    let mut clause: Option<SqlFragment> = None;
    for pred in preds {
        let fragment = match pred {
            Predicate::Equals { column, value } => SqlFragment::cmp(
                SqlExpr::column(*column),
                "=",
                SqlValue::from(value.clone()),
            ),
            Predicate::TextMatch { expr } => SqlFragment::cmp(
                SqlExpr::raw("material_fts"),
                "MATCH",
                SqlValue::from(expr.clone()),
            ),
            Predicate::FavoriteOf { user_id } => SqlFragment::exists(
                "SELECT 1 FROM favorite WHERE favorite.material_id = material.id \
                 AND favorite.user_id = ?",
                vec![SqlValue::from(*user_id)],
            ),
        };
        clause = Some(match clause {
            Some(acc) => acc.and(fragment),
            None => fragment,
        });
    }
    clause.unwrap_or_else(|| SqlFragment::raw("1=1"))
}

/// Resolve the ordering chain. With an active text search, both the default
/// and the explicit relevance sort rank by match quality (FTS5 bm25 scores
/// are smaller-is-better, so ascending puts the best match first). The
/// trailing id key closes created_at ties deterministically.
fn order_chain(sort: SortMode, text_active: bool) -> Vec<SqlOrderBy> {
    let created_desc = || SqlOrderBy::desc(SqlExpr::raw("datetime(material.created_at)"));
    let id_desc = || SqlOrderBy::desc(SqlExpr::column(SqlColumn::MaterialId));

    if text_active && matches!(sort, SortMode::Relevance | SortMode::New) {
        return vec![
            SqlOrderBy::asc(SqlExpr::raw("bm25(material_fts)")),
            created_desc(),
            id_desc(),
        ];
    }
    match sort {
        SortMode::Popular => vec![
            SqlOrderBy::desc(SqlExpr::column(SqlColumn::MaterialDownloads)),
            SqlOrderBy::desc(SqlExpr::column(SqlColumn::MaterialViews)),
            created_desc(),
            id_desc(),
        ],
        _ => vec![created_desc(), id_desc()],
    }
}

/// Execute the listing query: up to `limit` materials after skipping
/// `offset` matches, each carrying the author's display fields.
pub fn list_materials(store: &Store, nq: &NormalizedQuery) -> Result<Vec<MaterialRow>> {
    let preds = predicates(nq);
    let clause = fold_predicates(&preds);

    let mut builder = SqlSelectBuilder::new(SqlTable::Material)
        .select([
            SqlSelectItem::new(SqlExpr::column(SqlColumn::MaterialId)),
            SqlSelectItem::new(SqlExpr::column(SqlColumn::MaterialTitle)),
            SqlSelectItem::new(SqlExpr::column(SqlColumn::MaterialSubject)),
            SqlSelectItem::new(SqlExpr::column(SqlColumn::MaterialGrade)),
            SqlSelectItem::new(SqlExpr::column(SqlColumn::MaterialType)),
            SqlSelectItem::new(SqlExpr::column(SqlColumn::MaterialDescription)),
            SqlSelectItem::new(SqlExpr::column(SqlColumn::MaterialLink)),
            SqlSelectItem::new(SqlExpr::column(SqlColumn::MaterialFileUrl)),
            SqlSelectItem::new(SqlExpr::column(SqlColumn::MaterialFileName)),
            SqlSelectItem::new(SqlExpr::column(SqlColumn::MaterialSize)),
            SqlSelectItem::new(SqlExpr::column(SqlColumn::MaterialMimeType)),
            SqlSelectItem::new(SqlExpr::column(SqlColumn::MaterialViews)),
            SqlSelectItem::new(SqlExpr::column(SqlColumn::MaterialDownloads)),
            SqlSelectItem::new(SqlExpr::column(SqlColumn::MaterialCreatedAt)),
            SqlSelectItem::new(SqlExpr::column(SqlColumn::UserName)).alias("author_name"),
            SqlSelectItem::new(SqlExpr::column(SqlColumn::UserId)).alias("author_id"),
        ])
        .join(SqlJoin::inner(
            SqlTable::User,
            SqlColumn::UserId,
            SqlColumn::MaterialUserId,
        ));
    if nq.text_search_active() {
        builder = builder.join(SqlJoin::inner(
            SqlTable::MaterialFts,
            SqlColumn::FtsRowid,
            SqlColumn::MaterialId,
        ));
    }
    for order in order_chain(nq.sort, nq.text_search_active()) {
        builder = builder.order_by(order);
    }
    let (sql, params) = builder
        .where_clause(clause)
        .limit(nq.limit)
        .offset(nq.offset)
        .build();

    let mut stmt = store.conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params), map_material_row)?;
    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

fn map_material_row(row: &Row) -> rusqlite::Result<MaterialRow> {
    Ok(MaterialRow {
        id: row.get(0)?,
        title: row.get(1)?,
        subject: row.get(2)?,
        grade: row.get(3)?,
        kind: row.get(4)?,
        description: row.get(5)?,
        link: row.get(6)?,
        file_url: row.get(7)?,
        file_name: row.get(8)?,
        size: row.get(9)?,
        mime_type: row.get(10)?,
        views: row.get(11)?,
        downloads: row.get(12)?,
        created_at: row.get(13)?,
        author_name: row.get(14)?,
        author_id: row.get(15)?,
    })
}
