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

//! Shared row types used across the store, search, and output layers.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub created_at: String,
}

/// A material as returned by the listing query: the base row joined with the
/// author's display fields.
#[derive(Debug, Clone, Serialize)]
pub struct MaterialRow {
    pub id: i64,
    pub title: String,
    pub subject: String,
    pub grade: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: Option<String>,
    pub link: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub size: Option<i64>,
    pub mime_type: Option<String>,
    pub created_at: String,
    pub views: i64,
    pub downloads: i64,
    pub author_name: String,
    pub author_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentRow {
    pub id: i64,
    #[serde(skip)]
    pub material_id: i64,
    pub file_url: String,
    pub file_name: String,
    pub is_main: bool,
    pub size: Option<i64>,
    pub mime_type: Option<String>,
}

/// A listed material enriched with its attachments. Assembled by the caller
/// of the search path, not by the search query itself.
#[derive(Debug, Clone, Serialize)]
pub struct MaterialWithAttachments {
    #[serde(flatten)]
    pub material: MaterialRow,
    pub attachments: Vec<AttachmentRow>,
}
