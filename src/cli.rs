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

use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;

#[derive(Parser, Debug)]
#[command(
    name = "edubase",
    version,
    about = "Teaching-materials catalog with ranked full-text search"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new catalog store
    Init {
        /// Directory to hold the store
        path: Option<PathBuf>,
    },

    /// Register a teacher
    Register(RegisterArgs),

    /// Add a material
    Add(AddArgs),

    /// Update fields of a material
    Update(UpdateArgs),

    /// Delete a material
    Rm(RmArgs),

    /// List and search materials
    List(ListArgs),

    /// Mark a material as a user's favorite
    Favorite(FavoriteArgs),

    /// Remove a material from a user's favorites
    Unfavorite(FavoriteArgs),

    /// Record a view of a material
    View(CounterArgs),

    /// Record a download and print the stored file link
    Download(CounterArgs),

    /// Show store stats
    Stats {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Run integrity and index-consistency checks
    Doctor(DoctorArgs),

    /// Compact the database
    Compact {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Email address (unique, case-insensitive)
    #[arg(long)]
    pub email: String,

    /// Display name
    #[arg(long)]
    pub name: String,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Author user id
    #[arg(long)]
    pub author: i64,

    /// Material title
    #[arg(long)]
    pub title: String,

    /// Subject category
    #[arg(long)]
    pub subject: String,

    /// Grade category
    #[arg(long)]
    pub grade: String,

    /// Material type (notes, presentation, program, ...)
    #[arg(long = "type")]
    pub kind: String,

    /// Free-text description
    #[arg(long)]
    pub description: Option<String>,

    /// External link
    #[arg(long)]
    pub link: Option<String>,

    /// Attachment as URL,NAME[,SIZE[,MIME]]; repeatable, first is main
    #[arg(long = "file", value_name = "URL,NAME[,SIZE[,MIME]]")]
    pub files: Vec<String>,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Material id
    pub id: i64,

    /// New title
    #[arg(long)]
    pub title: Option<String>,

    /// New subject
    #[arg(long)]
    pub subject: Option<String>,

    /// New grade
    #[arg(long)]
    pub grade: Option<String>,

    /// New type
    #[arg(long = "type")]
    pub kind: Option<String>,

    /// New description
    #[arg(long)]
    pub description: Option<String>,

    /// New external link
    #[arg(long)]
    pub link: Option<String>,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct RmArgs {
    /// Material id
    pub id: i64,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Free-text search over title and description
    pub query: Option<String>,

    /// Filter by subject
    #[arg(long)]
    pub subject: Option<String>,

    /// Filter by grade
    #[arg(long)]
    pub grade: Option<String>,

    /// Filter by type
    #[arg(long = "type")]
    pub kind: Option<String>,

    /// Page size, clamped to 1..=100 (default 20)
    #[arg(long)]
    pub limit: Option<String>,

    /// Matches to skip, clamped to 0..=10000
    #[arg(long)]
    pub offset: Option<String>,

    /// Sort order: new, popular, or relevance
    #[arg(long)]
    pub sort: Option<String>,

    /// Only materials favorited by this user
    #[arg(long, value_name = "USER_ID")]
    pub favorites_of: Option<i64>,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct FavoriteArgs {
    /// Material id
    pub id: i64,

    /// Acting user id
    #[arg(long)]
    pub user: i64,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CounterArgs {
    /// Material id
    pub id: i64,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Rebuild the full-text index before reporting
    #[arg(long)]
    pub rebuild_fts: bool,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}
