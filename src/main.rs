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

mod catalog;
mod cli;
mod config;
mod model;
mod normalize;
mod output;
mod query;
mod sql;
mod store;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context as _;
use anyhow::Result;
use clap::Parser;

use crate::catalog::MaterialPatch;
use crate::catalog::NewAttachment;
use crate::catalog::NewMaterial;
use crate::cli::Cli;
use crate::cli::Commands;
use crate::config::Config;
use crate::config::ConfigCtx;
use crate::model::AttachmentRow;
use crate::model::MaterialWithAttachments;
use crate::normalize::ListRequest;
use crate::normalize::NormalizedQuery;
use crate::output::JsonResponse;
use crate::output::QueryOut;
use crate::output::StatsOut;
use crate::output::print_json;
use crate::store::Store;
use crate::store::StoreMode;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init { path } => cmd_init(path),
        Commands::Register(args) => {
            let json = args.json;
            handle_result(cmd_register(args), json)
        }
        Commands::Add(args) => {
            let json = args.json;
            handle_result(cmd_add(args), json)
        }
        Commands::Update(args) => {
            let json = args.json;
            handle_result(cmd_update(args), json)
        }
        Commands::Rm(args) => {
            let json = args.json;
            handle_result(cmd_rm(args), json)
        }
        Commands::List(args) => {
            let json = args.json;
            handle_result(cmd_list(args), json)
        }
        Commands::Favorite(args) => {
            let json = args.json;
            handle_result(cmd_favorite(args, true), json)
        }
        Commands::Unfavorite(args) => {
            let json = args.json;
            handle_result(cmd_favorite(args, false), json)
        }
        Commands::View(args) => {
            let json = args.json;
            handle_result(cmd_view(args), json)
        }
        Commands::Download(args) => {
            let json = args.json;
            handle_result(cmd_download(args), json)
        }
        Commands::Stats { json } => handle_result(cmd_stats(json), json),
        Commands::Doctor(args) => {
            let json = args.json;
            handle_result(cmd_doctor(args), json)
        }
        Commands::Compact { json } => handle_result(cmd_compact(json), json),
    }
}

fn handle_result(result: Result<()>, json: bool) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            if json {
                let resp = JsonResponse::error("error", &err.to_string());
                print_json(&resp)?;
                Ok(())
            } else {
                Err(err)
            }
        }
    }
}

fn cmd_init(path: Option<PathBuf>) -> Result<()> {
    let root = path.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&root).with_context(|| format!("create dir {root:?}"))?;

    let store_path = match std::env::var("EDUBASE_DB") {
        Ok(db) => PathBuf::from(db),
        Err(_) => root.join(Config::default().store_path),
    };
    if let Some(parent) = store_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| format!("create dir {parent:?}"))?;
    }
    Store::init(&store_path)?;

    println!("Initialized EduBase store at {}", store_path.display());
    Ok(())
}

fn open_store(mode: StoreMode) -> Result<Store> {
    let ctx = ConfigCtx::load_from_cwd()?;
    Store::open(&ctx.store_path(), mode)
}

fn cmd_register(args: cli::RegisterArgs) -> Result<()> {
    let store = open_store(StoreMode::ReadWrite)?;
    if store.find_user_by_email(&args.email)?.is_some() {
        anyhow::bail!("email {} is already registered", args.email.trim());
    }
    let user = store.create_user(&args.email, &args.name)?;

    if args.json {
        let resp = JsonResponse::ok().with_user(serde_json::to_value(&user)?);
        print_json(&resp)?;
    } else {
        println!("Registered user {} ({})", user.id, user.email);
    }
    Ok(())
}

fn parse_attachment(spec: &str) -> Result<NewAttachment> {
    let mut parts = spec.splitn(4, ',');
    let file_url = parts.next().unwrap_or("").trim();
    let file_name = parts.next().unwrap_or("").trim();
    if file_url.is_empty() || file_name.is_empty() {
        anyhow::bail!("attachment must be URL,NAME[,SIZE[,MIME]]: {spec}");
    }
    let size = match parts.next().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            raw.parse::<i64>()
                .with_context(|| format!("attachment size is not a number: {raw}"))?,
        ),
        None => None,
    };
    let mime_type = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    Ok(NewAttachment {
        file_url: file_url.to_string(),
        file_name: file_name.to_string(),
        size,
        mime_type,
    })
}

fn cmd_add(args: cli::AddArgs) -> Result<()> {
    let store = open_store(StoreMode::ReadWrite)?;
    let files = args
        .files
        .iter()
        .map(|spec| parse_attachment(spec))
        .collect::<Result<Vec<_>>>()?;
    let new = NewMaterial {
        author: args.author,
        title: args.title,
        subject: args.subject,
        grade: args.grade,
        kind: args.kind,
        description: args.description,
        link: args.link,
        files,
    };
    let id = catalog::create_material(&store, &new)?;

    if args.json {
        let resp = JsonResponse::ok().with_material(serde_json::json!({ "id": id }));
        print_json(&resp)?;
    } else {
        println!("Added material {id}");
    }
    Ok(())
}

fn cmd_update(args: cli::UpdateArgs) -> Result<()> {
    let store = open_store(StoreMode::ReadWrite)?;
    if !store.material_exists(args.id)? {
        anyhow::bail!("material {} not found", args.id);
    }
    let patch = MaterialPatch {
        title: args.title,
        subject: args.subject,
        grade: args.grade,
        kind: args.kind,
        description: args.description,
        link: args.link,
    };
    let changed = catalog::update_material(&store, args.id, &patch)?;

    if args.json {
        let resp = JsonResponse::ok()
            .with_material(serde_json::json!({ "id": args.id, "changed": changed }));
        print_json(&resp)?;
    } else if changed == 0 {
        println!("No changes for material {}", args.id);
    } else {
        println!("Updated material {}", args.id);
    }
    Ok(())
}

fn cmd_rm(args: cli::RmArgs) -> Result<()> {
    let store = open_store(StoreMode::ReadWrite)?;
    let removed = catalog::delete_material(&store, args.id)?;
    if removed == 0 {
        anyhow::bail!("material {} not found", args.id);
    }

    if args.json {
        let resp = JsonResponse::ok().with_material(serde_json::json!({ "id": args.id }));
        print_json(&resp)?;
    } else {
        println!("Removed material {}", args.id);
    }
    Ok(())
}

fn cmd_list(args: cli::ListArgs) -> Result<()> {
    let started = Instant::now();
    let store = open_store(StoreMode::ReadOnly)?;

    let req = ListRequest {
        q: args.query,
        subject: args.subject,
        grade: args.grade,
        kind: args.kind,
        limit: args.limit,
        offset: args.offset,
        sort: args.sort,
        favorite_of: args.favorites_of,
    };
    let nq = NormalizedQuery::from_request(&req);
    let items = query::list_materials(&store, &nq)?;

    let ids: Vec<i64> = items.iter().map(|m| m.id).collect();
    let files = store.list_files_by_material_ids(&ids)?;
    let mut by_material: HashMap<i64, Vec<AttachmentRow>> = HashMap::new();
    for file in files {
        by_material.entry(file.material_id).or_default().push(file);
    }
    let returned = items.len() as i64;
    // Heuristic "has more": a full page suggests another one.
    let next_offset = (returned == nq.limit).then(|| nq.offset + nq.limit);
    let enriched: Vec<MaterialWithAttachments> = items
        .into_iter()
        .map(|material| MaterialWithAttachments {
            attachments: by_material.remove(&material.id).unwrap_or_default(),
            material,
        })
        .collect();

    if args.json {
        let materials = enriched
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        let resp = JsonResponse::ok()
            .with_query(query_out(&req, &nq))
            .with_materials(materials)
            .with_stats(StatsOut {
                took_ms: started.elapsed().as_millis() as i64,
                returned,
                ..Default::default()
            })
            .with_next_offset(next_offset);
        print_json(&resp)?;
    } else {
        for item in &enriched {
            let m = &item.material;
            println!(
                "{}\t{}\t{}\t{}\t{}\t{}",
                m.id, m.title, m.subject, m.grade, m.kind, m.author_name
            );
        }
    }
    Ok(())
}

fn query_out(req: &ListRequest, nq: &NormalizedQuery) -> QueryOut {
    let active = |s: &String| {
        if s.is_empty() {
            None
        } else {
            Some(s.clone())
        }
    };
    QueryOut {
        text: req.q.clone().unwrap_or_default(),
        match_expr: active(&nq.match_expr),
        subject: active(&nq.subject),
        grade: active(&nq.grade),
        kind: active(&nq.kind),
        sort: nq.sort.as_str().to_string(),
        limit: nq.limit,
        offset: nq.offset,
        favorite_of: nq.favorite_of,
    }
}

fn cmd_favorite(args: cli::FavoriteArgs, add: bool) -> Result<()> {
    let store = open_store(StoreMode::ReadWrite)?;
    if !store.material_exists(args.id)? {
        anyhow::bail!("material {} not found", args.id);
    }
    if add {
        if store.find_user_by_id(args.user)?.is_none() {
            anyhow::bail!("user {} not found", args.user);
        }
        store.add_favorite(args.user, args.id)?;
    } else {
        store.remove_favorite(args.user, args.id)?;
    }

    if args.json {
        let resp = JsonResponse::ok().with_material(serde_json::json!({ "id": args.id }));
        print_json(&resp)?;
    } else if add {
        println!("Favorited material {} for user {}", args.id, args.user);
    } else {
        println!("Unfavorited material {} for user {}", args.id, args.user);
    }
    Ok(())
}

fn cmd_view(args: cli::CounterArgs) -> Result<()> {
    let store = open_store(StoreMode::ReadWrite)?;
    if store.increment_views(args.id)? == 0 {
        anyhow::bail!("material {} not found", args.id);
    }

    if args.json {
        let resp = JsonResponse::ok().with_material(serde_json::json!({ "id": args.id }));
        print_json(&resp)?;
    } else {
        println!("Recorded view of material {}", args.id);
    }
    Ok(())
}

fn cmd_download(args: cli::CounterArgs) -> Result<()> {
    let store = open_store(StoreMode::ReadWrite)?;
    let Some((file_url, file_name)) = store.material_link(args.id)? else {
        anyhow::bail!("material {} not found", args.id);
    };
    let Some(file_url) = file_url else {
        anyhow::bail!("no file for material {}", args.id);
    };
    store.increment_downloads(args.id)?;

    if args.json {
        let resp = JsonResponse::ok().with_material(serde_json::json!({
            "id": args.id,
            "file_url": file_url,
            "file_name": file_name,
        }));
        print_json(&resp)?;
    } else {
        println!("{file_url}");
    }
    Ok(())
}

fn cmd_stats(json: bool) -> Result<()> {
    let store = open_store(StoreMode::ReadOnly)?;
    let stats = store.stats()?;

    if json {
        let resp = JsonResponse::ok().with_stats(StatsOut {
            took_ms: 0,
            returned: 0,
            user_count: Some(stats.user_count),
            material_count: Some(stats.material_count),
            attachment_count: Some(stats.attachment_count),
            favorite_count: Some(stats.favorite_count),
            db_size_bytes: Some(stats.db_size_bytes),
        });
        print_json(&resp)?;
    } else {
        println!("Users: {}", stats.user_count);
        println!("Materials: {}", stats.material_count);
        println!("Attachments: {}", stats.attachment_count);
        println!("Favorites: {}", stats.favorite_count);
        println!("DB size: {} bytes", stats.db_size_bytes);
    }
    Ok(())
}

fn cmd_doctor(args: cli::DoctorArgs) -> Result<()> {
    let mode = if args.rebuild_fts {
        StoreMode::ReadWrite
    } else {
        StoreMode::ReadOnly
    };
    let store = open_store(mode)?;
    if args.rebuild_fts {
        store.rebuild_fts()?;
    }
    let report = store.integrity_check()?;
    let consistency = store.consistency_report()?;

    if args.json {
        let resp = JsonResponse::ok()
            .with_diagnostics(serde_json::json!({
                "integrity": report.status,
                "consistency": consistency,
            }))
            .with_stats(StatsOut {
                took_ms: 0,
                returned: 0,
                user_count: Some(report.stats.user_count),
                material_count: Some(report.stats.material_count),
                attachment_count: Some(report.stats.attachment_count),
                favorite_count: Some(report.stats.favorite_count),
                db_size_bytes: Some(report.stats.db_size_bytes),
            });
        print_json(&resp)?;
    } else {
        println!("Integrity: {}", report.status);
        println!(
            "FTS: {} ({} materials, {} indexed, {} missing)",
            if consistency.fts_ok() { "ok" } else { "stale" },
            consistency.material_count,
            consistency.fts_count,
            consistency.fts_missing
        );
    }
    Ok(())
}

fn cmd_compact(json: bool) -> Result<()> {
    let store = open_store(StoreMode::ReadWrite)?;
    store.compact()?;

    if json {
        let resp = JsonResponse::ok();
        print_json(&resp)?;
    } else {
        println!("Compaction complete");
    }
    Ok(())
}
