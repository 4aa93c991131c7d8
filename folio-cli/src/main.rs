// Folio - Page tree and URL resolution for content sites
// Copyright (C) 2025 Folio Project Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

mod config;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use folio_core::models::deletion::describe_blockers;
use folio_core::models::page::Page;
use folio_core::models::page_part::PagePart;
use folio_core::models::page_tree::PageTree;
use folio_core::models::page_url::{PageUrl, PathOptions};
use folio_core::models::resolution::ResolutionContext;
use folio_db::{PagePartRepository, PageRepository};
use sqlx::SqlitePool;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Folio CLI tool for page tree management and url resolution")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database url (overrides configuration)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Locale used for slugs and custom slug lookups
    #[arg(long, global = true)]
    locale: Option<String>,

    /// Locale the visitor browses in
    #[arg(long, global = true)]
    frontend_locale: Option<String>,

    /// Resolve flat `/pages/<slug>` urls instead of nested ones
    #[arg(long, global = true)]
    flat: bool,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database (create tables)
    Init,

    /// Page management commands
    Page {
        #[command(subcommand)]
        command: PageCommands,
    },

    /// Page part management commands
    Part {
        #[command(subcommand)]
        command: PartCommands,
    },
}

#[derive(Subcommand)]
enum PageCommands {
    /// Create a new page
    Create {
        /// Page title
        title: String,
        /// Parent page id
        #[arg(long)]
        parent: Option<i64>,
        #[arg(long)]
        menu_title: Option<String>,
        /// Custom slug for the current locale
        #[arg(long)]
        slug: Option<String>,
        /// Literal url this page points to
        #[arg(long)]
        link_url: Option<String>,
        /// Pattern of request paths that highlight this page in menus
        #[arg(long)]
        menu_match: Option<String>,
        /// Protect the page against deletion
        #[arg(long)]
        locked: bool,
        #[arg(long)]
        draft: bool,
        /// Hide the page from menus
        #[arg(long)]
        hidden: bool,
        #[arg(long)]
        skip_to_first_child: bool,
        /// Sibling position (defaults to after the last sibling)
        #[arg(long)]
        position: Option<i32>,
    },

    /// Update attributes of an existing page
    Update {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        menu_title: Option<String>,
        /// Custom slug for the current locale (empty to clear)
        #[arg(long)]
        slug: Option<String>,
        #[arg(long)]
        browser_title: Option<String>,
        #[arg(long)]
        meta_keywords: Option<String>,
        #[arg(long)]
        meta_description: Option<String>,
        #[arg(long)]
        draft: Option<bool>,
    },

    /// Show a page with its resolved slug and url
    Show { id: i64 },

    /// Print the whole page tree
    Tree,

    /// Print the url of a page
    Url {
        id: i64,
        /// Use the navigation url (honours skip-to-first-child)
        #[arg(long)]
        menu: bool,
    },

    /// Print the ancestor title path of a page
    Path {
        id: i64,
        /// Page first instead of root first
        #[arg(long)]
        natural: bool,
        #[arg(long, default_value = " - ")]
        joiner: String,
    },

    /// Find the page served at a nested path such as `/about/team`
    Find { path: String },

    /// Move a page under another parent (top level when omitted)
    Move {
        id: i64,
        #[arg(long)]
        parent: Option<i64>,
    },

    /// Destroy a page unless the deletion policy protects it
    Destroy { id: i64 },
}

#[derive(Subcommand)]
enum PartCommands {
    /// Append a part to a page
    Add {
        page_id: i64,
        title: String,
        content: String,
        #[arg(long)]
        position: Option<i32>,
    },

    /// List the parts of a page in position order
    List { page_id: i64 },

    /// Print the wrapped content of one part, or of all parts
    Content {
        page_id: i64,
        /// Part title (case-insensitive)
        title: Option<String>,
    },

    /// Update a part
    Update {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        position: Option<i32>,
    },

    /// Delete a part
    Remove { id: i64 },

    /// Renumber part positions of a page to 0, 1, 2, ...
    Reposition { page_id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio_cli=info,folio_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = apply_overrides(Config::from_env()?, &cli);
    let ctx = config.to_resolution_context();

    let pool = folio_db::init_database(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;

    let output = Output { json: cli.json };

    match cli.command {
        Commands::Init => {
            info!(database_url = %config.database_url, "Database initialized");
            println!("Database initialized at: {}", config.database_url);
            Ok(())
        }
        Commands::Page { command } => handle_page_command(command, pool, &ctx, &output).await,
        Commands::Part { command } => handle_part_command(command, pool, &output).await,
    }
}

fn apply_overrides(mut config: Config, cli: &Cli) -> Config {
    if let Some(database_url) = &cli.database_url {
        config.database_url = database_url.clone();
    }
    if let Some(locale) = &cli.locale {
        config.locale = locale.clone();
    }
    if let Some(frontend_locale) = &cli.frontend_locale {
        config.frontend_locale = Some(frontend_locale.clone());
    }
    if cli.flat {
        config.marketable_urls = false;
    }
    config
}

struct Output {
    json: bool,
}

impl Output {
    fn emit(&self, value: serde_json::Value, text: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(&value)?);
        } else {
            println!("{}", text());
        }
        Ok(())
    }
}

async fn handle_page_command(
    command: PageCommands,
    pool: SqlitePool,
    ctx: &ResolutionContext,
    output: &Output,
) -> Result<()> {
    let repo = PageRepository::new(pool);

    match command {
        PageCommands::Create {
            title,
            parent,
            menu_title,
            slug,
            link_url,
            menu_match,
            locked,
            draft,
            hidden,
            skip_to_first_child,
            position,
        } => {
            let mut page = match parent {
                Some(parent_id) => Page::new_with_parent(parent_id, title),
                None => Page::new(title),
            };
            page.menu_title = menu_title;
            page.link_url = link_url;
            page.menu_match = menu_match;
            page.deletable = !locked;
            page.draft = draft;
            page.show_in_menu = !hidden;
            page.skip_to_first_child = skip_to_first_child;
            if let Some(slug) = slug {
                page.set_custom_slug(ctx.locale.clone(), slug);
            }
            page.position = match position {
                Some(position) => position,
                None => next_sibling_position(&repo, parent).await?,
            };

            let id = repo.save(&mut page).await?;
            info!(page_id = id, title = %page.title, "Page created");

            let tree = repo.load_tree().await?;
            let url = resolve_url(&tree, id, ctx, false)?;
            output.emit(
                serde_json::json!({ "id": id, "slug": page.slug(ctx), "url": url.href() }),
                || format!("Created page {} ({}) at {}", id, page.title, url),
            )
        }

        PageCommands::Update {
            id,
            title,
            menu_title,
            slug,
            browser_title,
            meta_keywords,
            meta_description,
            draft,
        } => {
            let mut page = find_page(&repo, id).await?;
            if let Some(title) = title {
                page.title = title;
            }
            if let Some(menu_title) = menu_title {
                page.menu_title = Some(menu_title);
            }
            if let Some(slug) = slug {
                page.set_custom_slug(ctx.locale.clone(), slug);
            }
            if let Some(browser_title) = browser_title {
                page.browser_title = Some(browser_title);
            }
            if let Some(meta_keywords) = meta_keywords {
                page.meta_keywords = Some(meta_keywords);
            }
            if let Some(meta_description) = meta_description {
                page.meta_description = Some(meta_description);
            }
            if let Some(draft) = draft {
                page.draft = draft;
            }
            page.touch();

            repo.save(&mut page).await?;
            info!(page_id = id, "Page updated");
            output.emit(
                serde_json::json!({ "id": id, "slug": page.slug(ctx) }),
                || format!("Updated page {} ({})", id, page.title),
            )
        }

        PageCommands::Show { id } => {
            let tree = repo.load_tree().await?;
            let page = tree
                .get(id)
                .ok_or_else(|| anyhow!("Page with id {} not found", id))?;
            let url = resolve_url(&tree, id, ctx, false)?;
            let path = tree.path(id, &PathOptions::default()).unwrap_or_default();
            let blockers = tree.deletion_blockers(id).unwrap_or_default();

            output.emit(
                serde_json::json!({
                    "page": page,
                    "slug": page.slug(ctx),
                    "url": url,
                    "path": path,
                    "deletion_blockers": blockers,
                }),
                || {
                    let mut lines = vec![
                        format!("ID: {}", id),
                        format!("Title: {}", page.title),
                        format!("Browser title: {}", page.browser_title()),
                        format!("Slug: {}", page.slug(ctx)),
                        format!("Url: {}", url),
                        format!("Path: {}", path),
                        format!("Live: {}", yes_no(page.is_live())),
                        format!("In menu: {}", yes_no(page.in_menu())),
                    ];
                    if blockers.is_empty() {
                        lines.push("Deletable: yes".to_string());
                    } else {
                        lines.push(format!("Deletable: no ({})", describe_blockers(&blockers)));
                    }
                    for part in page.parts.ordered() {
                        lines.push(format!("Part [{}] {}", part.position, part.title));
                    }
                    lines.join("\n")
                },
            )
        }

        PageCommands::Tree => {
            let tree = repo.load_tree().await?;
            let mut lines = Vec::new();
            for root in tree.roots() {
                if let Some(root_id) = root.id {
                    render_subtree(&tree, root_id, 0, ctx, &mut lines)?;
                }
            }
            let entries: Vec<serde_json::Value> = tree
                .iter()
                .filter_map(|page| {
                    let id = page.id?;
                    Some(serde_json::json!({
                        "id": id,
                        "parent_id": page.parent_id,
                        "title": page.title,
                        "slug": page.slug(ctx),
                        "url": tree.url(id, ctx).map(|url| url.href()),
                    }))
                })
                .collect();

            output.emit(serde_json::Value::Array(entries), || lines.join("\n"))
        }

        PageCommands::Url { id, menu } => {
            let tree = repo.load_tree().await?;
            let url = resolve_url(&tree, id, ctx, menu)?;
            output.emit(serde_json::to_value(&url)?, || url.href())
        }

        PageCommands::Path {
            id,
            natural,
            joiner,
        } => {
            let tree = repo.load_tree().await?;
            let options = if natural {
                PathOptions::natural()
            } else {
                PathOptions::default()
            }
            .with_joiner(joiner);
            let path = tree
                .path(id, &options)
                .ok_or_else(|| anyhow!("Page with id {} not found", id))?;
            output.emit(serde_json::json!({ "id": id, "path": path }), || path.clone())
        }

        PageCommands::Find { path } => {
            let tree = repo.load_tree().await?;
            let page = tree
                .find_by_path(ctx, &path)
                .ok_or_else(|| anyhow!("No page found at {}", path))?;
            let id = page.id.context("Loaded page has no ID")?;
            output.emit(
                serde_json::json!({ "id": id, "title": page.title }),
                || format!("{} ({})", id, page.title),
            )
        }

        PageCommands::Move { id, parent } => {
            repo.move_page(id, parent).await?;
            let tree = repo.load_tree().await?;
            let url = resolve_url(&tree, id, ctx, false)?;
            output.emit(
                serde_json::json!({ "id": id, "parent_id": parent, "url": url.href() }),
                || format!("Moved page {} to {}", id, url),
            )
        }

        PageCommands::Destroy { id } => {
            let tree = repo.load_tree().await?;
            let blockers = tree
                .deletion_blockers(id)
                .ok_or_else(|| anyhow!("Page with id {} not found", id))?;
            if !blockers.is_empty() {
                bail!(
                    "Page {} cannot be destroyed because {}",
                    id,
                    describe_blockers(&blockers)
                );
            }

            let page = repo
                .destroy(id)
                .await?
                .ok_or_else(|| anyhow!("Page {} was not destroyed", id))?;
            output.emit(
                serde_json::json!({ "id": id, "destroyed": true }),
                || format!("Destroyed page {} ({})", id, page.title),
            )
        }
    }
}

async fn handle_part_command(command: PartCommands, pool: SqlitePool, output: &Output) -> Result<()> {
    let pages = PageRepository::new(pool.clone());
    let parts = PagePartRepository::new(pool);

    match command {
        PartCommands::Add {
            page_id,
            title,
            content,
            position,
        } => {
            let mut page = find_page(&pages, page_id).await?;
            let part = match position {
                Some(position) => page
                    .parts
                    .push(PagePart::new(title, content, position))
                    .map_err(|e| anyhow!("Cannot add part to page {}: {}", page_id, e))?,
                None => page.parts.add_part(title, content),
            };
            let part = PagePart {
                page_id: Some(page_id),
                ..part.clone()
            };
            let id = parts.create(&part).await?;
            info!(part_id = id, page_id, "Part added");
            output.emit(
                serde_json::json!({ "id": id, "page_id": page_id, "position": part.position }),
                || format!("Added part {} ({}) at position {}", id, part.title, part.position),
            )
        }

        PartCommands::List { page_id } => {
            let list = parts.list_by_page(page_id).await?;
            output.emit(serde_json::to_value(&list)?, || {
                list.iter()
                    .map(|part| {
                        format!(
                            "{}\t[{}] {}",
                            part.id.unwrap_or_default(),
                            part.position,
                            part.title
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }

        PartCommands::Content { page_id, title } => {
            let page = find_page(&pages, page_id).await?;
            let content = match &title {
                Some(title) => page
                    .content_for(title)
                    .ok_or_else(|| anyhow!("Page {} has no part named {}", page_id, title))?,
                None => page.all_page_part_content(),
            };
            output.emit(serde_json::json!({ "content": content }), || content.clone())
        }

        PartCommands::Update {
            id,
            title,
            content,
            position,
        } => {
            let mut part = parts
                .find_by_id(id)
                .await?
                .ok_or_else(|| anyhow!("Part with id {} not found", id))?;
            if let Some(title) = title {
                part.title = title;
            }
            if let Some(content) = content {
                part.content = content;
            }
            if let Some(position) = position {
                part.position = position;
            }
            part.touch();
            parts.update(&part).await?;
            output.emit(
                serde_json::json!({ "id": id, "updated": true }),
                || format!("Updated part {} ({})", id, part.title),
            )
        }

        PartCommands::Remove { id } => {
            parts.delete(id).await?;
            output.emit(
                serde_json::json!({ "id": id, "removed": true }),
                || format!("Removed part {}", id),
            )
        }

        PartCommands::Reposition { page_id } => {
            find_page(&pages, page_id).await?;
            parts.reposition(page_id).await?;
            output.emit(
                serde_json::json!({ "page_id": page_id, "repositioned": true }),
                || format!("Repositioned parts of page {}", page_id),
            )
        }
    }
}

async fn find_page(repo: &PageRepository, id: i64) -> Result<Page> {
    repo.find_by_id(id)
        .await?
        .ok_or_else(|| anyhow!("Page with id {} not found", id))
}

async fn next_sibling_position(repo: &PageRepository, parent: Option<i64>) -> Result<i32> {
    let siblings = match parent {
        Some(parent_id) => {
            find_page(repo, parent_id).await?;
            repo.list_children(parent_id).await?
        }
        None => repo.list_roots().await?,
    };
    Ok(siblings
        .iter()
        .map(|page| page.position)
        .max()
        .map_or(0, |max| max + 1))
}

fn resolve_url(
    tree: &PageTree,
    id: i64,
    ctx: &ResolutionContext,
    menu: bool,
) -> Result<PageUrl> {
    let url = if menu {
        tree.menu_url(id, ctx)
    } else {
        tree.url(id, ctx)
    };
    url.ok_or_else(|| anyhow!("Page with id {} not found", id))
}

fn render_subtree(
    tree: &PageTree,
    id: i64,
    depth: usize,
    ctx: &ResolutionContext,
    lines: &mut Vec<String>,
) -> Result<()> {
    let page = tree
        .get(id)
        .ok_or_else(|| anyhow!("Page with id {} not found", id))?;
    let url = resolve_url(tree, id, ctx, false)?;

    let mut flags = Vec::new();
    if page.draft {
        flags.push("draft");
    }
    if !page.show_in_menu {
        flags.push("hidden");
    }
    if !page.is_deletable() {
        flags.push("locked");
    }
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" ({})", flags.join(", "))
    };

    lines.push(format!(
        "{}- [{}] {} {}{}",
        "  ".repeat(depth),
        id,
        page.menu_label(),
        url,
        flags
    ));

    for child in tree.children(id) {
        if let Some(child_id) = child.id {
            render_subtree(tree, child_id, depth + 1, ctx, lines)?;
        }
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
