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

use super::page_part_repository::{reposition_in_tx, PagePartRow, PART_COLUMNS};
use super::parse_datetime;
use anyhow::{Context, Result};
use folio_core::models::deletion::{describe_blockers, tree_deletion_blockers};
use folio_core::models::page::Page;
use folio_core::models::page_part::{PagePart, PageParts};
use folio_core::models::page_tree::PageTree;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::{BTreeMap, HashMap};

const PAGE_COLUMNS: &str = "id, parent_id, title, menu_title, link_url, menu_match, deletable, draft, show_in_menu, skip_to_first_child, position, meta_keywords, meta_description, browser_title, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct PageRow {
    id: i64,
    parent_id: Option<i64>,
    title: String,
    menu_title: Option<String>,
    link_url: Option<String>,
    menu_match: Option<String>,
    deletable: bool,
    draft: bool,
    show_in_menu: bool,
    skip_to_first_child: bool,
    position: i32,
    meta_keywords: Option<String>,
    meta_description: Option<String>,
    browser_title: Option<String>,
    created_at: String,
    updated_at: String,
}

impl PageRow {
    fn into_page(self) -> Result<Page> {
        Ok(Page {
            id: Some(self.id),
            parent_id: self.parent_id,
            title: self.title,
            menu_title: self.menu_title,
            custom_slugs: BTreeMap::new(),
            link_url: self.link_url,
            menu_match: self.menu_match,
            deletable: self.deletable,
            draft: self.draft,
            show_in_menu: self.show_in_menu,
            skip_to_first_child: self.skip_to_first_child,
            position: self.position,
            meta_keywords: self.meta_keywords,
            meta_description: self.meta_description,
            browser_title: self.browser_title,
            parts: PageParts::new(),
            created_at: parse_datetime(&self.created_at, "created_at")?,
            updated_at: parse_datetime(&self.updated_at, "updated_at")?,
        })
    }
}

pub struct PageRepository {
    pool: SqlitePool,
}

impl PageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a page together with its custom slugs and parts
    pub async fn create(&self, page: &Page) -> Result<i64> {
        page.is_valid()
            .map_err(|e| anyhow::anyhow!("Invalid page: {}", e))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to start transaction")?;

        let result = sqlx::query(
            r#"
            INSERT INTO pages (parent_id, title, menu_title, link_url, menu_match, deletable, draft, show_in_menu, skip_to_first_child, position, meta_keywords, meta_description, browser_title, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(page.parent_id)
        .bind(&page.title)
        .bind(&page.menu_title)
        .bind(&page.link_url)
        .bind(&page.menu_match)
        .bind(page.deletable)
        .bind(page.draft)
        .bind(page.show_in_menu)
        .bind(page.skip_to_first_child)
        .bind(page.position)
        .bind(&page.meta_keywords)
        .bind(&page.meta_description)
        .bind(&page.browser_title)
        .bind(page.created_at)
        .bind(page.updated_at)
        .execute(&mut *tx)
        .await
        .context("Failed to create page")?;

        let id = result.last_insert_rowid();

        write_custom_slugs(&mut tx, id, page).await?;
        for part in &page.parts {
            insert_part(&mut tx, id, part).await?;
        }

        tx.commit().await.context("Failed to commit transaction")?;

        tracing::debug!(page_id = id, title = %page.title, "Created page");
        Ok(id)
    }

    /// Persist every attribute of an existing page. Custom slugs are replaced
    /// and parts are synchronized: parts with an id are updated, parts without
    /// one are inserted and stored parts missing from the page are removed.
    pub async fn update(&self, page: &Page) -> Result<()> {
        let id = page.id.context("Cannot update page without ID")?;

        page.is_valid()
            .map_err(|e| anyhow::anyhow!("Invalid page: {}", e))?;

        if !self.page_exists(id).await? {
            return Err(anyhow::anyhow!("Page with id {} not found", id));
        }
        if self.parent_id_of(id).await? != page.parent_id {
            self.check_new_parent(id, page.parent_id).await?;
        }
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to start transaction")?;

        let rows_affected = sqlx::query(
            r#"
            UPDATE pages
            SET parent_id = ?, title = ?, menu_title = ?, link_url = ?, menu_match = ?, deletable = ?, draft = ?, show_in_menu = ?, skip_to_first_child = ?, position = ?, meta_keywords = ?, meta_description = ?, browser_title = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(page.parent_id)
        .bind(&page.title)
        .bind(&page.menu_title)
        .bind(&page.link_url)
        .bind(&page.menu_match)
        .bind(page.deletable)
        .bind(page.draft)
        .bind(page.show_in_menu)
        .bind(page.skip_to_first_child)
        .bind(page.position)
        .bind(&page.meta_keywords)
        .bind(&page.meta_description)
        .bind(&page.browser_title)
        .bind(page.updated_at)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to update page")?
        .rows_affected();

        if rows_affected == 0 {
            return Err(anyhow::anyhow!("Page with id {} not found", id));
        }

        sqlx::query("DELETE FROM page_custom_slugs WHERE page_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear custom slugs")?;
        write_custom_slugs(&mut tx, id, page).await?;

        sync_parts(&mut tx, id, page).await?;

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(())
    }

    /// Create or update `page`, then refresh it from storage so new ids are
    /// visible to the caller
    pub async fn save(&self, page: &mut Page) -> Result<i64> {
        let id = match page.id {
            Some(id) => {
                self.update(page).await?;
                id
            }
            None => self.create(page).await?,
        };
        page.id = Some(id);
        self.reload(page).await?;
        Ok(id)
    }

    /// Replace `page` with its stored state
    pub async fn reload(&self, page: &mut Page) -> Result<()> {
        let id = page.id.context("Cannot reload page without ID")?;
        *page = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Page with id {} not found", id))?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Page>> {
        let row = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {} FROM pages WHERE id = ?",
            PAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find page by id")?;

        match row {
            Some(row) => {
                let mut pages = vec![row.into_page()?];
                self.hydrate(&mut pages).await?;
                Ok(pages.pop())
            }
            None => Ok(None),
        }
    }

    /// Pages under `parent_id` in position order, then insertion order
    pub async fn list_children(&self, parent_id: i64) -> Result<Vec<Page>> {
        let rows = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {} FROM pages WHERE parent_id = ? ORDER BY position, id",
            PAGE_COLUMNS
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list child pages")?;

        self.into_pages(rows).await
    }

    pub async fn list_roots(&self) -> Result<Vec<Page>> {
        let rows = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {} FROM pages WHERE parent_id IS NULL ORDER BY position, id",
            PAGE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list root pages")?;

        self.into_pages(rows).await
    }

    pub async fn list_all(&self) -> Result<Vec<Page>> {
        let rows = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {} FROM pages ORDER BY parent_id, position, id",
            PAGE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list pages")?;

        self.into_pages(rows).await
    }

    /// Load every page into an in-memory tree for slug and url resolution
    pub async fn load_tree(&self) -> Result<PageTree> {
        let pages = self.list_all().await?;
        let count = pages.len();
        let tree = PageTree::from_pages(pages).context("Stored page hierarchy is inconsistent")?;
        tracing::debug!(pages = count, "Loaded page tree");
        Ok(tree)
    }

    pub async fn find_by_custom_slug(&self, locale: &str, custom_slug: &str) -> Result<Option<Page>> {
        let page_id = sqlx::query_scalar::<_, i64>(
            "SELECT page_id FROM page_custom_slugs WHERE locale = ? AND custom_slug = ?",
        )
        .bind(locale)
        .bind(custom_slug)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find page by custom slug")?;

        match page_id {
            Some(id) => self.find_by_id(id).await,
            None => Ok(None),
        }
    }

    pub async fn has_children(&self, page_id: i64) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM pages WHERE parent_id = ?")
            .bind(page_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to check for child pages")?;

        Ok(count > 0)
    }

    /// Destroy a page and the parts it owns.
    ///
    /// Returns `Ok(None)` without touching storage when the page does not
    /// exist or the deletion policy refuses it.
    pub async fn destroy(&self, id: i64) -> Result<Option<Page>> {
        let page = match self.find_by_id(id).await? {
            Some(page) => page,
            None => {
                tracing::warn!(page_id = id, "Cannot destroy missing page");
                return Ok(None);
            }
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to start transaction")?;

        // Policy is evaluated against the rows the delete will see
        let current = sqlx::query_as::<_, PageRow>(&format!(
            "SELECT {} FROM pages WHERE id = ?",
            PAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to load page for destroy")?;

        let current = match current {
            Some(row) => row.into_page()?,
            None => {
                tracing::warn!(page_id = id, "Cannot destroy missing page");
                return Ok(None);
            }
        };

        let child_count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM pages WHERE parent_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await
                .context("Failed to count child pages")?;

        let blockers = tree_deletion_blockers(&current, child_count as usize);
        if !blockers.is_empty() {
            tracing::warn!(
                page_id = id,
                "Refusing to destroy page because {}",
                describe_blockers(&blockers)
            );
            return Ok(None);
        }

        sqlx::query("DELETE FROM page_parts WHERE page_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete page parts")?;

        sqlx::query("DELETE FROM page_custom_slugs WHERE page_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete custom slugs")?;

        sqlx::query("DELETE FROM pages WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete page")?;

        tx.commit().await.context("Failed to commit transaction")?;

        tracing::info!(page_id = id, title = %page.title, "Destroyed page");
        Ok(Some(page))
    }

    pub async fn is_descendant_of(&self, page_id: i64, potential_ancestor_id: i64) -> Result<bool> {
        // A page cannot be a descendant of itself
        if page_id == potential_ancestor_id {
            return Ok(false);
        }

        let mut current = self.parent_id_of(page_id).await?;
        let mut steps = 0;

        // Walk up the tree looking for the potential ancestor
        while let Some(parent_id) = current {
            if parent_id == potential_ancestor_id {
                return Ok(true);
            }
            steps += 1;
            if steps > 10_000 {
                return Err(anyhow::anyhow!(
                    "Ancestor chain of page {} does not terminate",
                    page_id
                ));
            }
            current = self.parent_id_of(parent_id).await?;
        }

        Ok(false)
    }

    async fn parent_id_of(&self, page_id: i64) -> Result<Option<i64>> {
        let parent = sqlx::query_scalar::<_, Option<i64>>("SELECT parent_id FROM pages WHERE id = ?")
            .bind(page_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch page parent")?;

        Ok(parent.flatten())
    }

    /// Move a page under a new parent (or to the top level), appended after
    /// its new siblings
    pub async fn move_page(&self, page_id: i64, new_parent_id: Option<i64>) -> Result<()> {
        if self.find_by_id(page_id).await?.is_none() {
            return Err(anyhow::anyhow!("Page with id {} not found", page_id));
        }

        self.check_new_parent(page_id, new_parent_id).await?;

        let position = sqlx::query_scalar::<_, Option<i32>>(
            "SELECT MAX(position) FROM pages WHERE parent_id IS ? AND id != ?",
        )
        .bind(new_parent_id)
        .bind(page_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to compute sibling position")?
        .map_or(0, |max| max + 1);

        sqlx::query("UPDATE pages SET parent_id = ?, position = ?, updated_at = ? WHERE id = ?")
            .bind(new_parent_id)
            .bind(position)
            .bind(chrono::Utc::now())
            .bind(page_id)
            .execute(&self.pool)
            .await
            .context("Failed to move page")?;

        tracing::info!(page_id, ?new_parent_id, "Moved page");
        Ok(())
    }

    /// A page may only be attached to an existing page outside its own
    /// subtree.
    async fn check_new_parent(&self, page_id: i64, new_parent_id: Option<i64>) -> Result<()> {
        let Some(parent_id) = new_parent_id else {
            return Ok(());
        };
        if !self.page_exists(parent_id).await? {
            return Err(anyhow::anyhow!("Parent page with id {} not found", parent_id));
        }
        if parent_id == page_id || self.is_descendant_of(parent_id, page_id).await? {
            return Err(anyhow::anyhow!(
                "Cannot move page {} under itself or its descendant {}",
                page_id,
                parent_id
            ));
        }
        Ok(())
    }

    async fn page_exists(&self, page_id: i64) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM pages WHERE id = ?")
            .bind(page_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to check page existence")?;

        Ok(count > 0)
    }

    /// Normalize the part positions of a page to 0, 1, 2, ...
    pub async fn reposition_parts(&self, page_id: i64) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to start transaction")?;

        reposition_in_tx(&mut tx, page_id).await?;

        tx.commit()
            .await
            .context("Failed to commit part repositioning")?;
        Ok(())
    }

    async fn into_pages(&self, rows: Vec<PageRow>) -> Result<Vec<Page>> {
        let mut pages = rows
            .into_iter()
            .map(PageRow::into_page)
            .collect::<Result<Vec<_>>>()?;
        self.hydrate(&mut pages).await?;
        Ok(pages)
    }

    /// Attach custom slugs and parts to freshly loaded pages
    async fn hydrate(&self, pages: &mut [Page]) -> Result<()> {
        if pages.is_empty() {
            return Ok(());
        }

        let ids: Vec<i64> = pages.iter().filter_map(|page| page.id).collect();
        let placeholders = vec!["?"; ids.len()].join(", ");

        let slug_sql = format!(
            "SELECT page_id, locale, custom_slug FROM page_custom_slugs WHERE page_id IN ({})",
            placeholders
        );
        let mut slug_query = sqlx::query_as::<_, (i64, String, String)>(&slug_sql);
        for id in &ids {
            slug_query = slug_query.bind(*id);
        }
        let slug_rows = slug_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to load custom slugs")?;

        let part_sql = format!(
            "SELECT {} FROM page_parts WHERE page_id IN ({}) ORDER BY page_id, position, id",
            PART_COLUMNS, placeholders
        );
        let mut part_query = sqlx::query_as::<_, PagePartRow>(&part_sql);
        for id in &ids {
            part_query = part_query.bind(*id);
        }
        let part_rows = part_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to load page parts")?;

        let mut slugs: HashMap<i64, BTreeMap<String, String>> = HashMap::new();
        for (page_id, locale, custom_slug) in slug_rows {
            slugs.entry(page_id).or_default().insert(locale, custom_slug);
        }

        let mut parts: HashMap<i64, Vec<PagePart>> = HashMap::new();
        for row in part_rows {
            let page_id = row.page_id();
            parts.entry(page_id).or_default().push(row.into_part()?);
        }

        for page in pages.iter_mut() {
            let Some(id) = page.id else { continue };
            page.custom_slugs = slugs.remove(&id).unwrap_or_default();
            page.parts = PageParts::from(parts.remove(&id).unwrap_or_default());
        }

        Ok(())
    }
}

async fn write_custom_slugs(
    tx: &mut Transaction<'_, Sqlite>,
    page_id: i64,
    page: &Page,
) -> Result<()> {
    for (locale, custom_slug) in &page.custom_slugs {
        if custom_slug.trim().is_empty() {
            continue;
        }
        sqlx::query(
            "INSERT INTO page_custom_slugs (page_id, locale, custom_slug) VALUES (?, ?, ?)",
        )
        .bind(page_id)
        .bind(locale)
        .bind(custom_slug)
        .execute(&mut **tx)
        .await
        .with_context(|| {
            format!(
                "Failed to store custom slug '{}' for locale '{}'",
                custom_slug, locale
            )
        })?;
    }
    Ok(())
}

async fn insert_part(
    tx: &mut Transaction<'_, Sqlite>,
    page_id: i64,
    part: &PagePart,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO page_parts (page_id, title, content, position, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(page_id)
    .bind(&part.title)
    .bind(&part.content)
    .bind(part.position)
    .bind(part.created_at)
    .bind(part.updated_at)
    .execute(&mut **tx)
    .await
    .context("Failed to create page part")?;

    Ok(result.last_insert_rowid())
}

async fn sync_parts(tx: &mut Transaction<'_, Sqlite>, page_id: i64, page: &Page) -> Result<()> {
    let stored_ids = sqlx::query_scalar::<_, i64>("SELECT id FROM page_parts WHERE page_id = ?")
        .bind(page_id)
        .fetch_all(&mut **tx)
        .await
        .context("Failed to load stored page parts")?;

    let kept: Vec<i64> = page.parts.iter().filter_map(|part| part.id).collect();
    for stale_id in stored_ids.iter().filter(|id| !kept.contains(*id)) {
        sqlx::query("DELETE FROM page_parts WHERE id = ?")
            .bind(*stale_id)
            .execute(&mut **tx)
            .await
            .context("Failed to delete removed page part")?;
    }

    for part in &page.parts {
        match part.id {
            Some(part_id) if stored_ids.contains(&part_id) => {
                sqlx::query(
                    "UPDATE page_parts SET title = ?, content = ?, position = ?, updated_at = ? WHERE id = ?",
                )
                .bind(&part.title)
                .bind(&part.content)
                .bind(part.position)
                .bind(part.updated_at)
                .bind(part_id)
                .execute(&mut **tx)
                .await
                .context("Failed to update page part")?;
            }
            _ => {
                insert_part(tx, page_id, part).await?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::init_database;
    use folio_core::models::resolution::ResolutionContext;
    use pretty_assertions::assert_eq;

    async fn setup_repo() -> Result<PageRepository> {
        let pool = init_database("sqlite::memory:").await?;
        Ok(PageRepository::new(pool))
    }

    #[tokio::test]
    async fn test_new_creates_repository() -> Result<()> {
        let repo = setup_repo().await?;
        let _result = sqlx::query("SELECT 1").fetch_one(&repo.pool).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_page_success() -> Result<()> {
        let repo = setup_repo().await?;

        let id = repo.create(&Page::new("About Us")).await?;
        assert!(id > 0);

        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pages")
            .fetch_one(&repo.pool)
            .await?;
        assert_eq!(row.0, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_invalid_page_fails() -> Result<()> {
        let repo = setup_repo().await?;
        assert!(repo.create(&Page::new("   ")).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_create_with_missing_parent_fails() -> Result<()> {
        let repo = setup_repo().await?;
        assert!(repo.create(&Page::new_with_parent(404, "Orphan")).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_find_by_id_round_trips_all_fields() -> Result<()> {
        let repo = setup_repo().await?;

        let mut page = Page::new("Everything");
        page.menu_title = Some("Menu".to_string());
        page.link_url = Some("/plugin-name".to_string());
        page.menu_match = Some("^/plugin-name.*$".to_string());
        page.deletable = false;
        page.draft = true;
        page.show_in_menu = false;
        page.skip_to_first_child = true;
        page.position = 7;
        page.meta_keywords = Some("testing, meta, keywords".to_string());
        page.meta_description = Some("This is my description".to_string());
        page.browser_title = Some("My Browser Title".to_string());
        page.set_custom_slug("en", "everything-custom");
        page.set_custom_slug("ru", "vse");
        page.parts.add_part("Body", "first");
        page.parts.add_part("Side Body", "second");

        let id = repo.create(&page).await?;
        let found = repo.find_by_id(id).await?.unwrap();

        assert_eq!(found.id, Some(id));
        assert_eq!(found.title, page.title);
        assert_eq!(found.menu_title, page.menu_title);
        assert_eq!(found.link_url, page.link_url);
        assert_eq!(found.menu_match, page.menu_match);
        assert_eq!(found.deletable, page.deletable);
        assert_eq!(found.draft, page.draft);
        assert_eq!(found.show_in_menu, page.show_in_menu);
        assert_eq!(found.skip_to_first_child, page.skip_to_first_child);
        assert_eq!(found.position, 7);
        assert_eq!(found.meta_keywords, page.meta_keywords);
        assert_eq!(found.meta_description, page.meta_description);
        assert_eq!(found.browser_title, page.browser_title);
        assert_eq!(found.custom_slugs, page.custom_slugs);
        assert_eq!(found.parts.len(), 2);
        assert_eq!(found.content_for("body"), Some("<p>first</p>".to_string()));
        assert!(found.parts.iter().all(|part| part.page_id == Some(id)));
        Ok(())
    }

    #[tokio::test]
    async fn test_find_by_id_non_existing_page() -> Result<()> {
        let repo = setup_repo().await?;
        assert!(repo.find_by_id(999).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_update_existing_page() -> Result<()> {
        let repo = setup_repo().await?;
        let id = repo.create(&Page::new("Original")).await?;

        let mut page = repo.find_by_id(id).await?.unwrap();
        page.title = "Updated".to_string();
        page.meta_keywords = Some("updated".to_string());
        page.set_custom_slug("en", "updated-slug");
        repo.update(&page).await?;

        let reloaded = repo.find_by_id(id).await?.unwrap();
        assert_eq!(reloaded.title, "Updated");
        assert_eq!(reloaded.meta_keywords, Some("updated".to_string()));
        assert_eq!(reloaded.custom_slug("en"), Some("updated-slug"));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_replaces_custom_slugs() -> Result<()> {
        let repo = setup_repo().await?;
        let mut page = Page::new("Slugs");
        page.set_custom_slug("en", "first");
        page.set_custom_slug("ru", "pervyi");
        let id = repo.create(&page).await?;

        let mut page = repo.find_by_id(id).await?.unwrap();
        page.clear_custom_slug("ru");
        repo.update(&page).await?;

        let reloaded = repo.find_by_id(id).await?.unwrap();
        assert_eq!(reloaded.custom_slug("en"), Some("first"));
        assert_eq!(reloaded.custom_slug("ru"), None);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_synchronizes_parts() -> Result<()> {
        let repo = setup_repo().await?;
        let mut page = Page::new("Parts");
        page.parts.add_part("Body", "body");
        page.parts.add_part("Side Body", "side");
        repo.save(&mut page).await?;

        page.parts.part_with_title_mut("body").unwrap().content = "changed".to_string();
        page.parts.remove_part("side body");
        page.parts.add_part("Footer", "footer");
        repo.save(&mut page).await?;

        let titles: Vec<&str> = page.parts.ordered().iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Body", "Footer"]);
        assert_eq!(page.content_for("body"), Some("<p>changed</p>".to_string()));
        assert!(page.parts.iter().all(|part| part.id.is_some()));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_non_existing_page() -> Result<()> {
        let repo = setup_repo().await?;
        let mut page = Page::new("Ghost");
        page.id = Some(999);
        assert!(repo.update(&page).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_update_page_without_id() -> Result<()> {
        let repo = setup_repo().await?;
        let result = repo.update(&Page::new("No id")).await;
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Cannot update page without ID"));
        Ok(())
    }

    #[tokio::test]
    async fn test_custom_slug_unique_per_locale() -> Result<()> {
        let repo = setup_repo().await?;

        let mut first = Page::new("First");
        first.set_custom_slug("en", "shared");
        repo.create(&first).await?;

        let mut second = Page::new("Second");
        second.set_custom_slug("en", "shared");
        assert!(repo.create(&second).await.is_err());

        let mut third = Page::new("Third");
        third.set_custom_slug("fr", "shared");
        assert!(repo.create(&third).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn test_find_by_custom_slug() -> Result<()> {
        let repo = setup_repo().await?;
        let mut page = Page::new("Hello");
        page.set_custom_slug("ru", "privet");
        let id = repo.create(&page).await?;

        let found = repo.find_by_custom_slug("ru", "privet").await?;
        assert_eq!(found.and_then(|p| p.id), Some(id));
        assert!(repo.find_by_custom_slug("en", "privet").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_list_children_ordered() -> Result<()> {
        let repo = setup_repo().await?;
        let parent = repo.create(&Page::new("Parent")).await?;

        let mut late = Page::new_with_parent(parent, "Late");
        late.position = 2;
        let late = repo.create(&late).await?;
        let mut early = Page::new_with_parent(parent, "Early");
        early.position = 1;
        let early = repo.create(&early).await?;

        let ids: Vec<i64> = repo
            .list_children(parent)
            .await?
            .iter()
            .filter_map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![early, late]);
        assert!(repo.has_children(parent).await?);
        assert!(!repo.has_children(early).await?);

        let roots: Vec<i64> = repo.list_roots().await?.iter().filter_map(|p| p.id).collect();
        assert_eq!(roots, vec![parent]);
        Ok(())
    }

    #[tokio::test]
    async fn test_load_tree_resolves_urls() -> Result<()> {
        let repo = setup_repo().await?;
        let parent = repo.create(&Page::new("About")).await?;
        let child = repo.create(&Page::new_with_parent(parent, "Team")).await?;

        let tree = repo.load_tree().await?;
        assert_eq!(tree.len(), 2);

        let ctx = ResolutionContext::default();
        assert_eq!(tree.url(child, &ctx).unwrap().href(), "/about/team");
        assert_eq!(
            tree.url(child, &ctx.clone().with_marketable_urls(false))
                .unwrap()
                .id(),
            Some("team")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_destroy_plain_page() -> Result<()> {
        let repo = setup_repo().await?;
        let mut page = Page::new("Disposable");
        page.parts.add_part("Body", "bye");
        page.set_custom_slug("en", "disposable");
        let id = repo.create(&page).await?;

        let destroyed = repo.destroy(id).await?;
        assert_eq!(destroyed.map(|p| p.title), Some("Disposable".to_string()));
        assert!(repo.find_by_id(id).await?.is_none());

        let parts: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM page_parts")
            .fetch_one(&repo.pool)
            .await?;
        assert_eq!(parts.0, 0);
        let slugs: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM page_custom_slugs")
            .fetch_one(&repo.pool)
            .await?;
        assert_eq!(slugs.0, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_destroy_refused_by_policy() -> Result<()> {
        let repo = setup_repo().await?;

        let mut linked = Page::new("Linked");
        linked.link_url = Some("/plugin-name".to_string());
        let mut locked = Page::new("Locked");
        locked.deletable = false;
        let mut matched = Page::new("Matched");
        matched.menu_match = Some("^/plugin-name.*$".to_string());

        for page in [linked, locked, matched] {
            let id = repo.create(&page).await?;
            assert!(repo.destroy(id).await?.is_none());
            assert!(repo.find_by_id(id).await?.is_some());
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_destroy_refused_with_children() -> Result<()> {
        let repo = setup_repo().await?;
        let parent = repo.create(&Page::new("Parent")).await?;
        let child = repo.create(&Page::new_with_parent(parent, "Child")).await?;

        assert!(repo.destroy(parent).await?.is_none());
        assert!(repo.find_by_id(parent).await?.is_some());

        assert!(repo.destroy(child).await?.is_some());
        assert!(repo.destroy(parent).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_destroy_missing_page() -> Result<()> {
        let repo = setup_repo().await?;
        assert!(repo.destroy(12345).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_move_page() -> Result<()> {
        let repo = setup_repo().await?;
        let a = repo.create(&Page::new("A")).await?;
        let b = repo.create(&Page::new("B")).await?;
        let c = repo.create(&Page::new_with_parent(a, "C")).await?;

        repo.move_page(b, Some(a)).await?;
        let moved = repo.find_by_id(b).await?.unwrap();
        assert_eq!(moved.parent_id, Some(a));
        assert_eq!(moved.position, 1);

        assert!(repo.is_descendant_of(c, a).await?);
        assert!(repo.move_page(a, Some(c)).await.is_err());
        assert!(repo.move_page(a, Some(a)).await.is_err());
        assert!(repo.move_page(999, None).await.is_err());

        repo.move_page(c, None).await?;
        assert_eq!(repo.find_by_id(c).await?.unwrap().parent_id, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_refuses_parent_cycle() -> Result<()> {
        let repo = setup_repo().await?;
        let parent = repo.create(&Page::new("Parent")).await?;
        let child = repo.create(&Page::new_with_parent(parent, "Child")).await?;
        let grandchild = repo.create(&Page::new_with_parent(child, "Grandchild")).await?;

        let mut page = repo.find_by_id(parent).await?.unwrap();
        page.parent_id = Some(grandchild);
        assert!(repo.update(&page).await.is_err());

        let mut page = repo.find_by_id(child).await?.unwrap();
        page.parent_id = Some(child);
        assert!(repo.update(&page).await.is_err());

        let mut page = repo.find_by_id(child).await?.unwrap();
        page.parent_id = Some(999);
        assert!(repo.update(&page).await.is_err());

        assert_eq!(repo.find_by_id(parent).await?.unwrap().parent_id, None);
        assert_eq!(repo.find_by_id(child).await?.unwrap().parent_id, Some(parent));
        assert_eq!(repo.load_tree().await?.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_save_allows_valid_parent_change() -> Result<()> {
        let repo = setup_repo().await?;
        let a = repo.create(&Page::new("A")).await?;
        let b = repo.create(&Page::new("B")).await?;

        let mut page = repo.find_by_id(b).await?.unwrap();
        page.parent_id = Some(a);
        page.title = "B moved".to_string();
        repo.save(&mut page).await?;

        assert_eq!(page.parent_id, Some(a));
        assert_eq!(page.title, "B moved");
        assert!(repo.is_descendant_of(b, a).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_rejects_duplicate_part_positions() -> Result<()> {
        let repo = setup_repo().await?;
        let mut page = Page::new("Parts");
        page.parts.add_part("Body", "a");
        page.parts.add_part("Side Body", "b");
        repo.save(&mut page).await?;

        page.parts.part_with_title_mut("side body").unwrap().position = 0;
        assert!(repo.update(&page).await.is_err());

        let stored = repo.find_by_id(page.id.unwrap()).await?.unwrap();
        assert_eq!(stored.parts.positions(), vec![0, 1]);
        Ok(())
    }

    #[tokio::test]
    async fn test_destroy_checks_children_added_behind_its_back() -> Result<()> {
        let repo = setup_repo().await?;
        let parent = repo.create(&Page::new("Parent")).await?;

        sqlx::query("INSERT INTO pages (parent_id, title) VALUES (?, ?)")
            .bind(parent)
            .bind("Sneaky child")
            .execute(&repo.pool)
            .await?;

        assert!(repo.destroy(parent).await?.is_none());
        assert!(repo.find_by_id(parent).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_reposition_parts() -> Result<()> {
        let repo = setup_repo().await?;
        let mut page = Page::new("Parts");
        page.parts.push(PagePart::new("Body", "a", 6)).unwrap();
        page.parts.push(PagePart::new("Side Body", "b", 4)).unwrap();
        let id = repo.create(&page).await?;

        repo.reposition_parts(id).await?;
        repo.reposition_parts(id).await?;

        let page = repo.find_by_id(id).await?.unwrap();
        assert_eq!(page.parts.part_with_title("side body").unwrap().position, 0);
        assert_eq!(page.parts.part_with_title("body").unwrap().position, 1);
        Ok(())
    }
}
