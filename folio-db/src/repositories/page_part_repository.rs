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

use super::parse_datetime;
use anyhow::{Context, Result};
use folio_core::models::page_part::PagePart;
use sqlx::{Sqlite, SqlitePool, Transaction};

pub(crate) const PART_COLUMNS: &str =
    "id, page_id, title, content, position, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct PagePartRow {
    id: i64,
    page_id: i64,
    title: String,
    content: String,
    position: i32,
    created_at: String,
    updated_at: String,
}

impl PagePartRow {
    pub(crate) fn page_id(&self) -> i64 {
        self.page_id
    }

    pub(crate) fn into_part(self) -> Result<PagePart> {
        Ok(PagePart {
            id: Some(self.id),
            page_id: Some(self.page_id),
            title: self.title,
            content: self.content,
            position: self.position,
            created_at: parse_datetime(&self.created_at, "created_at")?,
            updated_at: parse_datetime(&self.updated_at, "updated_at")?,
        })
    }
}

pub struct PagePartRepository {
    pool: SqlitePool,
}

impl PagePartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, part: &PagePart) -> Result<i64> {
        let page_id = part
            .page_id
            .context("Cannot create page part without page_id")?;

        part.is_valid()
            .map_err(|e| anyhow::anyhow!("Invalid page part: {}", e))?;

        let taken = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM page_parts WHERE page_id = ? AND position = ?",
        )
        .bind(page_id)
        .bind(part.position)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check part position")?;

        if taken > 0 {
            return Err(anyhow::anyhow!(
                "Page {} already has a part at position {}",
                page_id,
                part.position
            ));
        }

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
        .execute(&self.pool)
        .await
        .context("Failed to create page part")?;

        Ok(result.last_insert_rowid())
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<PagePart>> {
        let row = sqlx::query_as::<_, PagePartRow>(&format!(
            "SELECT {} FROM page_parts WHERE id = ?",
            PART_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to find page part by id")?;

        row.map(PagePartRow::into_part).transpose()
    }

    /// Parts of a page in position order, ties broken by insertion order
    pub async fn list_by_page(&self, page_id: i64) -> Result<Vec<PagePart>> {
        let rows = sqlx::query_as::<_, PagePartRow>(&format!(
            "SELECT {} FROM page_parts WHERE page_id = ? ORDER BY position, id",
            PART_COLUMNS
        ))
        .bind(page_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list page parts")?;

        rows.into_iter().map(PagePartRow::into_part).collect()
    }

    pub async fn update(&self, part: &PagePart) -> Result<()> {
        let id = part.id.context("Cannot update page part without ID")?;

        part.is_valid()
            .map_err(|e| anyhow::anyhow!("Invalid page part: {}", e))?;

        let taken = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM page_parts
            WHERE page_id = (SELECT page_id FROM page_parts WHERE id = ?)
              AND position = ? AND id != ?
            "#,
        )
        .bind(id)
        .bind(part.position)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check part position")?;

        if taken > 0 {
            return Err(anyhow::anyhow!(
                "Another part of the page already uses position {}",
                part.position
            ));
        }

        let rows_affected = sqlx::query(
            r#"
            UPDATE page_parts
            SET title = ?, content = ?, position = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&part.title)
        .bind(&part.content)
        .bind(part.position)
        .bind(part.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to update page part")?
        .rows_affected();

        if rows_affected == 0 {
            return Err(anyhow::anyhow!("Page part with id {} not found", id));
        }

        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let rows_affected = sqlx::query("DELETE FROM page_parts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete page part")?
            .rows_affected();

        if rows_affected == 0 {
            return Err(anyhow::anyhow!("Page part with id {} not found", id));
        }

        Ok(())
    }

    /// Rewrite part positions of a page to 0, 1, 2, ... keeping their order
    pub async fn reposition(&self, page_id: i64) -> Result<()> {
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
}

pub(crate) async fn reposition_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    page_id: i64,
) -> Result<()> {
    let parts = sqlx::query_as::<_, (i64, i32)>(
        "SELECT id, position FROM page_parts WHERE page_id = ? ORDER BY position, id",
    )
    .bind(page_id)
    .fetch_all(&mut **tx)
    .await
    .context("Failed to fetch page parts for repositioning")?;

    for (new_position, (part_id, position)) in parts.into_iter().enumerate() {
        let new_position = new_position as i32;
        if position != new_position {
            sqlx::query("UPDATE page_parts SET position = ? WHERE id = ?")
                .bind(new_position)
                .bind(part_id)
                .execute(&mut **tx)
                .await
                .context("Failed to update part position during repositioning")?;
        }
    }

    tracing::debug!(page_id, "Repositioned page parts");
    Ok(())
}
