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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named content fragment of a page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PagePart {
    pub id: Option<i64>,
    pub page_id: Option<i64>,
    pub title: String,
    pub content: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PagePart {
    pub fn new(title: impl Into<String>, content: impl Into<String>, position: i32) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            page_id: None,
            title: title.into(),
            content: content.into(),
            position,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn for_page(
        page_id: i64,
        title: impl Into<String>,
        content: impl Into<String>,
        position: i32,
    ) -> Self {
        Self {
            page_id: Some(page_id),
            ..Self::new(title, content, position)
        }
    }

    /// Part titles are lookup keys and compare case-insensitively.
    pub fn matches_title(&self, name: &str) -> bool {
        self.title.trim().to_lowercase() == name.trim().to_lowercase()
    }

    /// Content inside a paragraph container. Content that already starts
    /// with an HTML tag is returned untouched.
    pub fn wrapped_content(&self) -> String {
        let trimmed = self.content.trim();
        if starts_with_tag(trimmed) {
            trimmed.to_string()
        } else {
            format!("<p>{}</p>", trimmed)
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn validate_title(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Part title cannot be empty".to_string());
        }

        if self.title.len() > 255 {
            return Err("Part title cannot exceed 255 characters".to_string());
        }

        Ok(())
    }

    pub fn validate_position(&self) -> Result<(), String> {
        if self.position < 0 {
            return Err("Part position cannot be negative".to_string());
        }
        Ok(())
    }

    pub fn is_valid(&self) -> Result<(), String> {
        self.validate_title()?;
        self.validate_position()?;
        Ok(())
    }
}

fn starts_with_tag(content: &str) -> bool {
    let mut chars = content.chars();
    chars.next() == Some('<') && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
}

/// The ordered parts owned by a page. Positions are unique within a page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct PageParts(Vec<PagePart>);

impl PageParts {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parts in position order.
    pub fn ordered(&self) -> Vec<&PagePart> {
        let mut parts: Vec<&PagePart> = self.0.iter().collect();
        parts.sort_by_key(|part| part.position);
        parts
    }

    pub fn iter(&self) -> impl Iterator<Item = &PagePart> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PagePart> {
        self.0.iter_mut()
    }

    pub fn positions(&self) -> Vec<i32> {
        self.0.iter().map(|part| part.position).collect()
    }

    pub fn part_with_title(&self, name: &str) -> Option<&PagePart> {
        self.0.iter().find(|part| part.matches_title(name))
    }

    pub fn part_with_title_mut(&mut self, name: &str) -> Option<&mut PagePart> {
        self.0.iter_mut().find(|part| part.matches_title(name))
    }

    pub fn content_for(&self, name: &str) -> Option<String> {
        self.part_with_title(name).map(PagePart::wrapped_content)
    }

    pub fn all_page_part_content(&self) -> String {
        self.ordered()
            .into_iter()
            .map(PagePart::wrapped_content)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Append a part after the current last position.
    pub fn add_part(&mut self, title: impl Into<String>, content: impl Into<String>) -> &mut PagePart {
        let position = self
            .0
            .iter()
            .map(|part| part.position)
            .max()
            .map_or(0, |max| max + 1);
        self.insert_unchecked(PagePart::new(title, content, position))
    }

    /// Add a part at its own position, refusing a position already in use.
    pub fn push(&mut self, part: PagePart) -> Result<&mut PagePart, String> {
        if self.0.iter().any(|existing| existing.position == part.position) {
            return Err(format!(
                "A part already exists at position {}",
                part.position
            ));
        }
        Ok(self.insert_unchecked(part))
    }

    fn insert_unchecked(&mut self, part: PagePart) -> &mut PagePart {
        self.0.push(part);
        let last = self.0.len() - 1;
        &mut self.0[last]
    }

    pub fn validate_positions(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for part in &self.0 {
            if !seen.insert(part.position) {
                return Err(format!(
                    "Part position {} is used more than once",
                    part.position
                ));
            }
        }
        Ok(())
    }

    pub fn remove_part(&mut self, name: &str) -> Option<PagePart> {
        let index = self.0.iter().position(|part| part.matches_title(name))?;
        Some(self.0.remove(index))
    }

    /// Rewrites positions to `0..n` keeping the current relative order.
    pub fn reposition_parts(&mut self) {
        self.0.sort_by_key(|part| part.position);
        for (index, part) in self.0.iter_mut().enumerate() {
            part.position = index as i32;
        }
    }

    /// Assign the owning page to every part.
    pub fn attach_to(&mut self, page_id: i64) {
        for part in &mut self.0 {
            part.page_id = Some(page_id);
        }
    }

    pub fn into_vec(self) -> Vec<PagePart> {
        self.0
    }
}

impl From<Vec<PagePart>> for PageParts {
    fn from(parts: Vec<PagePart>) -> Self {
        Self(parts)
    }
}

impl<'a> IntoIterator for &'a PageParts {
    type Item = &'a PagePart;
    type IntoIter = std::slice::Iter<'a, PagePart>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
