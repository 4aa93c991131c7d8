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

use crate::error::{Result, TreeError};
use crate::models::deletion::{describe_blockers, tree_deletion_blockers, DeletionBlocker};
use crate::models::page::Page;
use crate::models::page_url::{PageRoute, PageUrl, PathOptions};
use crate::models::resolution::ResolutionContext;
use std::collections::BTreeMap;

/// Arena of pages keyed by id.
///
/// Pages only store their parent id; children are always derived by scanning
/// the arena, so there is no back-pointer to keep in sync.
#[derive(Debug, Clone)]
pub struct PageTree {
    pages: BTreeMap<i64, Page>,
    next_id: i64,
}

impl Default for PageTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PageTree {
    pub fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Build a tree from already persisted pages. Every page must carry an id,
    /// every parent must be present and no ancestor chain may loop.
    pub fn from_pages<I>(pages: I) -> Result<Self>
    where
        I: IntoIterator<Item = Page>,
    {
        let mut tree = Self::new();
        for page in pages {
            let id = page.id.ok_or(TreeError::MissingId)?;
            if tree.pages.contains_key(&id) {
                return Err(TreeError::DuplicateId(id));
            }
            tree.next_id = tree.next_id.max(id.saturating_add(1));
            tree.pages.insert(id, page);
        }

        for page in tree.pages.values() {
            if let Some(parent_id) = page.parent_id {
                if !tree.pages.contains_key(&parent_id) {
                    return Err(TreeError::ParentNotFound(parent_id));
                }
            }
        }

        for &id in tree.pages.keys() {
            tree.check_acyclic(id)?;
        }

        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.pages.contains_key(&id)
    }

    pub fn get(&self, id: i64) -> Option<&Page> {
        self.pages.get(&id)
    }

    /// Mutable access for attribute updates. Tree links are changed through
    /// [`PageTree::move_page`].
    pub fn get_mut(&mut self, id: i64) -> Option<&mut Page> {
        self.pages.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Page> {
        self.pages.values()
    }

    pub fn insert_root(&mut self, mut page: Page) -> Result<i64> {
        page.parent_id = None;
        page.position = self.next_position(None);
        self.insert(page)
    }

    pub fn insert_child(&mut self, parent_id: i64, mut page: Page) -> Result<i64> {
        if !self.pages.contains_key(&parent_id) {
            return Err(TreeError::ParentNotFound(parent_id));
        }
        page.parent_id = Some(parent_id);
        page.position = self.next_position(Some(parent_id));
        self.insert(page)
    }

    fn insert(&mut self, mut page: Page) -> Result<i64> {
        let id = match page.id {
            Some(id) if self.pages.contains_key(&id) => return Err(TreeError::DuplicateId(id)),
            Some(id) => id,
            None if self.pages.contains_key(&self.next_id) => return Err(TreeError::IdsExhausted),
            None => self.next_id,
        };
        self.next_id = self.next_id.max(id.saturating_add(1));
        page.id = Some(id);
        page.parts.attach_to(id);
        self.pages.insert(id, page);
        Ok(id)
    }

    fn next_position(&self, parent_id: Option<i64>) -> i32 {
        self.pages
            .values()
            .filter(|page| page.parent_id == parent_id)
            .map(|page| page.position)
            .max()
            .map_or(0, |max| max + 1)
    }

    pub fn parent(&self, id: i64) -> Option<&Page> {
        self.get(id)?.parent_id.and_then(|parent_id| self.get(parent_id))
    }

    /// Direct children ordered by position, then id.
    pub fn children(&self, id: i64) -> Vec<&Page> {
        self.children_of(Some(id))
    }

    pub fn roots(&self) -> Vec<&Page> {
        self.children_of(None)
    }

    fn children_of(&self, parent_id: Option<i64>) -> Vec<&Page> {
        let mut children: Vec<&Page> = self
            .pages
            .values()
            .filter(|page| page.parent_id == parent_id)
            .collect();
        children.sort_by_key(|page| (page.position, page.id));
        children
    }

    pub fn has_children(&self, id: i64) -> bool {
        self.pages.values().any(|page| page.parent_id == Some(id))
    }

    /// Ancestors of a page, root first, excluding the page itself.
    pub fn ancestors(&self, id: i64) -> Vec<&Page> {
        let mut trail = self.breadcrumb_trail(id);
        trail.pop();
        trail
    }

    /// The page and its ancestors, root first.
    pub fn breadcrumb_trail(&self, id: i64) -> Vec<&Page> {
        let mut trail = Vec::new();
        let mut current_id = Some(id);

        // Bounded by the arena size so a hand-edited parent link cannot spin
        while let Some(id) = current_id {
            if trail.len() > self.pages.len() {
                break;
            }
            match self.pages.get(&id) {
                Some(page) => {
                    current_id = page.parent_id;
                    trail.push(page);
                }
                None => break,
            }
        }

        trail.reverse();
        trail
    }

    /// All descendants, depth first in sibling order.
    pub fn descendants(&self, id: i64) -> Vec<&Page> {
        let mut descendants = Vec::new();
        let mut stack: Vec<&Page> = self.children(id).into_iter().rev().collect();

        while let Some(page) = stack.pop() {
            descendants.push(page);
            if let Some(page_id) = page.id {
                stack.extend(self.children(page_id).into_iter().rev());
            }
        }

        descendants
    }

    pub fn is_descendant_of(&self, page_id: i64, potential_ancestor_id: i64) -> bool {
        if page_id == potential_ancestor_id {
            return false;
        }
        self.ancestors(page_id)
            .iter()
            .any(|page| page.id == Some(potential_ancestor_id))
    }

    fn check_acyclic(&self, id: i64) -> Result<()> {
        let mut steps = 0;
        let mut current = self.pages.get(&id).and_then(|page| page.parent_id);
        while let Some(parent_id) = current {
            steps += 1;
            if parent_id == id || steps > self.pages.len() {
                return Err(TreeError::CycleDetected(id));
            }
            current = self.pages.get(&parent_id).and_then(|page| page.parent_id);
        }
        Ok(())
    }

    /// Reattach a page under a new parent (or as a root), appended after its
    /// new siblings.
    pub fn move_page(&mut self, page_id: i64, new_parent_id: Option<i64>) -> Result<()> {
        if !self.pages.contains_key(&page_id) {
            return Err(TreeError::PageNotFound(page_id));
        }

        if let Some(parent_id) = new_parent_id {
            if !self.pages.contains_key(&parent_id) {
                return Err(TreeError::ParentNotFound(parent_id));
            }
            if parent_id == page_id || self.is_descendant_of(parent_id, page_id) {
                return Err(TreeError::WouldCreateCycle {
                    page_id,
                    parent_id,
                });
            }
        }

        let position = self.next_position(new_parent_id);
        if let Some(page) = self.pages.get_mut(&page_id) {
            page.parent_id = new_parent_id;
            page.position = position;
            page.touch();
        }
        Ok(())
    }

    /// Titles along the ancestor chain.
    ///
    /// `reversed` (the default) yields `"Parent - Child"`; natural order
    /// yields `"Child - Parent"`.
    pub fn path(&self, id: i64, options: &PathOptions) -> Option<String> {
        self.get(id)?;
        let mut titles: Vec<&str> = self
            .breadcrumb_trail(id)
            .iter()
            .map(|page| page.title.as_str())
            .collect();
        if !options.reversed {
            titles.reverse();
        }
        Some(titles.join(&options.joiner))
    }

    pub fn slug(&self, id: i64, ctx: &ResolutionContext) -> Option<String> {
        self.get(id).map(|page| page.slug(ctx))
    }

    /// Slugs from the top-level ancestor down to the page.
    pub fn nested_url(&self, id: i64, ctx: &ResolutionContext) -> Option<Vec<String>> {
        self.get(id)?;
        Some(
            self.breadcrumb_trail(id)
                .iter()
                .map(|page| page.slug(ctx))
                .collect(),
        )
    }

    pub fn nested_path(&self, id: i64, ctx: &ResolutionContext) -> Option<String> {
        self.nested_url(id, ctx)
            .map(|segments| format!("/{}", segments.join("/")))
    }

    pub fn url(&self, id: i64, ctx: &ResolutionContext) -> Option<PageUrl> {
        let page = self.get(id)?;

        if let Some(link) = page.link_url() {
            return Some(PageUrl::Link(localise_link(link, ctx)));
        }

        let route = if ctx.marketable_urls {
            PageRoute::nested(self.nested_url(id, ctx)?)
        } else {
            PageRoute::flat(page.slug(ctx))
        };
        Some(PageUrl::Route(route.with_locale(ctx.route_locale())))
    }

    /// Url used by navigation. Pages set to skip to their first child link to
    /// that child when it is live.
    pub fn menu_url(&self, id: i64, ctx: &ResolutionContext) -> Option<PageUrl> {
        let page = self.get(id)?;
        if page.skip_to_first_child {
            if let Some(child_id) = self.first_live_child(id).and_then(|child| child.id) {
                return self.url(child_id, ctx);
            }
        }
        self.url(id, ctx)
    }

    pub fn first_live_child(&self, id: i64) -> Option<&Page> {
        self.children(id).into_iter().find(|page| page.is_live())
    }

    /// Pages shown in navigation under `parent_id` (roots when `None`).
    pub fn menu_pages(&self, parent_id: Option<i64>) -> Vec<&Page> {
        self.children_of(parent_id)
            .into_iter()
            .filter(|page| page.in_menu())
            .collect()
    }

    pub fn home(&self) -> Option<&Page> {
        self.pages.values().find(|page| page.is_home())
    }

    /// Resolve a hierarchical url path such as `/about/team` to a page.
    pub fn find_by_path(&self, ctx: &ResolutionContext, path: &str) -> Option<&Page> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return self.home();
        }
        self.descend(self.roots(), &segments, ctx)
    }

    fn descend<'a>(
        &'a self,
        candidates: Vec<&'a Page>,
        segments: &[&str],
        ctx: &ResolutionContext,
    ) -> Option<&'a Page> {
        for page in candidates {
            let slug = page.slug(ctx);
            let slug_segments: Vec<&str> = slug.split('/').collect();
            if !segments.starts_with(&slug_segments) {
                continue;
            }

            let rest = &segments[slug_segments.len()..];
            if rest.is_empty() {
                return Some(page);
            }
            if let Some(id) = page.id {
                if let Some(found) = self.descend(self.children(id), rest, ctx) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Resolve a flat slug id to a page. Siblings are searched in tree order.
    pub fn find_by_slug(&self, ctx: &ResolutionContext, slug: &str) -> Option<&Page> {
        let mut ordered = self.roots();
        let mut index = 0;
        while index < ordered.len() {
            let page = ordered[index];
            if page.slug(ctx) == slug {
                return Some(page);
            }
            if let Some(id) = page.id {
                ordered.extend(self.children(id));
            }
            index += 1;
        }
        None
    }

    pub fn find_by_custom_slug(&self, locale: &str, custom_slug: &str) -> Option<&Page> {
        self.pages
            .values()
            .find(|page| page.custom_slug(locale) == Some(custom_slug))
    }

    /// The first page claiming `path` through its menu match pattern.
    pub fn find_by_menu_match(&self, path: &str) -> Option<&Page> {
        self.pages.values().find(|page| page.matches_menu_path(path))
    }

    pub fn deletion_blockers(&self, id: i64) -> Option<Vec<DeletionBlocker>> {
        let page = self.get(id)?;
        let child_count = self.children(id).len();
        Some(tree_deletion_blockers(page, child_count))
    }

    /// Remove a page and the parts it owns.
    ///
    /// Returns `None` and leaves the tree untouched when the page is unknown
    /// or any deletion blocker applies.
    pub fn destroy(&mut self, id: i64) -> Option<Page> {
        let blockers = self.deletion_blockers(id)?;
        if !blockers.is_empty() {
            tracing::warn!(
                page_id = id,
                "Refusing to destroy page because {}",
                describe_blockers(&blockers)
            );
            return None;
        }
        tracing::debug!(page_id = id, "Destroying page");
        self.pages.remove(&id)
    }
}

fn localise_link(link: &str, ctx: &ResolutionContext) -> String {
    match ctx.link_locale_prefix() {
        Some(locale) if link.starts_with('/') => format!("/{}{}", locale, link),
        _ => link.to_string(),
    }
}
