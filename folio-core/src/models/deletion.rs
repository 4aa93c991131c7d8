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

use crate::models::page::Page;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A reason a page may not be destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionBlocker {
    LinkUrl,
    NotDeletable,
    MenuMatch,
    HasChildren,
}

impl fmt::Display for DeletionBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            DeletionBlocker::LinkUrl => "it has a link url",
            DeletionBlocker::NotDeletable => "it is marked as not deletable",
            DeletionBlocker::MenuMatch => "it has a menu match pattern",
            DeletionBlocker::HasChildren => "it has child pages",
        };
        f.write_str(reason)
    }
}

/// Blockers derived from the page's own attributes.
pub fn deletion_blockers(page: &Page) -> Vec<DeletionBlocker> {
    let mut blockers = Vec::new();
    if page.link_url().is_some() {
        blockers.push(DeletionBlocker::LinkUrl);
    }
    if !page.deletable {
        blockers.push(DeletionBlocker::NotDeletable);
    }
    if page.menu_match().is_some() {
        blockers.push(DeletionBlocker::MenuMatch);
    }
    blockers
}

/// Blockers for a page placed in a tree, where `child_count` is the number of
/// direct children it has.
pub fn tree_deletion_blockers(page: &Page, child_count: usize) -> Vec<DeletionBlocker> {
    let mut blockers = deletion_blockers(page);
    if child_count > 0 {
        blockers.push(DeletionBlocker::HasChildren);
    }
    blockers
}

pub fn describe_blockers(blockers: &[DeletionBlocker]) -> String {
    blockers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
