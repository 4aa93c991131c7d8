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

use serde::{Deserialize, Serialize};
use std::fmt;

/// Route prefix used for flat, id-style page urls.
pub const PAGES_ROUTE_PREFIX: &str = "/pages";

/// Where a page lives, as handed to a rendering layer.
///
/// A page with a link url resolves to that literal. Otherwise it resolves to a
/// route carrying either a flat `id` slug or a hierarchical `path` of slugs,
/// never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageUrl {
    Link(String),
    Route(PageRoute),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRoute {
    pub id: Option<String>,
    pub path: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl PageRoute {
    pub fn flat(slug: String) -> Self {
        Self {
            id: Some(slug),
            path: None,
            locale: None,
        }
    }

    pub fn nested(slugs: Vec<String>) -> Self {
        Self {
            id: None,
            path: Some(slugs),
            locale: None,
        }
    }

    pub fn with_locale(mut self, locale: Option<&str>) -> Self {
        self.locale = locale.map(str::to_string);
        self
    }
}

impl PageUrl {
    pub fn id(&self) -> Option<&str> {
        match self {
            PageUrl::Route(route) => route.id.as_deref(),
            PageUrl::Link(_) => None,
        }
    }

    pub fn path(&self) -> Option<&[String]> {
        match self {
            PageUrl::Route(route) => route.path.as_deref(),
            PageUrl::Link(_) => None,
        }
    }

    pub fn link(&self) -> Option<&str> {
        match self {
            PageUrl::Link(link) => Some(link),
            PageUrl::Route(_) => None,
        }
    }

    pub fn locale(&self) -> Option<&str> {
        match self {
            PageUrl::Route(route) => route.locale.as_deref(),
            PageUrl::Link(_) => None,
        }
    }

    pub fn is_link(&self) -> bool {
        matches!(self, PageUrl::Link(_))
    }

    /// Concrete href for this url.
    pub fn href(&self) -> String {
        let route = match self {
            PageUrl::Link(link) => return link.clone(),
            PageUrl::Route(route) => route,
        };

        let prefix = route
            .locale
            .as_deref()
            .map(|locale| format!("/{}", locale))
            .unwrap_or_default();

        match (&route.path, &route.id) {
            (Some(path), _) => format!("{}/{}", prefix, path.join("/")),
            (None, Some(id)) => format!("{}{}/{}", prefix, PAGES_ROUTE_PREFIX, id),
            (None, None) => format!("{}/", prefix),
        }
    }
}

impl fmt::Display for PageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.href())
    }
}

/// Options for the breadcrumb-style title path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathOptions {
    /// Root first when true, page first when false
    pub reversed: bool,
    pub joiner: String,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            reversed: true,
            joiner: " - ".to_string(),
        }
    }
}

impl PathOptions {
    pub fn natural() -> Self {
        Self {
            reversed: false,
            ..Self::default()
        }
    }

    pub fn with_joiner(mut self, joiner: impl Into<String>) -> Self {
        self.joiner = joiner.into();
        self
    }
}
