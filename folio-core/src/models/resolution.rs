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

/// Slugs that collide with system routes when used bare.
pub const DEFAULT_RESERVED_WORDS: &[&str] = &[
    "index",
    "new",
    "session",
    "login",
    "logout",
    "users",
    "admin",
    "images",
    "pages",
    "folio",
];

pub const RESERVED_WORD_SUFFIX: &str = "-page";

/// Ordered set of words forbidden as bare slugs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ReservedWords(Vec<String>);

impl ReservedWords {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique: Vec<String> = Vec::new();
        for word in words {
            let word = word.as_ref().trim().to_lowercase();
            if !word.is_empty() && !unique.contains(&word) {
                unique.push(word);
            }
        }
        Self(unique)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.0.iter().any(|word| word == slug)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends `-page` to a slug that equals a reserved word.
    pub fn disambiguate(&self, slug: String) -> String {
        if self.contains(&slug) {
            format!("{}{}", slug, RESERVED_WORD_SUFFIX)
        } else {
            slug
        }
    }
}

impl Default for ReservedWords {
    fn default() -> Self {
        Self::new(DEFAULT_RESERVED_WORDS)
    }
}

impl From<Vec<String>> for ReservedWords {
    fn from(words: Vec<String>) -> Self {
        Self::new(words)
    }
}

impl From<ReservedWords> for Vec<String> {
    fn from(words: ReservedWords) -> Self {
        words.0
    }
}

/// Everything a slug, path or url computation reads besides the page itself.
///
/// Built once per logical request from the application's locale and
/// configuration state, then passed by reference into every resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionContext {
    /// Locale used to pick custom slugs and transliteration rules
    pub locale: String,
    /// Locale the visitor is browsing in
    pub frontend_locale: String,
    /// Locale served without a prefix
    pub default_frontend_locale: String,
    pub marketable_urls: bool,
    pub reserved_words: ReservedWords,
}

impl Default for ResolutionContext {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            frontend_locale: "en".to_string(),
            default_frontend_locale: "en".to_string(),
            marketable_urls: true,
            reserved_words: ReservedWords::default(),
        }
    }
}

impl ResolutionContext {
    pub fn new(locale: impl Into<String>) -> Self {
        let locale = locale.into();
        Self {
            frontend_locale: locale.clone(),
            default_frontend_locale: locale.clone(),
            locale,
            ..Self::default()
        }
    }

    /// Switch the active locale. The frontend locale follows it.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        let locale = locale.into();
        self.frontend_locale = locale.clone();
        self.locale = locale;
        self
    }

    pub fn with_frontend_locale(mut self, locale: impl Into<String>) -> Self {
        self.frontend_locale = locale.into();
        self
    }

    pub fn with_default_frontend_locale(mut self, locale: impl Into<String>) -> Self {
        self.default_frontend_locale = locale.into();
        self
    }

    pub fn with_marketable_urls(mut self, enabled: bool) -> Self {
        self.marketable_urls = enabled;
        self
    }

    pub fn with_reserved_words(mut self, reserved_words: ReservedWords) -> Self {
        self.reserved_words = reserved_words;
        self
    }

    /// Locale to attach to computed routes, if the visitor browses in a
    /// locale other than the active one.
    pub fn route_locale(&self) -> Option<&str> {
        if self.frontend_locale != self.locale {
            Some(self.frontend_locale.as_str())
        } else {
            None
        }
    }

    /// Prefix applied to site-relative link urls outside the default locale.
    pub fn link_locale_prefix(&self) -> Option<&str> {
        if self.frontend_locale != self.default_frontend_locale {
            Some(self.frontend_locale.as_str())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reserved_words() {
        let words = ReservedWords::default();
        assert_eq!(words.len(), DEFAULT_RESERVED_WORDS.len());
        assert!(words.contains("pages"));
        assert!(words.contains("admin"));
        assert!(!words.contains("about"));
    }

    #[test]
    fn test_reserved_words_are_normalized_and_deduplicated() {
        let words = ReservedWords::new(["Admin", " admin ", "", "blog"]);
        assert_eq!(words.iter().collect::<Vec<_>>(), vec!["admin", "blog"]);
    }

    #[test]
    fn test_disambiguate() {
        let words = ReservedWords::default();
        assert_eq!(words.disambiguate("pages".to_string()), "pages-page");
        assert_eq!(words.disambiguate("about".to_string()), "about");
        assert_eq!(
            ReservedWords::empty().disambiguate("admin".to_string()),
            "admin"
        );
    }

    #[test]
    fn test_default_context() {
        let ctx = ResolutionContext::default();
        assert_eq!(ctx.locale, "en");
        assert!(ctx.marketable_urls);
        assert_eq!(ctx.route_locale(), None);
        assert_eq!(ctx.link_locale_prefix(), None);
    }

    #[test]
    fn test_with_locale_moves_frontend_locale() {
        let ctx = ResolutionContext::default().with_locale("fr");
        assert_eq!(ctx.locale, "fr");
        assert_eq!(ctx.frontend_locale, "fr");
        assert_eq!(ctx.default_frontend_locale, "en");
        assert_eq!(ctx.route_locale(), None);
        assert_eq!(ctx.link_locale_prefix(), Some("fr"));
    }

    #[test]
    fn test_route_locale_when_frontend_differs() {
        let ctx = ResolutionContext::new("en").with_frontend_locale("de");
        assert_eq!(ctx.route_locale(), Some("de"));
    }

    #[test]
    fn test_reserved_words_deserialize_from_list() {
        let words: ReservedWords = serde_json::from_str(r#"["Blog", "blog", "feed"]"#).unwrap();
        assert_eq!(words.iter().collect::<Vec<_>>(), vec!["blog", "feed"]);
    }
}
