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

use crate::models::deletion::{deletion_blockers, DeletionBlocker};
use crate::models::page_part::PageParts;
use crate::models::resolution::ResolutionContext;
use crate::utils::slug::{generate_localized_slug, normalize_custom_slug};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const HOME_LINK_URL: &str = "/";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    pub id: Option<i64>,
    pub parent_id: Option<i64>,
    pub title: String,
    pub menu_title: Option<String>,
    /// Explicit slug per locale
    pub custom_slugs: BTreeMap<String, String>,
    pub link_url: Option<String>,
    pub menu_match: Option<String>,
    pub deletable: bool,
    pub draft: bool,
    pub show_in_menu: bool,
    pub skip_to_first_child: bool,
    pub position: i32,
    pub meta_keywords: Option<String>,
    pub meta_description: Option<String>,
    pub browser_title: Option<String>,
    #[serde(default)]
    pub parts: PageParts,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            parent_id: None,
            title: title.into(),
            menu_title: None,
            custom_slugs: BTreeMap::new(),
            link_url: None,
            menu_match: None,
            deletable: true,
            draft: false,
            show_in_menu: true,
            skip_to_first_child: false,
            position: 0,
            meta_keywords: None,
            meta_description: None,
            browser_title: None,
            parts: PageParts::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn new_with_parent(parent_id: i64, title: impl Into<String>) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Self::new(title)
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_home(&self) -> bool {
        self.link_url() == Some(HOME_LINK_URL)
    }

    pub fn is_live(&self) -> bool {
        !self.draft
    }

    /// Live pages flagged to be shown in navigation.
    pub fn in_menu(&self) -> bool {
        self.is_live() && self.show_in_menu
    }

    pub fn link_url(&self) -> Option<&str> {
        non_blank(self.link_url.as_deref())
    }

    pub fn menu_match(&self) -> Option<&str> {
        non_blank(self.menu_match.as_deref())
    }

    pub fn menu_title(&self) -> Option<&str> {
        non_blank(self.menu_title.as_deref())
    }

    pub fn custom_slug(&self, locale: &str) -> Option<&str> {
        non_blank(self.custom_slugs.get(locale).map(String::as_str))
    }

    /// Set the custom slug for `locale`. A blank value clears it.
    pub fn set_custom_slug(&mut self, locale: impl Into<String>, custom_slug: impl Into<String>) {
        let locale = locale.into();
        let custom_slug = custom_slug.into();
        if custom_slug.trim().is_empty() {
            self.custom_slugs.remove(&locale);
        } else {
            self.custom_slugs.insert(locale, custom_slug.trim().to_string());
        }
    }

    pub fn clear_custom_slug(&mut self, locale: &str) -> Option<String> {
        self.custom_slugs.remove(locale)
    }

    /// Text the slug is derived from when no custom slug applies.
    pub fn slug_source(&self) -> &str {
        self.menu_title().unwrap_or(&self.title)
    }

    /// URL-safe identifier of this page under `ctx`.
    pub fn slug(&self, ctx: &ResolutionContext) -> String {
        let slug = match self.custom_slug(&ctx.locale) {
            Some(custom) => normalize_custom_slug(custom, &ctx.locale),
            None => generate_localized_slug(self.slug_source(), &ctx.locale),
        };
        ctx.reserved_words.disambiguate(slug)
    }

    /// Title shown in the browser, falling back to the page title.
    pub fn browser_title(&self) -> &str {
        non_blank(self.browser_title.as_deref()).unwrap_or(&self.title)
    }

    /// Title shown in navigation, falling back to the page title.
    pub fn menu_label(&self) -> &str {
        self.menu_title().unwrap_or(&self.title)
    }

    /// Whether this page claims `path` for navigation highlighting.
    pub fn matches_menu_path(&self, path: &str) -> bool {
        match self.menu_match() {
            Some(pattern) => Regex::new(pattern)
                .map(|re| re.is_match(path))
                .unwrap_or(false),
            None => false,
        }
    }

    pub fn deletion_blockers(&self) -> Vec<DeletionBlocker> {
        deletion_blockers(self)
    }

    pub fn is_deletable(&self) -> bool {
        self.deletion_blockers().is_empty()
    }

    pub fn content_for(&self, part_title: &str) -> Option<String> {
        self.parts.content_for(part_title)
    }

    pub fn all_page_part_content(&self) -> String {
        self.parts.all_page_part_content()
    }

    pub fn reposition_parts(&mut self) {
        self.parts.reposition_parts();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn validate_title(&self) -> Result<(), String> {
        if self.title.is_empty() {
            return Err("Title cannot be empty".to_string());
        }

        if self.title.len() > 255 {
            return Err("Title cannot exceed 255 characters".to_string());
        }

        if self.title.trim().is_empty() {
            return Err("Title cannot be only whitespace".to_string());
        }

        Ok(())
    }

    pub fn validate_custom_slugs(&self) -> Result<(), String> {
        for (locale, slug) in &self.custom_slugs {
            if locale.trim().is_empty() {
                return Err("Custom slug locale cannot be empty".to_string());
            }

            if slug.len() > 255 {
                return Err(format!(
                    "Custom slug for locale '{}' cannot exceed 255 characters",
                    locale
                ));
            }

            if slug.contains("//") {
                return Err(format!(
                    "Custom slug for locale '{}' cannot contain consecutive slashes",
                    locale
                ));
            }
        }
        Ok(())
    }

    pub fn validate_link_url(&self) -> Result<(), String> {
        if let Some(ref url) = self.link_url {
            if url.len() > 2048 {
                return Err("Link URL cannot exceed 2048 characters".to_string());
            }
            if url.trim().chars().any(char::is_whitespace) {
                return Err("Link URL cannot contain whitespace".to_string());
            }
        }
        Ok(())
    }

    pub fn validate_menu_match(&self) -> Result<(), String> {
        if let Some(pattern) = self.menu_match() {
            if pattern.len() > 255 {
                return Err("Menu match cannot exceed 255 characters".to_string());
            }
            Regex::new(pattern).map_err(|e| format!("Invalid menu match pattern: {}", e))?;
        }
        Ok(())
    }

    pub fn validate_metadata(&self) -> Result<(), String> {
        if let Some(ref title) = self.browser_title {
            if title.len() > 255 {
                return Err("Browser title cannot exceed 255 characters".to_string());
            }
        }

        if let Some(ref keywords) = self.meta_keywords {
            if keywords.len() > 255 {
                return Err("Meta keywords cannot exceed 255 characters".to_string());
            }
        }

        if let Some(ref desc) = self.meta_description {
            if desc.len() > 500 {
                return Err("Meta description cannot exceed 500 characters".to_string());
            }
        }

        Ok(())
    }

    pub fn validate_parts(&self) -> Result<(), String> {
        for part in &self.parts {
            part.is_valid()?;
        }
        self.parts.validate_positions()
    }

    pub fn is_valid(&self) -> Result<(), String> {
        self.validate_title()?;
        self.validate_custom_slugs()?;
        self.validate_link_url()?;
        self.validate_menu_match()?;
        self.validate_metadata()?;
        self.validate_parts()?;
        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::page_part::PagePart;
    use crate::models::resolution::ReservedWords;
    use chrono::Duration;

    #[test]
    fn test_new_creates_page_with_defaults() {
        let before_creation = Utc::now();
        let page = Page::new("About Us");
        let after_creation = Utc::now();

        assert_eq!(page.id, None);
        assert_eq!(page.parent_id, None);
        assert_eq!(page.title, "About Us");
        assert_eq!(page.menu_title, None);
        assert!(page.custom_slugs.is_empty());
        assert!(page.deletable);
        assert!(!page.draft);
        assert!(page.show_in_menu);
        assert!(!page.skip_to_first_child);
        assert_eq!(page.position, 0);
        assert!(page.parts.is_empty());

        assert!(page.created_at >= before_creation);
        assert!(page.created_at <= after_creation);
        assert_eq!(page.created_at, page.updated_at);
    }

    #[test]
    fn test_new_with_parent() {
        let page = Page::new_with_parent(10, "Sub Page");
        assert_eq!(page.parent_id, Some(10));
        assert!(!page.is_root());
    }

    #[test]
    fn test_is_live_follows_draft() {
        let mut page = Page::new("Draft");
        assert!(page.is_live());
        page.draft = true;
        assert!(!page.is_live());
        assert!(!page.in_menu());
    }

    #[test]
    fn test_in_menu_requires_show_in_menu() {
        let mut page = Page::new("Hidden");
        page.show_in_menu = false;
        assert!(!page.in_menu());
    }

    #[test]
    fn test_is_home_only_for_root_link() {
        let mut page = Page::new("Home");
        assert!(!page.is_home());
        page.link_url = Some("/".to_string());
        assert!(page.is_home());
        page.link_url = Some("/contact".to_string());
        assert!(!page.is_home());
    }

    #[test]
    fn test_slug_from_title() {
        let page = Page::new("Our great parent page");
        assert_eq!(
            page.slug(&ResolutionContext::default()),
            "our-great-parent-page"
        );
    }

    #[test]
    fn test_menu_title_takes_precedence_over_title() {
        let mut page = Page::new("A very long descriptive title");
        page.menu_title = Some("Short".to_string());
        assert_eq!(page.slug(&ResolutionContext::default()), "short");

        page.menu_title = Some("  ".to_string());
        assert_eq!(
            page.slug(&ResolutionContext::default()),
            "a-very-long-descriptive-title"
        );
    }

    #[test]
    fn test_custom_slug_takes_precedence() {
        let ctx = ResolutionContext::default();
        let mut page = Page::new("Our great parent page");
        page.menu_title = Some("Menu".to_string());
        page.set_custom_slug("en", "custom-page-slug");

        assert_eq!(page.slug(&ctx), "custom-page-slug");
        assert_eq!(page.title, "Our great parent page");
    }

    #[test]
    fn test_custom_slug_is_scoped_to_locale() {
        let mut page = Page::new("Hello");
        page.set_custom_slug("ru", "privet");

        let en = ResolutionContext::default();
        let ru = ResolutionContext::default().with_locale("ru");
        assert_eq!(page.slug(&en), "hello");
        assert_eq!(page.slug(&ru), "privet");
    }

    #[test]
    fn test_blank_custom_slug_clears() {
        let mut page = Page::new("Hello");
        page.set_custom_slug("en", "greeting");
        page.set_custom_slug("en", "   ");
        assert_eq!(page.custom_slug("en"), None);
        assert!(page.custom_slugs.is_empty());
    }

    #[test]
    fn test_reserved_word_title_gets_suffix() {
        let ctx = ResolutionContext::default();
        for word in ["pages", "admin", "login"] {
            let page = Page::new(word);
            assert_eq!(page.slug(&ctx), format!("{}-page", word));
        }
    }

    #[test]
    fn test_reserved_word_uses_context_list() {
        let ctx = ResolutionContext::default().with_reserved_words(ReservedWords::new(["blog"]));
        assert_eq!(Page::new("Blog").slug(&ctx), "blog-page");
        assert_eq!(Page::new("Admin").slug(&ctx), "admin");
    }

    #[test]
    fn test_slug_uses_locale_transliteration() {
        let page = Page::new("Über uns");
        let de = ResolutionContext::default().with_locale("de");
        assert_eq!(page.slug(&de), "ueber-uns");
        assert_eq!(page.slug(&ResolutionContext::default()), "uber-uns");
    }

    #[test]
    fn test_browser_title_falls_back_to_title() {
        let mut page = Page::new("About");
        assert_eq!(page.browser_title(), "About");
        page.browser_title = Some("About our company".to_string());
        assert_eq!(page.browser_title(), "About our company");
    }

    #[test]
    fn test_matches_menu_path() {
        let mut page = Page::new("Plugin");
        assert!(!page.matches_menu_path("/plugin-name"));

        page.menu_match = Some("^/plugin-name.*$".to_string());
        assert!(page.matches_menu_path("/plugin-name"));
        assert!(page.matches_menu_path("/plugin-name/items/1"));
        assert!(!page.matches_menu_path("/other"));

        page.menu_match = Some("([".to_string());
        assert!(!page.matches_menu_path("/plugin-name"));
    }

    #[test]
    fn test_content_delegates_to_parts() {
        let mut page = Page::new("Parts");
        page.parts.add_part("Body", "first");
        page.parts.add_part("Side Body", "second");

        assert_eq!(page.content_for("BODY"), Some("<p>first</p>".to_string()));
        assert_eq!(page.all_page_part_content(), "<p>first</p> <p>second</p>");
    }

    #[test]
    fn test_reposition_parts_on_page() {
        let mut page = Page::new("Parts");
        page.parts.push(PagePart::new("Body", "a", 6)).unwrap();
        page.parts.push(PagePart::new("Side Body", "b", 4)).unwrap();
        page.reposition_parts();
        assert_eq!(page.parts.part_with_title("side body").unwrap().position, 0);
        assert_eq!(page.parts.part_with_title("body").unwrap().position, 1);
    }

    #[test]
    fn test_duplicate_part_positions_make_page_invalid() {
        let mut page = Page::new("Parts");
        page.parts.add_part("Body", "a");
        page.parts.add_part("Side Body", "b");
        assert!(page.is_valid().is_ok());

        page.parts.part_with_title_mut("side body").unwrap().position = 0;
        assert!(page.validate_parts().is_err());
        assert!(page.is_valid().is_err());
    }

    #[test]
    fn test_validate_title() {
        assert!(Page::new("Valid").validate_title().is_ok());
        assert!(Page::new("").validate_title().is_err());
        assert!(Page::new("   ").validate_title().is_err());
        assert!(Page::new("a".repeat(256)).validate_title().is_err());
    }

    #[test]
    fn test_validate_menu_match() {
        let mut page = Page::new("Plugin");
        page.menu_match = Some("^/plugin-name.*$".to_string());
        assert!(page.validate_menu_match().is_ok());

        page.menu_match = Some("([".to_string());
        let err = page.validate_menu_match().unwrap_err();
        assert!(err.starts_with("Invalid menu match pattern"));
    }

    #[test]
    fn test_validate_link_url() {
        let mut page = Page::new("Link");
        page.link_url = Some("/contact".to_string());
        assert!(page.validate_link_url().is_ok());
        page.link_url = Some("/contact us".to_string());
        assert!(page.validate_link_url().is_err());
    }

    #[test]
    fn test_validate_custom_slugs() {
        let mut page = Page::new("Slugs");
        page.set_custom_slug("en", "products/widgets");
        assert!(page.validate_custom_slugs().is_ok());

        page.set_custom_slug("en", "products//widgets");
        assert!(page.validate_custom_slugs().is_err());
    }

    #[test]
    fn test_validate_metadata() {
        let mut page = Page::new("Meta");
        page.meta_keywords = Some("testing, meta, keywords".to_string());
        page.meta_description = Some("This is my description".to_string());
        page.browser_title = Some("My Browser Title".to_string());
        assert!(page.is_valid().is_ok());

        page.meta_description = Some("x".repeat(501));
        assert!(page.validate_metadata().is_err());
    }

    #[test]
    fn test_touch_updates_timestamp() {
        let mut page = Page::new("Touch");
        page.updated_at = page.updated_at - Duration::seconds(10);
        let stale = page.updated_at;
        page.touch();
        assert!(page.updated_at > stale);
    }
}
