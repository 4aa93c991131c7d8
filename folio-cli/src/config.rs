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

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use folio_core::models::resolution::{ReservedWords, ResolutionContext, DEFAULT_RESERVED_WORDS};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "folio.toml";
pub const ENV_PREFIX: &str = "FOLIO_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default = "default_locale")]
    pub locale: String,

    /// Falls back to `locale` when unset
    #[serde(default)]
    pub frontend_locale: Option<String>,

    #[serde(default = "default_locale")]
    pub default_frontend_locale: String,

    #[serde(default = "default_marketable_urls")]
    pub marketable_urls: bool,

    #[serde(default = "default_reserved_words")]
    pub reserved_words: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            locale: default_locale(),
            frontend_locale: None,
            default_frontend_locale: default_locale(),
            marketable_urls: default_marketable_urls(),
            reserved_words: default_reserved_words(),
        }
    }
}

impl Config {
    /// Load from `folio.toml` and `FOLIO_*` environment variables. A
    /// `DATABASE_URL` variable is honoured when `FOLIO_DATABASE_URL` is absent.
    pub fn from_env() -> anyhow::Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::raw().only(&["DATABASE_URL"]))
            .merge(Env::prefixed(ENV_PREFIX));

        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let config: Config = figment.extract()?;
        Ok(config)
    }

    pub fn to_resolution_context(&self) -> ResolutionContext {
        let frontend_locale = self
            .frontend_locale
            .clone()
            .unwrap_or_else(|| self.locale.clone());

        ResolutionContext::new(self.locale.clone())
            .with_frontend_locale(frontend_locale)
            .with_default_frontend_locale(self.default_frontend_locale.clone())
            .with_marketable_urls(self.marketable_urls)
            .with_reserved_words(ReservedWords::new(self.reserved_words.iter()))
    }
}

fn default_database_url() -> String {
    "sqlite:folio.db".to_string()
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_marketable_urls() -> bool {
    true
}

fn default_reserved_words() -> Vec<String> {
    DEFAULT_RESERVED_WORDS.iter().map(|word| word.to_string()).collect()
}
