//! Process-wide light/dark preference.
//!
//! [`init`] runs once at startup; [`set`] changes the value and persists it.

use std::sync::{OnceLock, RwLock};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use super::settings::PreferenceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

pub struct ThemeState {
    current: RwLock<Theme>,
    store: PreferenceStore,
}

impl ThemeState {
    /// Persisted preference, else `fallback`.
    pub fn load(store: PreferenceStore, fallback: Theme) -> Self {
        let theme = store.load().theme.unwrap_or(fallback);
        Self {
            current: RwLock::new(theme),
            store,
        }
    }

    pub fn get(&self) -> Theme {
        self.current.read().map(|t| *t).unwrap_or(Theme::Light)
    }

    pub fn set(&self, theme: Theme) -> Result<()> {
        {
            let mut current = self
                .current
                .write()
                .map_err(|_| anyhow!("theme lock poisoned"))?;
            *current = theme;
        }
        self.store.update(|p| p.theme = Some(theme))?;
        tracing::info!("Theme set to {}", theme.as_str());
        Ok(())
    }
}

static THEME: OnceLock<ThemeState> = OnceLock::new();

/// Initialise the process-wide theme. Later calls return the value chosen by
/// the first one.
pub fn init(store: PreferenceStore, fallback: Theme) -> Theme {
    THEME.get_or_init(|| ThemeState::load(store, fallback)).get()
}

pub fn current() -> Theme {
    THEME.get().map(ThemeState::get).unwrap_or(Theme::Light)
}

pub fn set(theme: Theme) -> Result<()> {
    THEME
        .get()
        .ok_or_else(|| anyhow!("theme not initialised"))?
        .set(theme)
}
