//! Durable named watchlists.
//!
//! State lives behind one async mutex. Every mutation works on a copy, writes
//! the copy to disk (temp file, then rename) and only then replaces the
//! in-memory state, so a failed write changes nothing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{Symbol, WatchlistName};

type Lists = BTreeMap<WatchlistName, Vec<Symbol>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("watchlist '{name}' not found")]
    NotFound { name: WatchlistName },

    #[error("watchlist '{name}' already exists")]
    AlreadyExists { name: WatchlistName },

    #[error("the default watchlist cannot be deleted")]
    CannotDeleteDefault,

    #[error("{symbol} is not in watchlist '{name}'")]
    SymbolNotInList { name: WatchlistName, symbol: Symbol },

    #[error("failed to save watchlists to {path}: {message}")]
    Persist { path: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Watchlist {
    pub name: WatchlistName,
    pub symbols: Vec<Symbol>,
}

#[derive(Serialize)]
struct WatchlistFile<'a> {
    watchlists: BTreeMap<&'a str, Vec<&'a str>>,
}

#[derive(Deserialize)]
struct StoredLists {
    watchlists: BTreeMap<String, Value>,
}

pub struct WatchlistStore {
    path: PathBuf,
    lists: Mutex<Lists>,
}

impl WatchlistStore {
    /// Loads the store from `path`.
    ///
    /// Never fails: a missing or unreadable file yields a store holding only
    /// an empty default list.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lists = match load(&path).await {
            Ok(lists) => lists,
            Err(reason) => {
                tracing::warn!(path = %path.display(), %reason, "starting with an empty default watchlist");
                Lists::new()
            }
        };
        lists.entry(WatchlistName::default_list()).or_default();

        Self {
            path,
            lists: Mutex::new(lists),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, name: &WatchlistName) -> Result<Watchlist, StoreError> {
        let lists = self.lists.lock().await;
        lists
            .get(name)
            .map(|symbols| Watchlist {
                name: name.clone(),
                symbols: symbols.clone(),
            })
            .ok_or_else(|| StoreError::NotFound { name: name.clone() })
    }

    /// All watchlists, default first, then by name.
    pub async fn list(&self) -> Vec<Watchlist> {
        let lists = self.lists.lock().await;
        let mut all: Vec<Watchlist> = lists
            .iter()
            .map(|(name, symbols)| Watchlist {
                name: name.clone(),
                symbols: symbols.clone(),
            })
            .collect();
        all.sort_by_key(|list| (!list.name.is_default(), list.name.clone()));
        all
    }

    pub async fn create(&self, name: &WatchlistName) -> Result<(), StoreError> {
        self.mutate(|lists| {
            if lists.contains_key(name) {
                return Err(StoreError::AlreadyExists { name: name.clone() });
            }
            lists.insert(name.clone(), Vec::new());
            Ok(())
        })
        .await?;
        tracing::info!(watchlist = %name, "created watchlist");
        Ok(())
    }

    pub async fn delete(&self, name: &WatchlistName) -> Result<(), StoreError> {
        if name.is_default() {
            return Err(StoreError::CannotDeleteDefault);
        }
        self.mutate(|lists| {
            lists
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| StoreError::NotFound { name: name.clone() })
        })
        .await?;
        tracing::info!(watchlist = %name, "deleted watchlist");
        Ok(())
    }

    /// Appends `symbol`; returns `false` when it was already present.
    pub async fn add_symbol(&self, name: &WatchlistName, symbol: &Symbol) -> Result<bool, StoreError> {
        let mut lists = self.lists.lock().await;
        let symbols = lists
            .get(name)
            .ok_or_else(|| StoreError::NotFound { name: name.clone() })?;
        if symbols.contains(symbol) {
            return Ok(false);
        }

        let mut next = lists.clone();
        next.entry(name.clone()).or_default().push(symbol.clone());
        self.persist(&next).await?;
        *lists = next;

        tracing::info!(watchlist = %name, symbol = %symbol, "added symbol");
        Ok(true)
    }

    pub async fn remove_symbol(&self, name: &WatchlistName, symbol: &Symbol) -> Result<(), StoreError> {
        self.mutate(|lists| {
            let symbols = lists
                .get_mut(name)
                .ok_or_else(|| StoreError::NotFound { name: name.clone() })?;
            let position = symbols.iter().position(|held| held == symbol).ok_or_else(|| {
                StoreError::SymbolNotInList {
                    name: name.clone(),
                    symbol: symbol.clone(),
                }
            })?;
            symbols.remove(position);
            Ok(())
        })
        .await?;
        tracing::info!(watchlist = %name, symbol = %symbol, "removed symbol");
        Ok(())
    }

    /// Applies `change` to a copy and commits it once it is on disk. The lock
    /// is held for the whole write and released on every exit path.
    async fn mutate<F>(&self, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Lists) -> Result<(), StoreError>,
    {
        let mut lists = self.lists.lock().await;
        let mut next = lists.clone();
        change(&mut next)?;
        self.persist(&next).await?;
        *lists = next;
        Ok(())
    }

    async fn persist(&self, lists: &Lists) -> Result<(), StoreError> {
        let persist_error = |message: String| StoreError::Persist {
            path: self.path.display().to_string(),
            message,
        };

        let file = WatchlistFile {
            watchlists: lists
                .iter()
                .map(|(name, symbols)| (name.as_str(), symbols.iter().map(Symbol::as_str).collect()))
                .collect(),
        };
        let body = serde_json::to_string_pretty(&file).map_err(|e| persist_error(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| persist_error(e.to_string()))?;
        }

        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, body)
            .await
            .map_err(|e| persist_error(e.to_string()))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| persist_error(e.to_string()))?;
        Ok(())
    }
}

async fn load(path: &Path) -> Result<Lists, String> {
    let body = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("cannot read watchlist file: {e}"))?;
    let value: Value =
        serde_json::from_str(&body).map_err(|e| format!("watchlist file is not valid JSON: {e}"))?;

    // older files hold the name -> symbols map at the top level
    let raw = match value.get("watchlists") {
        Some(_) => serde_json::from_value::<StoredLists>(value).map(|stored| stored.watchlists),
        None => serde_json::from_value::<BTreeMap<String, Value>>(value),
    }
    .map_err(|e| format!("unexpected watchlist layout: {e}"))?;

    let mut lists = Lists::new();
    for (name, entry) in raw {
        let Value::Array(symbols) = entry else {
            tracing::warn!(key = %name, "skipping stored entry that is not a symbol list");
            continue;
        };
        let Ok(name) = WatchlistName::parse(&name) else {
            tracing::warn!(watchlist = %name, "skipping watchlist with an invalid name");
            continue;
        };
        let held = lists.entry(name).or_default();
        for raw_symbol in symbols {
            let Some(raw_symbol) = raw_symbol.as_str() else {
                tracing::warn!(symbol = %raw_symbol, "skipping non-string stored symbol");
                continue;
            };
            match Symbol::parse(raw_symbol) {
                Ok(symbol) if !held.contains(&symbol) => held.push(symbol),
                Ok(_) => {}
                Err(_) => tracing::warn!(symbol = %raw_symbol, "skipping invalid stored symbol"),
            }
        }
    }
    Ok(lists)
}
