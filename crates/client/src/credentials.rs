//! Bearer-token persistence.
//!
//! A tiny key-value contract: one token under one fixed key. Persistence
//! failures are logged and otherwise swallowed; a lost write only means the
//! user signs in again next time.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use anyhow::Context;

pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Option<String>;

    fn save(&self, token: &str);

    fn clear(&self);
}

/// Process-local store (tests, ephemeral sessions).
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, token: &str) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
    }

    fn clear(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Token kept in a file named after the credential key.
///
/// Default location: `{app_data_dir}/timeclock/{key}`. The file is read once;
/// after that `load` answers from memory, so the request path never blocks on
/// disk. Writes go through to the file.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    /// `None` until the file has been read.
    cached: RwLock<Option<Option<String>>>,
}

impl FileCredentialStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: RwLock::new(None),
        }
    }

    pub fn in_data_dir(key: &str) -> anyhow::Result<Self> {
        let mut path = data_dir().context("failed to resolve credential directory")?;
        path.push(key);
        Ok(Self::at(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                // Tolerate a trailing newline from hand-edited files.
                let token = contents.trim_end_matches(['\r', '\n']);
                (!token.trim().is_empty()).then(|| token.to_string())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                tracing::warn!(path = ?self.path, "failed to read stored credential: {err}");
                None
            }
        }
    }

    fn write(&self, token: &str) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create credential directory at {:?}", parent))?;
        }
        std::fs::write(&self.path, token)
            .with_context(|| format!("failed to write credential to {:?}", self.path))?;
        Ok(())
    }

    fn remember(&self, token: Option<String>) {
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Option<String> {
        if let Some(known) = self.cached.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            return known.clone();
        }
        let token = self.read();
        self.remember(token.clone());
        token
    }

    fn save(&self, token: &str) {
        self.remember(Some(token.to_string()));
        if let Err(err) = self.write(token) {
            tracing::error!("failed to persist credential: {err:?}");
        }
    }

    fn clear(&self) {
        self.remember(None);
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => tracing::error!(path = ?self.path, "failed to remove stored credential: {err}"),
        }
    }
}

fn data_dir() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory - tried data_dir() and home_dir()/.local/share")?;

    let mut dir = base;
    dir.push("timeclock");
    Ok(dir)
}
