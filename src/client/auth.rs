use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

/// Bearer token shared by every [`crate::client::ApiClient`] built from it.
///
/// The token lives in memory and is mirrored to `token_file` when one is
/// configured, so a later process starts logged in. Cloning shares state.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    token: Arc<RwLock<Option<String>>>,
    token_file: Option<PathBuf>,
}

impl AuthContext {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(RwLock::new(Some(token.into()))),
            token_file: None,
        }
    }

    /// Reads a previously stored token from `path`. A missing or unreadable
    /// file yields a logged-out context that will still write to `path`.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let token = match std::fs::read_to_string(&path) {
            Ok(content) => {
                let trimmed = content.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read token file");
                None
            }
        };
        debug!(path = %path.display(), logged_in = token.is_some(), "auth context loaded");

        Self {
            token: Arc::new(RwLock::new(token)),
            token_file: Some(path),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn login(&self, token: impl Into<String>) -> std::io::Result<()> {
        let token = token.into();
        if let Some(path) = &self.token_file {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &token)?;
        }
        if let Ok(mut guard) = self.token.write() {
            *guard = Some(token);
        }
        Ok(())
    }

    pub fn logout(&self) -> std::io::Result<()> {
        if let Ok(mut guard) = self.token.write() {
            *guard = None;
        }
        if let Some(path) = &self.token_file {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
