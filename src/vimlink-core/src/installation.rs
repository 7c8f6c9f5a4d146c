//! Per-installation identity.
//!
//! Several plugin binaries may attach to the same host. Each one suffixes its
//! RPC function names with an identifier that is stable across restarts of the
//! same installed binary and distinct between installations. The identifier is
//! persisted in a file next to the executable.

use crate::token::Token;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstallationId(Token);

#[derive(Debug, Error)]
pub enum InstallationError {
    #[error("unable to locate the running executable: {0}")]
    CurrentExe(std::io::Error),
    #[error("failed to read installation id at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write installation id at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl InstallationId {
    pub fn new(token: Token) -> Self {
        Self(token)
    }

    /// `<current executable>.uuid`
    pub fn default_path() -> Result<PathBuf, InstallationError> {
        let exe = std::env::current_exe().map_err(InstallationError::CurrentExe)?;
        let mut name = exe.as_os_str().to_os_string();
        name.push(".uuid");
        Ok(PathBuf::from(name))
    }

    /// Read the identifier at `path`, generating and persisting a fresh one on
    /// first run. An unreadable (non-hex) file is replaced.
    pub fn load_or_create(path: &Path) -> Result<Self, InstallationError> {
        match fs::read_to_string(path) {
            Ok(contents) if !contents.trim().is_empty() => match Token::parse(&contents) {
                Ok(token) => {
                    tracing::debug!(path = %path.display(), "Loaded installation id");
                    return Ok(Self(token));
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "Replacing corrupt installation id");
                }
            },
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(InstallationError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }

        let id = Self(Token::generate());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| InstallationError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, id.to_string()).map_err(|source| InstallationError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), installation = %id, "Created installation id");
        Ok(id)
    }

    pub fn token(&self) -> Token {
        self.0
    }
}

impl fmt::Display for InstallationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn first_run_persists_identifier() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plugin.uuid");

        let id = InstallationId::load_or_create(&path).unwrap();
        let stored = fs::read_to_string(&path).unwrap();
        assert_eq!(stored, id.to_string());
    }

    #[test]
    fn identifier_is_stable_across_restarts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plugin.uuid");

        let first = InstallationId::load_or_create(&path).unwrap();
        let second = InstallationId::load_or_create(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn distinct_installations_get_distinct_ids() {
        let dir = tempdir().unwrap();
        let a = InstallationId::load_or_create(&dir.path().join("a.uuid")).unwrap();
        let b = InstallationId::load_or_create(&dir.path().join("b.uuid")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn corrupt_file_is_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plugin.uuid");
        fs::write(&path, "not-a-token").unwrap();

        let id = InstallationId::load_or_create(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), id.to_string());
    }

    #[test]
    fn default_path_sits_next_to_executable() {
        let path = InstallationId::default_path().unwrap();
        assert!(path.to_string_lossy().ends_with(".uuid"));
    }
}
