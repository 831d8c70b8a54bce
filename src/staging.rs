//! Staging directory collaborator.
//!
//! Uploads land here as plain files addressed by filename; ingestion reads
//! from here and deletes the file once the document is fully persisted.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Staging {
    dir: PathBuf,
}

impl Staging {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the staging directory if it does not exist yet.
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Resolve a staged filename to its path, rejecting anything that
    /// could escape the staging directory.
    pub fn resolve(&self, file_name: &str) -> Result<PathBuf> {
        if file_name.is_empty() {
            return Err(Error::MalformedInput("empty file name".to_string()));
        }
        if file_name.contains('/') || file_name.contains('\\') || file_name.contains("..") {
            return Err(Error::MalformedInput(format!(
                "file name must not contain path separators: {}",
                file_name
            )));
        }
        Ok(self.dir.join(file_name))
    }

    pub fn write(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.resolve(file_name)?;
        self.ensure_dir()?;
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    pub fn remove(&self, file_name: &str) -> Result<()> {
        let path = self.resolve(file_name)?;
        std::fs::remove_file(path)?;
        Ok(())
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.resolve(file_name)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }
}

impl AsRef<Path> for Staging {
    fn as_ref(&self) -> &Path {
        &self.dir
    }
}
