//! Flat file store
//!
//! Stored files live directly under a single root directory, keyed by
//! filename. Callers validate names (see
//! [`depot_common::validators::validate_filename`]) before asking for a path.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};

use crate::constants::{
    DATA_DIR_NAME, ERR_CREATE_FILE_ROOT, ERR_FILE_ROOT_CANONICALIZE, ERR_NO_FILE_ROOT,
    FILES_DIR_NAME,
};

/// Error opening a stored file for reading
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("file not found")]
    NotFound,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// An entry returned by [`FileStore::list`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub name: String,
    pub modified: SystemTime,
}

/// Get the default file root path for the platform
///
/// - **Linux**: `~/.local/share/depotd/files/`
/// - **macOS**: `~/Library/Application Support/depotd/files/`
/// - **Windows**: `%APPDATA%\depotd\files\`
///
/// # Errors
///
/// Returns an error if the platform's data directory cannot be determined.
pub fn default_file_root() -> Result<PathBuf, String> {
    let data_dir = dirs::data_dir().ok_or_else(|| ERR_NO_FILE_ROOT.to_string())?;
    Ok(data_dir.join(DATA_DIR_NAME).join(FILES_DIR_NAME))
}

/// Handle to the store root
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open the store at `root`, creating the directory if needed
    ///
    /// The root is canonicalized so every path handed out is absolute.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or resolved.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, String> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)
            .map_err(|e| format!("{}{}: {}", ERR_CREATE_FILE_ROOT, root.display(), e))?;
        let root = root
            .canonicalize()
            .map_err(|e| format!("{ERR_FILE_ROOT_CANONICALIZE}{e}"))?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Storage path for a validated filename
    #[must_use]
    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    /// Create `path` for writing, truncating any existing content
    pub async fn create(&self, path: &Path) -> io::Result<File> {
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .await
    }

    /// Open an existing regular file for reading
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if nothing exists at `path` or it is
    /// not a regular file.
    pub async fn open_read(&self, path: &Path) -> Result<File, StoreError> {
        let file = match File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(StoreError::NotFound),
            Err(e) => return Err(e.into()),
        };
        if !file.metadata().await?.is_file() {
            return Err(StoreError::NotFound);
        }
        Ok(file)
    }

    /// Remove `path`, treating an already-missing file as success
    pub async fn remove(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Regular files directly under the root, sorted by name
    ///
    /// Directories, non-UTF-8 names and entries whose metadata cannot be
    /// read are skipped.
    pub async fn list(&self) -> io::Result<Vec<StoredFile>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            files.push(StoredFile { name, modified });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }
}
