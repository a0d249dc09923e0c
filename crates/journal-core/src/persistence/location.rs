//! Resolves a configured [`LibraryLocation`] to the library directory.

use std::fs;
use std::path::PathBuf;

use super::error::PersistenceError;
use crate::config::LibraryLocation;

const APP_DIRECTORY_NAME: &str = "Journal";
const LIBRARY_SUBFOLDER_NAME: &str = "UserData";

impl LibraryLocation {
    /// Directory holding the entry files, without touching the filesystem.
    pub fn library_dir(&self) -> Result<PathBuf, PersistenceError> {
        let base = match self {
            LibraryLocation::Path(path) => return Ok(path.clone()),
            LibraryLocation::Desktop => dirs_next::desktop_dir(),
            LibraryLocation::Home => dirs_next::home_dir(),
        };
        let base = base.ok_or(PersistenceError::DirectoryNotReachable(None))?;
        Ok(base.join(APP_DIRECTORY_NAME).join(LIBRARY_SUBFOLDER_NAME))
    }

    /// Library directory, created if it does not exist yet.
    pub fn ensure_library_dir(&self) -> Result<PathBuf, PersistenceError> {
        let dir = self.library_dir()?;
        if !dir.is_dir() {
            fs::create_dir_all(&dir)
                .map_err(|e| PersistenceError::DirectoryNotReachable(Some(e)))?;
        }
        Ok(dir)
    }
}
