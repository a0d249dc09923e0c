//! In-memory model of the library directory.
//!
//! A [`Bundle`] holds one child per entry file. Mutations only touch memory;
//! [`Bundle::write`] pushes the accumulated changes to disk in one pass and
//! [`Bundle::matches_contents`] tells whether that pass would change anything.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::safe_io::{atomic_write, remove_if_exists};

/// Storage primitive behind the persistence manager.
///
/// `add_regular_file` may store a file under a different name than the one
/// requested when that name is already taken; callers compare the returned
/// name against the requested one to detect collisions.
pub trait Bundle: Send {
    /// Names of every child, regular or not.
    fn file_names(&self) -> Vec<String>;

    fn contains(&self, name: &str) -> bool;

    /// Contents of a regular file child. `None` for directories and other
    /// non-regular children, or if the file cannot be read.
    fn regular_file_contents(&self, name: &str) -> Option<Vec<u8>>;

    fn remove_file(&mut self, name: &str);

    /// Add a regular file, returning the name it was stored under.
    fn add_regular_file(&mut self, contents: Vec<u8>, preferred_name: &str) -> String;

    /// Whether `dir` already reflects this bundle, so a write can be skipped.
    fn matches_contents(&self, dir: &Path) -> bool;

    /// Write all pending changes into `dir`.
    fn write(&mut self, dir: &Path) -> io::Result<()>;
}

#[derive(Debug, Clone)]
enum Child {
    Regular(Vec<u8>),
    /// Regular file known from a listing; contents not read yet.
    OnDisk,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
}

/// Directory-backed bundle.
pub struct DirectoryBundle {
    root: PathBuf,
    children: BTreeMap<String, Child>,
    /// Added or replaced since the last write.
    pending: BTreeSet<String>,
    /// Removed since the last write and still present on disk.
    removed: BTreeSet<String>,
    /// Regular files on disk as of the last read or write.
    synced: BTreeMap<String, FileStamp>,
}

impl DirectoryBundle {
    /// An empty bundle for `root` that has not been read from disk.
    pub fn empty(root: PathBuf) -> Self {
        Self {
            root,
            children: BTreeMap::new(),
            pending: BTreeSet::new(),
            removed: BTreeSet::new(),
            synced: BTreeMap::new(),
        }
    }

    /// Read `root`. With `load_contents` false only the listing is taken and
    /// file contents are read on demand.
    pub fn open(root: &Path, load_contents: bool) -> io::Result<Self> {
        let mut bundle = Self::empty(root.to_path_buf());
        for dir_entry in fs::read_dir(root)? {
            let dir_entry = dir_entry?;
            let name = dir_entry.file_name().to_string_lossy().into_owned();
            if is_hidden(&name) {
                continue;
            }
            let child = if dir_entry.file_type()?.is_file() {
                let meta = dir_entry.metadata()?;
                bundle.synced.insert(name.clone(), stamp_of(&meta));
                if load_contents {
                    Child::Regular(fs::read(dir_entry.path())?)
                } else {
                    Child::OnDisk
                }
            } else {
                Child::Other
            };
            bundle.children.insert(name, child);
        }
        Ok(bundle)
    }

    fn unique_name(&self, preferred_name: &str) -> String {
        if !self.children.contains_key(preferred_name) {
            return preferred_name.to_string();
        }
        (2..)
            .map(|n| format!("{}__{}", n, preferred_name))
            .find(|candidate| !self.children.contains_key(candidate))
            .unwrap_or_else(|| preferred_name.to_string())
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn stamp_of(meta: &fs::Metadata) -> FileStamp {
    FileStamp {
        len: meta.len(),
        modified: meta.modified().ok(),
    }
}

/// Stamps of the visible regular files currently in `dir`.
fn scan_stamps(dir: &Path) -> io::Result<BTreeMap<String, FileStamp>> {
    let mut stamps = BTreeMap::new();
    for dir_entry in fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        let name = dir_entry.file_name().to_string_lossy().into_owned();
        if is_hidden(&name) || !dir_entry.file_type()?.is_file() {
            continue;
        }
        stamps.insert(name, stamp_of(&dir_entry.metadata()?));
    }
    Ok(stamps)
}

impl Bundle for DirectoryBundle {
    fn file_names(&self) -> Vec<String> {
        self.children.keys().cloned().collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    fn regular_file_contents(&self, name: &str) -> Option<Vec<u8>> {
        match self.children.get(name)? {
            Child::Regular(contents) => Some(contents.clone()),
            Child::OnDisk => fs::read(self.root.join(name)).ok(),
            Child::Other => None,
        }
    }

    fn remove_file(&mut self, name: &str) {
        if self.children.remove(name).is_none() {
            return;
        }
        self.pending.remove(name);
        if self.synced.contains_key(name) {
            self.removed.insert(name.to_string());
        }
    }

    fn add_regular_file(&mut self, contents: Vec<u8>, preferred_name: &str) -> String {
        let name = self.unique_name(preferred_name);
        self.removed.remove(&name);
        self.pending.insert(name.clone());
        self.children.insert(name.clone(), Child::Regular(contents));
        name
    }

    fn matches_contents(&self, dir: &Path) -> bool {
        if dir != self.root || !self.pending.is_empty() || !self.removed.is_empty() {
            return false;
        }
        let Ok(stamps) = scan_stamps(dir) else {
            return false;
        };
        stamps == self.synced
            && self
                .children
                .iter()
                .all(|(name, child)| matches!(child, Child::Other) || stamps.contains_key(name))
    }

    fn write(&mut self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir)?;
        let rewrite_all = dir != self.root;

        for name in &self.removed {
            remove_if_exists(&dir.join(name))?;
        }

        // Files missing from disk or changed behind our back are rewritten
        // along with the pending ones.
        let on_disk = scan_stamps(dir)?;
        let mut vanished = Vec::new();
        for (name, child) in &self.children {
            let forced = rewrite_all || self.pending.contains(name);
            let contents = match child {
                Child::Other => continue,
                Child::Regular(contents) => {
                    let stale = on_disk.get(name).is_none_or(|s| self.synced.get(name) != Some(s));
                    if !forced && !stale {
                        continue;
                    }
                    contents.clone()
                }
                Child::OnDisk if forced => fs::read(self.root.join(name))?,
                Child::OnDisk => {
                    // Never read, so nothing to restore.
                    if !on_disk.contains_key(name) {
                        vanished.push(name.clone());
                    }
                    continue;
                }
            };
            atomic_write(&dir.join(name), &contents)?;
        }
        for name in vanished {
            self.children.remove(&name);
        }

        self.root = dir.to_path_buf();
        self.pending.clear();
        self.removed.clear();
        self.synced = scan_stamps(dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_reads_regular_files_and_flags_others() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("A"), b"alpha").unwrap();
        fs::create_dir(temp.path().join("folder")).unwrap();
        fs::write(temp.path().join(".DS_Store"), b"junk").unwrap();

        let bundle = DirectoryBundle::open(temp.path(), true).unwrap();
        assert_eq!(bundle.file_names(), vec!["A", "folder"]);
        assert_eq!(bundle.regular_file_contents("A").unwrap(), b"alpha");
        assert!(bundle.regular_file_contents("folder").is_none());
        assert!(!bundle.contains(".DS_Store"));
    }

    #[test]
    fn listing_only_reads_contents_on_demand() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("A"), b"alpha").unwrap();
        let bundle = DirectoryBundle::open(temp.path(), false).unwrap();
        assert!(bundle.contains("A"));
        assert_eq!(bundle.regular_file_contents("A").unwrap(), b"alpha");
    }

    #[test]
    fn colliding_add_gets_unique_name() {
        let temp = TempDir::new().unwrap();
        let mut bundle = DirectoryBundle::empty(temp.path().to_path_buf());
        assert_eq!(bundle.add_regular_file(b"1".to_vec(), "X"), "X");
        assert_eq!(bundle.add_regular_file(b"2".to_vec(), "X"), "2__X");
        assert_eq!(bundle.add_regular_file(b"3".to_vec(), "X"), "3__X");
    }

    #[test]
    fn fresh_open_matches_disk_until_mutated() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("A"), b"alpha").unwrap();
        let mut bundle = DirectoryBundle::open(temp.path(), true).unwrap();
        assert!(bundle.matches_contents(temp.path()));

        bundle.add_regular_file(b"beta".to_vec(), "B");
        assert!(!bundle.matches_contents(temp.path()));
    }

    #[test]
    fn write_applies_additions_and_removals() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("A"), b"alpha").unwrap();
        let mut bundle = DirectoryBundle::open(temp.path(), true).unwrap();

        bundle.remove_file("A");
        bundle.add_regular_file(b"beta".to_vec(), "B");
        bundle.write(temp.path()).unwrap();

        assert!(!temp.path().join("A").exists());
        assert_eq!(fs::read(temp.path().join("B")).unwrap(), b"beta");
        assert!(bundle.matches_contents(temp.path()));
    }

    #[test]
    fn replacing_a_file_rewrites_it() {
        let temp = TempDir::new().unwrap();
        let mut bundle = DirectoryBundle::empty(temp.path().to_path_buf());
        bundle.add_regular_file(b"v1".to_vec(), "A");
        bundle.write(temp.path()).unwrap();

        bundle.remove_file("A");
        assert_eq!(bundle.add_regular_file(b"v2".to_vec(), "A"), "A");
        bundle.write(temp.path()).unwrap();
        assert_eq!(fs::read(temp.path().join("A")).unwrap(), b"v2");
    }

    #[test]
    fn external_change_breaks_match() {
        let temp = TempDir::new().unwrap();
        let mut bundle = DirectoryBundle::empty(temp.path().to_path_buf());
        bundle.add_regular_file(b"v1".to_vec(), "A");
        bundle.write(temp.path()).unwrap();
        assert!(bundle.matches_contents(temp.path()));

        fs::write(temp.path().join("intruder"), b"?").unwrap();
        assert!(!bundle.matches_contents(temp.path()));
    }

    #[test]
    fn missing_file_is_restored_on_next_write() {
        let temp = TempDir::new().unwrap();
        let mut bundle = DirectoryBundle::empty(temp.path().to_path_buf());
        bundle.add_regular_file(b"alpha".to_vec(), "A");
        bundle.write(temp.path()).unwrap();

        fs::remove_file(temp.path().join("A")).unwrap();
        assert!(!bundle.matches_contents(temp.path()));

        bundle.add_regular_file(b"beta".to_vec(), "B");
        bundle.write(temp.path()).unwrap();
        assert_eq!(fs::read(temp.path().join("A")).unwrap(), b"alpha");
        assert_eq!(fs::read(temp.path().join("B")).unwrap(), b"beta");
        assert!(bundle.matches_contents(temp.path()));
    }

    #[test]
    fn vanished_unread_file_is_forgotten() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("A"), b"alpha").unwrap();
        let mut bundle = DirectoryBundle::open(temp.path(), false).unwrap();

        fs::remove_file(temp.path().join("A")).unwrap();
        assert!(!bundle.matches_contents(temp.path()));
        bundle.write(temp.path()).unwrap();
        assert!(!bundle.contains("A"));
        assert!(bundle.matches_contents(temp.path()));
    }

    #[test]
    fn writing_to_new_directory_copies_everything() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        fs::write(source.path().join("A"), b"alpha").unwrap();
        let mut bundle = DirectoryBundle::open(source.path(), false).unwrap();

        bundle.write(target.path()).unwrap();
        assert_eq!(fs::read(target.path().join("A")).unwrap(), b"alpha");
        assert!(bundle.matches_contents(target.path()));
    }
}
