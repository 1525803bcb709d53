//! The sandboxed virtual filesystem.
//!
//! Scripts see a `/`-rooted tree mapped onto a host directory. Path
//! resolution is purely textual (`.` and `..` segments collapse, nothing
//! ever escapes the root, symlinks are never followed as path text).
//! Each entry carries permission bits and an owning object in a metadata
//! overlay; file contents live in host files.
//!
//! This module is mechanism only: the master-object security callback is
//! applied by the file efuns before anything here runs.

use cinder_core::ObjRef;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

pub const READ_OK: i64 = 1;
pub const WRITE_OK: i64 = 2;
pub const DIRECTORY: i64 = 4;

#[derive(Debug, Clone, Copy)]
pub struct EntryMeta {
    /// READ_OK | WRITE_OK bits; DIRECTORY is derived from the host.
    pub perms: i64,
    pub owner: Option<ObjRef>,
}

impl Default for EntryMeta {
    fn default() -> EntryMeta {
        EntryMeta {
            perms: READ_OK | WRITE_OK,
            owner: None,
        }
    }
}

pub struct Vfs {
    root: PathBuf,
    meta: HashMap<String, EntryMeta>,
}

/// Collapse `.` and `..` segments of an absolute virtual path. Returns
/// `None` for relative paths or attempts to climb past the root.
pub fn normalize(path: &str) -> Option<String> {
    if !path.starts_with('/') {
        return None;
    }
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        Some("/".to_string())
    } else {
        Some(format!("/{}", parts.join("/")))
    }
}

impl Vfs {
    pub fn new(root: PathBuf) -> Vfs {
        Vfs {
            root,
            meta: HashMap::new(),
        }
    }

    fn host(&self, virtual_path: &str) -> PathBuf {
        self.root.join(virtual_path.trim_start_matches('/'))
    }

    /// Permission bits for gating decisions: -1 when the entry does not
    /// exist, otherwise READ/WRITE bits plus DIRECTORY when applicable.
    pub fn stat(&self, path: &str) -> i64 {
        let Some(path) = normalize(path) else {
            return -1;
        };
        let host = self.host(&path);
        let Ok(md) = fs::metadata(&host) else {
            return -1;
        };
        let meta = self.meta.get(&path).copied().unwrap_or_default();
        let mut bits = meta.perms;
        if md.is_dir() {
            bits |= DIRECTORY;
        }
        bits
    }

    pub fn owner(&self, path: &str) -> Option<ObjRef> {
        let path = normalize(path)?;
        self.meta.get(&path).and_then(|m| m.owner)
    }

    pub fn set_perms(&mut self, path: &str, perms: i64) -> bool {
        let Some(path) = normalize(path) else {
            return false;
        };
        if !self.host(&path).exists() {
            return false;
        }
        self.meta.entry(path).or_default().perms = perms & (READ_OK | WRITE_OK);
        true
    }

    pub fn set_owner(&mut self, path: &str, owner: Option<ObjRef>) -> bool {
        let Some(path) = normalize(path) else {
            return false;
        };
        if !self.host(&path).exists() {
            return false;
        }
        self.meta.entry(path).or_default().owner = owner;
        true
    }

    /// File size in bytes, -2 for directories, -1 when absent.
    pub fn file_size(&self, path: &str) -> i64 {
        let Some(path) = normalize(path) else {
            return -1;
        };
        match fs::metadata(self.host(&path)) {
            Ok(md) if md.is_dir() => -2,
            Ok(md) => md.len() as i64,
            Err(_) => -1,
        }
    }

    pub fn read(&self, path: &str) -> io::Result<String> {
        let path = normalize(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "bad path"))?;
        fs::read_to_string(self.host(&path))
    }

    /// Append to a file, creating it if needed.
    pub fn append(&mut self, path: &str, text: &str) -> io::Result<()> {
        use std::io::Write;
        let path = normalize(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "bad path"))?;
        let mut f = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.host(&path))?;
        f.write_all(text.as_bytes())
    }

    /// Replace a file's contents.
    pub fn write(&mut self, path: &str, text: &str) -> io::Result<()> {
        let path = normalize(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "bad path"))?;
        fs::write(self.host(&path), text)
    }

    pub fn remove(&mut self, path: &str) -> io::Result<()> {
        let path = normalize(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "bad path"))?;
        fs::remove_file(self.host(&path))?;
        self.meta.remove(&path);
        Ok(())
    }

    pub fn rename(&mut self, from: &str, to: &str) -> io::Result<()> {
        let from = normalize(from)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "bad path"))?;
        let to = normalize(to)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "bad path"))?;
        fs::rename(self.host(&from), self.host(&to))?;
        if let Some(meta) = self.meta.remove(&from) {
            self.meta.insert(to, meta);
        }
        Ok(())
    }

    pub fn mkdir(&mut self, path: &str) -> io::Result<()> {
        let path = normalize(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "bad path"))?;
        fs::create_dir(self.host(&path))
    }

    pub fn rmdir(&mut self, path: &str) -> io::Result<()> {
        let path = normalize(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "bad path"))?;
        fs::remove_dir(self.host(&path))?;
        self.meta.remove(&path);
        Ok(())
    }

    /// Child names of a directory, sorted.
    pub fn get_dir(&self, path: &str) -> Option<Vec<String>> {
        let path = normalize(path)?;
        let mut names: Vec<String> = fs::read_dir(self.host(&path))
            .ok()?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Some(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Vfs) {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("obj")).unwrap();
        fs::write(dir.path().join("obj/thing.ci"), "int x;\n").unwrap();
        let vfs = Vfs::new(dir.path().to_path_buf());
        (dir, vfs)
    }

    #[test]
    fn test_normalize_collapses_dots() {
        assert_eq!(normalize("/a/b/../c/./d").unwrap(), "/a/c/d");
        assert_eq!(normalize("/").unwrap(), "/");
        assert_eq!(normalize("/a/.."), Some("/".to_string()));
        assert_eq!(normalize("/.."), None);
        assert_eq!(normalize("relative"), None);
    }

    #[test]
    fn test_stat_and_size() {
        let (_dir, vfs) = fixture();
        assert_eq!(vfs.stat("/missing"), -1);
        assert_eq!(vfs.stat("/obj") & DIRECTORY, DIRECTORY);
        let bits = vfs.stat("/obj/thing.ci");
        assert_eq!(bits & (READ_OK | WRITE_OK), READ_OK | WRITE_OK);
        assert_eq!(vfs.file_size("/obj/thing.ci"), 7);
        assert_eq!(vfs.file_size("/obj"), -2);
        assert_eq!(vfs.file_size("/missing"), -1);
    }

    #[test]
    fn test_chmod_survives_rename() {
        let (_dir, mut vfs) = fixture();
        assert!(vfs.set_perms("/obj/thing.ci", READ_OK));
        assert_eq!(vfs.stat("/obj/thing.ci") & WRITE_OK, 0);
        vfs.rename("/obj/thing.ci", "/obj/other.ci").unwrap();
        assert_eq!(vfs.stat("/obj/other.ci") & WRITE_OK, 0);
        assert_eq!(vfs.stat("/obj/thing.ci"), -1);
    }

    #[test]
    fn test_write_read_remove() {
        let (_dir, mut vfs) = fixture();
        vfs.append("/obj/log.txt", "one\n").unwrap();
        vfs.append("/obj/log.txt", "two\n").unwrap();
        assert_eq!(vfs.read("/obj/log.txt").unwrap(), "one\ntwo\n");
        vfs.remove("/obj/log.txt").unwrap();
        assert_eq!(vfs.stat("/obj/log.txt"), -1);
    }

    #[test]
    fn test_get_dir_sorted() {
        let (_dir, vfs) = fixture();
        let listing = vfs.get_dir("/").unwrap();
        assert_eq!(listing, vec!["obj".to_string()]);
        assert!(vfs.get_dir("/obj/thing.ci").is_none());
    }
}
