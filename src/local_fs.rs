use std::{
    fs::OpenOptions,
    io,
    path::{Path, PathBuf},
};

use tracing::warn;

use crate::{
    error::{Error, Result},
    fs::{
        DirEntry,
        EntryInfo,
        EntryKind,
        OpenMode,
        Substrate,
        SubstrateFile,
        TreeFs,
        check_child_name,
        path_components,
    },
};

/// A directory on the local disk.
///
/// Symlinks are reported as files and never followed, so the walk cannot
/// loop. Entries whose names are not valid UTF-8 are left out of listings.
#[derive(Debug, Clone)]
pub struct LocalFs {
    dir: PathBuf,
    root: String,
}

impl LocalFs {
    /// Open `dir`, using its canonical absolute path as the logical root.
    pub fn open(dir: &Path) -> Result<Self> {
        let canonical = dir.canonicalize()?;
        let root = canonical.to_string_lossy().into_owned();
        Self::with_root(&canonical, root)
    }

    /// Open `dir` with an explicit logical root path.
    pub fn with_root(dir: &Path, root: impl Into<String>) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::NotADirectory(dir.display().to_string()));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            root: root.into(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let mut resolved = self.dir.clone();
        for part in path_components(path)? {
            resolved.push(part);
        }
        Ok(resolved)
    }
}

impl TreeFs for LocalFs {
    fn root(&self) -> &str {
        &self.root
    }

    fn read_dir(&self) -> io::Result<Vec<DirEntry>> {
        let mut children = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let kind = if entry.file_type()?.is_dir() {
                EntryKind::Dir
            } else {
                EntryKind::File
            };
            // Identifiers are strings; a lossy name could neither be scoped
            // into nor kept unique.
            match entry.file_name().into_string() {
                Ok(name) => children.push(DirEntry::new(name, kind)),
                Err(name) => warn!(
                    dir = %self.dir.display(),
                    name = ?name,
                    "skipping entry with a non-UTF-8 name"
                ),
            }
        }
        Ok(children)
    }

    fn chroot(&self, name: &str) -> io::Result<Self> {
        check_child_name(name)?;
        let dir = self.dir.join(name);
        if !std::fs::symlink_metadata(&dir)?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("not a directory: {}", dir.display()),
            ));
        }
        Ok(Self {
            dir,
            root: self.join(name),
        })
    }
}

impl Substrate for LocalFs {
    fn stat(&self, path: &str) -> io::Result<EntryInfo> {
        let meta = std::fs::metadata(self.resolve(path)?)?;
        let kind = if meta.is_dir() {
            EntryKind::Dir
        } else {
            EntryKind::File
        };
        Ok(EntryInfo {
            kind,
            len: meta.len(),
        })
    }

    fn open_file(
        &self,
        path: &str,
        mode: OpenMode,
    ) -> io::Result<Box<dyn SubstrateFile>> {
        let path = self.resolve(path)?;
        let mut options = OpenOptions::new();
        match mode {
            OpenMode::Read => options.read(true),
            OpenMode::CreateNew => {
                options.read(true).write(true).create_new(true)
            }
            OpenMode::Truncate => {
                options.read(true).write(true).create(true).truncate(true)
            }
        };
        Ok(Box::new(options.open(path)?))
    }

    fn mkdir_all(&self, path: &str) -> io::Result<()> {
        std::fs::create_dir_all(self.resolve(path)?)
    }

    fn remove_file(&self, path: &str) -> io::Result<()> {
        std::fs::remove_file(self.resolve(path)?)
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        std::fs::rename(self.resolve(from)?, self.resolve(to)?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;

    #[test]
    fn lists_files_and_directories() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "x").unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();

        let fs = LocalFs::with_root(tmp.path(), "root").unwrap();
        let mut children = fs.read_dir().unwrap();
        children.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(
            children,
            vec![
                DirEntry::new("notes.txt", EntryKind::File),
                DirEntry::new("sub", EntryKind::Dir),
            ]
        );
    }

    #[test]
    fn chroot_extends_logical_root() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("sub/deeper")).unwrap();

        let fs = LocalFs::with_root(tmp.path(), "root").unwrap();
        let sub = fs.chroot("sub").unwrap();
        assert_eq!(sub.root(), "root/sub");
        assert_eq!(sub.join("a_b.md"), "root/sub/a_b.md");

        let deeper = sub.chroot("deeper").unwrap();
        assert_eq!(deeper.dir(), tmp.path().join("sub/deeper"));
    }

    #[test]
    fn chroot_into_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("file"), "x").unwrap();

        let fs = LocalFs::with_root(tmp.path(), "").unwrap();
        assert!(fs.chroot("file").is_err());
        assert!(fs.chroot("missing").is_err());
    }

    #[test]
    fn open_uses_canonical_root() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = LocalFs::open(tmp.path()).unwrap();
        let canonical = tmp.path().canonicalize().unwrap();
        assert_eq!(fs.root(), canonical.to_string_lossy());
    }

    #[test]
    fn open_rejects_files() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("file");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(
            LocalFs::with_root(&file, "x"),
            Err(Error::NotADirectory(_))
        ));
    }

    #[test]
    fn substrate_file_lifecycle() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = LocalFs::with_root(tmp.path(), "").unwrap();

        assert_eq!(
            fs.stat("idx/meta.json").unwrap_err().kind(),
            io::ErrorKind::NotFound
        );

        fs.mkdir_all("idx").unwrap();
        assert_eq!(fs.stat("idx").unwrap().kind, EntryKind::Dir);

        let mut file =
            fs.open_file("idx/meta.json", OpenMode::CreateNew).unwrap();
        file.write_all(b"{}").unwrap();
        file.flush().unwrap();
        drop(file);

        let err = fs
            .open_file("idx/meta.json", OpenMode::CreateNew)
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);

        let info = fs.stat("idx/meta.json").unwrap();
        assert_eq!(info.kind, EntryKind::File);
        assert_eq!(info.len, 2);

        let mut contents = String::new();
        fs.open_file("idx/meta.json", OpenMode::Read)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "{}");

        fs.remove_file("idx/meta.json").unwrap();
        assert!(fs.stat("idx/meta.json").is_err());
    }

    #[test]
    fn substrate_rejects_escaping_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = LocalFs::with_root(tmp.path(), "").unwrap();
        assert_eq!(
            fs.stat("../etc").unwrap_err().kind(),
            io::ErrorKind::InvalidInput
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_names_are_skipped() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

        use crate::{
            engine::IndexEngine,
            indexer::TreeIndexer,
            tantivy_index::NameIndex,
        };

        let tmp = tempfile::tempdir().unwrap();
        let bad_dir = tmp.path().join(OsStr::from_bytes(b"bad\xff"));
        std::fs::create_dir(&bad_dir).unwrap();
        std::fs::write(bad_dir.join("inner.txt"), "x").unwrap();
        std::fs::write(tmp.path().join(OsStr::from_bytes(b"a\xfe")), "")
            .unwrap();
        std::fs::write(tmp.path().join("zz_good.txt"), "x").unwrap();

        let fs = LocalFs::with_root(tmp.path(), "root").unwrap();
        assert_eq!(
            fs.read_dir().unwrap(),
            vec![DirEntry::new("zz_good.txt", EntryKind::File)]
        );

        let index = NameIndex::open_in_ram().unwrap();
        let stats = TreeIndexer::new(&index).index_tree(fs).unwrap();
        assert_eq!(stats.documents, 1);
        assert_eq!(
            index.search("good", 10).unwrap(),
            vec!["root/zz_good.txt"]
        );
    }
}
