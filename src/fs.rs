//! Filesystem capabilities consumed by the indexer and the index store.
//!
//! [`TreeFs`] is what the tree walk needs: list the children of one
//! directory, scope into a child directory, and report a logical root path
//! for building document identifiers. [`Substrate`] is the byte storage the
//! index itself persists into. A backing store may implement both (the
//! index bootstrap in [`crate::tantivy_index::NameIndex::open_in_tree`]
//! relies on that).

use std::{
    fmt,
    io::{self, Read, Write},
};

use serde::Serialize;

/// Separator used for logical paths and document identifiers.
pub const SEPARATOR: char = '/';

/// Whether a directory entry is a plain file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Dir => "dir",
        }
    }
}

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

/// Metadata returned by [`Substrate::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryInfo {
    pub kind: EntryKind,
    pub len: u64,
}

/// How [`Substrate::open_file`] should open a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Open an existing file for reading.
    Read,
    /// Create a file for writing. Fails with `AlreadyExists` if the path is
    /// taken.
    CreateNew,
    /// Create or truncate a file for writing.
    Truncate,
}

/// An open file handed out by a [`Substrate`].
pub trait SubstrateFile: Read + Write + Send + Sync {}

impl<T: Read + Write + Send + Sync> SubstrateFile for T {}

/// Byte storage an index can be persisted into.
///
/// Paths are relative to the substrate's root and use `/` as separator.
pub trait Substrate: Send + Sync + fmt::Debug + 'static {
    fn stat(&self, path: &str) -> io::Result<EntryInfo>;

    fn open_file(
        &self,
        path: &str,
        mode: OpenMode,
    ) -> io::Result<Box<dyn SubstrateFile>>;

    /// Create `path` and any missing parents.
    fn mkdir_all(&self, path: &str) -> io::Result<()>;

    fn remove_file(&self, path: &str) -> io::Result<()>;

    /// Move the file `from` to `to`, replacing any file already at `to`.
    fn rename(&self, from: &str, to: &str) -> io::Result<()>;
}

/// A directory of a hierarchical filesystem, as seen by the tree walk.
pub trait TreeFs: Sized {
    /// Logical path of this directory, used as the prefix of document
    /// identifiers. May be empty for the top of a tree.
    fn root(&self) -> &str;

    /// List the immediate children of this directory.
    fn read_dir(&self) -> io::Result<Vec<DirEntry>>;

    /// Scope into the child directory `name`.
    fn chroot(&self, name: &str) -> io::Result<Self>;

    /// Logical path of the child `name`.
    fn join(&self, name: &str) -> String {
        join_path(self.root(), name)
    }
}

/// Join a logical root path and an entry name.
pub fn join_path(root: &str, name: &str) -> String {
    if root.is_empty() {
        name.to_string()
    } else if root.ends_with(SEPARATOR) {
        format!("{root}{name}")
    } else {
        format!("{root}{SEPARATOR}{name}")
    }
}

/// Split a relative substrate path into its components.
///
/// Empty and `.` components are dropped; `..` is rejected so a scoped
/// substrate cannot reach outside its root.
pub fn path_components(path: &str) -> io::Result<Vec<&str>> {
    let mut components = Vec::new();
    for part in path.split(SEPARATOR) {
        match part {
            "" | "." => {}
            ".." => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("path escapes its root: {path}"),
                ));
            }
            part => components.push(part),
        }
    }
    Ok(components)
}

/// Validate a single child name passed to [`TreeFs::chroot`].
pub(crate) fn check_child_name(name: &str) -> io::Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(SEPARATOR)
    {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid directory name: {name:?}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_with_empty_root() {
        assert_eq!(join_path("", "notes.txt"), "notes.txt");
    }

    #[test]
    fn join_with_root() {
        assert_eq!(join_path("root", "notes.txt"), "root/notes.txt");
        assert_eq!(join_path("root/sub", "a_b.md"), "root/sub/a_b.md");
    }

    #[test]
    fn join_with_trailing_separator() {
        assert_eq!(join_path("/", "home"), "/home");
        assert_eq!(join_path("root/", "x"), "root/x");
    }

    #[test]
    fn components_skip_empty_and_dot() {
        assert_eq!(
            path_components("/a//b/./c/").unwrap(),
            vec!["a", "b", "c"]
        );
        assert!(path_components("").unwrap().is_empty());
    }

    #[test]
    fn components_reject_parent() {
        let err = path_components("a/../b").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn child_name_validation() {
        assert!(check_child_name("sub").is_ok());
        assert!(check_child_name("").is_err());
        assert!(check_child_name("..").is_err());
        assert!(check_child_name("a/b").is_err());
    }

    #[test]
    fn kind_strings() {
        assert_eq!(EntryKind::File.as_str(), "file");
        assert_eq!(EntryKind::Dir.as_str(), "dir");
        assert_eq!(serde_json::to_string(&EntryKind::Dir).unwrap(), "\"dir\"");
    }
}
