use std::{
    collections::{BTreeMap, HashSet},
    io::{self, Cursor, Read, Write},
    sync::Arc,
};

use parking_lot::RwLock;

use crate::fs::{
    DirEntry,
    EntryInfo,
    EntryKind,
    OpenMode,
    SEPARATOR,
    Substrate,
    SubstrateFile,
    TreeFs,
    check_child_name,
    join_path,
    path_components,
};

#[derive(Debug)]
enum Node {
    Dir,
    File(Vec<u8>),
}

#[derive(Debug)]
struct MemTree {
    /// Keyed by full path from the tree root; the root itself is `""`.
    nodes: BTreeMap<String, Node>,
    /// Paths whose `stat` and `read_dir` fail.
    failures: HashSet<String>,
    /// Paths that cannot be scoped into with `chroot`.
    scope_failures: HashSet<String>,
}

impl Default for MemTree {
    fn default() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(String::new(), Node::Dir);
        Self {
            nodes,
            failures: HashSet::new(),
            scope_failures: HashSet::new(),
        }
    }
}

impl MemTree {
    fn check_failure(&self, key: &str) -> io::Result<()> {
        if self.failures.contains(key) {
            return Err(io::Error::other(format!("injected failure: {key}")));
        }
        Ok(())
    }

    fn check_parent(&self, key: &str) -> io::Result<()> {
        let parent = key.rsplit_once(SEPARATOR).map_or("", |(p, _)| p);
        match self.nodes.get(parent) {
            Some(Node::Dir) => Ok(()),
            Some(Node::File(_)) => Err(not_a_directory(parent)),
            None => Err(not_found(parent)),
        }
    }
}

/// An in-memory filesystem.
///
/// Clones share the same tree. [`TreeFs::chroot`] returns a handle scoped
/// to a subdirectory of that shared tree, and every [`Substrate`] path is
/// resolved relative to the handle's scope.
#[derive(Debug, Clone, Default)]
pub struct MemFs {
    tree: Arc<RwLock<MemTree>>,
    /// Key of the directory this handle is scoped to.
    scope: String,
    root: String,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `contents` to `path`, creating parent directories.
    pub fn write_file(
        &self,
        path: &str,
        contents: impl Into<Vec<u8>>,
    ) -> io::Result<()> {
        let key = self.key(path)?;
        if let Some((parent, _)) = key.rsplit_once(SEPARATOR) {
            self.mkdir_key(parent)?;
        }
        let mut tree = self.tree.write();
        if let Some(Node::Dir) = tree.nodes.get(&key) {
            return Err(is_a_directory(&key));
        }
        tree.nodes.insert(key, Node::File(contents.into()));
        Ok(())
    }

    pub fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        let key = self.key(path)?;
        match self.tree.read().nodes.get(&key) {
            Some(Node::File(data)) => Ok(data.clone()),
            Some(Node::Dir) => Err(is_a_directory(&key)),
            None => Err(not_found(&key)),
        }
    }

    /// Make `stat` and `read_dir` of `path` fail from now on.
    pub fn inject_failure(&self, path: &str) -> io::Result<()> {
        let key = self.key(path)?;
        self.tree.write().failures.insert(key);
        Ok(())
    }

    /// Make `chroot` into `path` fail with `PermissionDenied` from now on.
    pub fn inject_scope_failure(&self, path: &str) -> io::Result<()> {
        let key = self.key(path)?;
        self.tree.write().scope_failures.insert(key);
        Ok(())
    }

    fn key(&self, path: &str) -> io::Result<String> {
        let mut key = self.scope.clone();
        for part in path_components(path)? {
            if !key.is_empty() {
                key.push(SEPARATOR);
            }
            key.push_str(part);
        }
        Ok(key)
    }

    fn mkdir_key(&self, key: &str) -> io::Result<()> {
        let mut tree = self.tree.write();
        let mut current = String::new();
        for part in key.split(SEPARATOR).filter(|p| !p.is_empty()) {
            if !current.is_empty() {
                current.push(SEPARATOR);
            }
            current.push_str(part);
            match tree.nodes.get(&current) {
                Some(Node::Dir) => {}
                Some(Node::File(_)) => return Err(not_a_directory(&current)),
                None => {
                    tree.nodes.insert(current.clone(), Node::Dir);
                }
            }
        }
        Ok(())
    }
}

impl TreeFs for MemFs {
    fn root(&self) -> &str {
        &self.root
    }

    fn read_dir(&self) -> io::Result<Vec<DirEntry>> {
        let tree = self.tree.read();
        tree.check_failure(&self.scope)?;
        match tree.nodes.get(&self.scope) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => return Err(not_a_directory(&self.scope)),
            None => return Err(not_found(&self.scope)),
        }

        let prefix = if self.scope.is_empty() {
            String::new()
        } else {
            format!("{}{SEPARATOR}", self.scope)
        };

        let children = tree
            .nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, node)| {
                let name = &key[prefix.len()..];
                if name.is_empty() || name.contains(SEPARATOR) {
                    return None;
                }
                let kind = match node {
                    Node::Dir => EntryKind::Dir,
                    Node::File(_) => EntryKind::File,
                };
                Some(DirEntry::new(name, kind))
            })
            .collect();
        Ok(children)
    }

    fn chroot(&self, name: &str) -> io::Result<Self> {
        check_child_name(name)?;
        let key = self.key(name)?;
        let tree = self.tree.read();
        if tree.scope_failures.contains(&key) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("injected scope failure: {key}"),
            ));
        }
        match tree.nodes.get(&key) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => return Err(not_a_directory(&key)),
            None => return Err(not_found(&key)),
        }
        Ok(Self {
            tree: Arc::clone(&self.tree),
            scope: key,
            root: join_path(&self.root, name),
        })
    }
}

impl Substrate for MemFs {
    fn stat(&self, path: &str) -> io::Result<EntryInfo> {
        let key = self.key(path)?;
        let tree = self.tree.read();
        tree.check_failure(&key)?;
        match tree.nodes.get(&key) {
            Some(Node::Dir) => Ok(EntryInfo {
                kind: EntryKind::Dir,
                len: 0,
            }),
            Some(Node::File(data)) => Ok(EntryInfo {
                kind: EntryKind::File,
                len: data.len() as u64,
            }),
            None => Err(not_found(&key)),
        }
    }

    fn open_file(
        &self,
        path: &str,
        mode: OpenMode,
    ) -> io::Result<Box<dyn SubstrateFile>> {
        let key = self.key(path)?;
        let mut tree = self.tree.write();
        match mode {
            OpenMode::Read => match tree.nodes.get(&key) {
                Some(Node::File(data)) => Ok(Box::new(MemFile {
                    tree: Arc::clone(&self.tree),
                    key,
                    reader: Some(Cursor::new(data.clone())),
                })),
                Some(Node::Dir) => Err(is_a_directory(&key)),
                None => Err(not_found(&key)),
            },
            OpenMode::CreateNew | OpenMode::Truncate => {
                tree.check_parent(&key)?;
                match tree.nodes.get(&key) {
                    Some(Node::Dir) => return Err(is_a_directory(&key)),
                    Some(Node::File(_)) if mode == OpenMode::CreateNew => {
                        return Err(io::Error::new(
                            io::ErrorKind::AlreadyExists,
                            format!("file exists: {key}"),
                        ));
                    }
                    _ => {}
                }
                tree.nodes.insert(key.clone(), Node::File(Vec::new()));
                Ok(Box::new(MemFile {
                    tree: Arc::clone(&self.tree),
                    key,
                    reader: None,
                }))
            }
        }
    }

    fn mkdir_all(&self, path: &str) -> io::Result<()> {
        let key = self.key(path)?;
        self.mkdir_key(&key)
    }

    fn remove_file(&self, path: &str) -> io::Result<()> {
        let key = self.key(path)?;
        let mut tree = self.tree.write();
        match tree.nodes.get(&key) {
            Some(Node::File(_)) => {
                tree.nodes.remove(&key);
                Ok(())
            }
            Some(Node::Dir) => Err(is_a_directory(&key)),
            None => Err(not_found(&key)),
        }
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        let (from, to) = (self.key(from)?, self.key(to)?);
        let mut tree = self.tree.write();
        tree.check_parent(&to)?;
        if let Some(Node::Dir) = tree.nodes.get(&to) {
            return Err(is_a_directory(&to));
        }
        match tree.nodes.remove(&from) {
            Some(Node::File(data)) => {
                tree.nodes.insert(to, Node::File(data));
                Ok(())
            }
            Some(Node::Dir) => {
                tree.nodes.insert(from.clone(), Node::Dir);
                Err(is_a_directory(&from))
            }
            None => Err(not_found(&from)),
        }
    }
}

/// A file opened on a [`MemFs`].
///
/// Read handles work on a snapshot taken at open time. Write handles append
/// straight into the shared tree.
struct MemFile {
    tree: Arc<RwLock<MemTree>>,
    key: String,
    reader: Option<Cursor<Vec<u8>>>,
}

impl Read for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.reader {
            Some(reader) => reader.read(buf),
            None => Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("opened for writing: {}", self.key),
            )),
        }
    }
}

impl Write for MemFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.reader.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("opened for reading: {}", self.key),
            ));
        }
        match self.tree.write().nodes.get_mut(&self.key) {
            Some(Node::File(data)) => {
                data.extend_from_slice(buf);
                Ok(buf.len())
            }
            _ => Err(not_found(&self.key)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn not_found(key: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("no such entry: {key:?}"))
}

fn not_a_directory(key: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotADirectory,
        format!("not a directory: {key:?}"),
    )
}

fn is_a_directory(key: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::IsADirectory,
        format!("is a directory: {key:?}"),
    )
}
