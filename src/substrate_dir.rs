//! A tantivy [`Directory`] whose only access to storage is a [`Substrate`].
//!
//! Every segment file, the meta file and the lock files live under one base
//! path inside the substrate. Reads load the whole file into memory.
//!
//! Atomic writes go to a staging file that is then renamed over the target,
//! so a concurrent reload sees either the old or the new contents. Nothing
//! is fsynced: after a power loss the renamed file may still be incomplete.

use std::{
    fmt,
    io::{self, BufWriter, Read, Write},
    ops::Range,
    path::{Path, PathBuf},
    sync::Arc,
};

use tantivy::{
    HasLen,
    directory::{
        AntiCallToken,
        Directory,
        FileHandle,
        OwnedBytes,
        TerminatingWrite,
        WatchCallback,
        WatchHandle,
        WritePtr,
        error::{DeleteError, OpenReadError, OpenWriteError},
    },
};

use crate::fs::{OpenMode, SEPARATOR, Substrate, SubstrateFile};

/// Appended to a path while its atomic write is in flight.
const STAGING_SUFFIX: &str = ".tmp";

#[derive(Clone)]
pub struct SubstrateDirectory {
    substrate: Arc<dyn Substrate>,
    base: String,
}

impl SubstrateDirectory {
    pub fn new(substrate: Arc<dyn Substrate>, base: impl Into<String>) -> Self {
        Self {
            substrate,
            base: base.into(),
        }
    }

    fn resolve(&self, path: &Path) -> String {
        let name = path.to_string_lossy();
        if self.base.is_empty() {
            name.into_owned()
        } else {
            format!("{}{SEPARATOR}{name}", self.base)
        }
    }

    fn read_all(&self, path: &Path) -> Result<Vec<u8>, OpenReadError> {
        let mut file = self
            .substrate
            .open_file(&self.resolve(path), OpenMode::Read)
            .map_err(|e| open_read_error(e, path))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| open_read_error(e, path))?;
        Ok(data)
    }
}

impl fmt::Debug for SubstrateDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubstrateDirectory")
            .field("substrate", &self.substrate)
            .field("base", &self.base)
            .finish()
    }
}

impl Directory for SubstrateDirectory {
    fn get_file_handle(
        &self,
        path: &Path,
    ) -> Result<Arc<dyn FileHandle>, OpenReadError> {
        let data = self.read_all(path)?;
        Ok(Arc::new(LoadedFile {
            bytes: OwnedBytes::new(data),
        }))
    }

    fn delete(&self, path: &Path) -> Result<(), DeleteError> {
        self.substrate
            .remove_file(&self.resolve(path))
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => {
                    DeleteError::FileDoesNotExist(path.to_path_buf())
                }
                _ => DeleteError::IoError {
                    io_error: Arc::new(e),
                    filepath: path.to_path_buf(),
                },
            })
    }

    fn exists(&self, path: &Path) -> Result<bool, OpenReadError> {
        match self.substrate.stat(&self.resolve(path)) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(open_read_error(e, path)),
        }
    }

    fn open_write(&self, path: &Path) -> Result<WritePtr, OpenWriteError> {
        let file = self
            .substrate
            .open_file(&self.resolve(path), OpenMode::CreateNew)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => {
                    OpenWriteError::FileAlreadyExists(path.to_path_buf())
                }
                _ => OpenWriteError::IoError {
                    io_error: Arc::new(e),
                    filepath: path.to_path_buf(),
                },
            })?;
        let writer: Box<dyn TerminatingWrite> = Box::new(SubstrateWriter {
            file,
            path: path.to_path_buf(),
        });
        Ok(BufWriter::new(writer))
    }

    fn atomic_read(&self, path: &Path) -> Result<Vec<u8>, OpenReadError> {
        self.read_all(path)
    }

    fn atomic_write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let target = self.resolve(path);
        let staging = format!("{target}{STAGING_SUFFIX}");

        let mut file = self.substrate.open_file(&staging, OpenMode::Truncate)?;
        file.write_all(data)?;
        file.flush()?;
        drop(file);

        self.substrate.rename(&staging, &target)
    }

    fn sync_directory(&self) -> io::Result<()> {
        Ok(())
    }

    fn watch(&self, _callback: WatchCallback) -> tantivy::Result<WatchHandle> {
        Ok(WatchHandle::empty())
    }
}

fn open_read_error(e: io::Error, path: &Path) -> OpenReadError {
    match e.kind() {
        io::ErrorKind::NotFound => {
            OpenReadError::FileDoesNotExist(path.to_path_buf())
        }
        _ => OpenReadError::IoError {
            io_error: Arc::new(e),
            filepath: path.to_path_buf(),
        },
    }
}

/// A file loaded fully into memory.
struct LoadedFile {
    bytes: OwnedBytes,
}

impl fmt::Debug for LoadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedFile")
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl HasLen for LoadedFile {
    fn len(&self) -> usize {
        self.bytes.len()
    }
}

impl FileHandle for LoadedFile {
    fn read_bytes(&self, range: Range<usize>) -> io::Result<OwnedBytes> {
        if range.start > range.end || range.end > self.bytes.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "range {range:?} out of bounds for file of {} bytes",
                    self.bytes.len()
                ),
            ));
        }
        Ok(self.bytes.slice(range))
    }
}

struct SubstrateWriter {
    file: Box<dyn SubstrateFile>,
    path: PathBuf,
}

impl Write for SubstrateWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl TerminatingWrite for SubstrateWriter {
    fn terminate_ref(&mut self, _: AntiCallToken) -> io::Result<()> {
        self.file.flush().map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("finishing {}: {e}", self.path.display()),
            )
        })
    }
}
