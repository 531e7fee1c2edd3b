use std::path::{Path, PathBuf};

use crate::{
    error::{Error, Result},
    local_fs::LocalFs,
    tantivy_index::INDEX_DIR,
};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "KBSEARCH_DATA_DIR";

#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Resolve the data directory from, in order of priority:
    /// 1. An explicit path (from --data-dir)
    /// 2. The KBSEARCH_DATA_DIR environment variable
    /// 3. The XDG data directory (~/.local/share/kbsearch/)
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(val) = std::env::var(DATA_DIR_ENV) {
            PathBuf::from(val)
        } else {
            xdg::BaseDirectories::with_prefix("kbsearch")
                .get_data_home()
                .ok_or_else(|| {
                    Error::Config(
                        "could not determine XDG data home directory".into(),
                    )
                })?
        };

        std::fs::create_dir_all(&root)
            .map_err(|_| Error::DataDir(root.clone()))?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the index files end up on disk.
    pub fn index_dir(&self) -> PathBuf {
        self.root.join(INDEX_DIR)
    }

    /// The data directory as index storage.
    pub fn store(&self) -> Result<LocalFs> {
        LocalFs::with_root(&self.root, "")
    }
}
