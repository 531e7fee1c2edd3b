//! kbsearch - full-text search over the entry names of a directory tree.
//!
//! kbsearch walks a tree, turns every file and directory name into a small
//! document, and stores those documents in a
//! [Tantivy](https://github.com/quickwit-oss/tantivy) index that lives inside
//! a filesystem of its own. Queries go straight to Tantivy's query grammar and
//! come back as full paths.
//!
//! # Quick start
//!
//! ```no_run
//! use std::path::Path;
//!
//! use kbsearch::{LocalFs, NameIndex, TreeIndexer, search};
//!
//! let store = LocalFs::with_root(Path::new("/var/lib/kbsearch"), "").unwrap();
//! let index = NameIndex::open_in_tree(&store).unwrap();
//!
//! let tree = LocalFs::open(Path::new("/home/me/Documents")).unwrap();
//! let stats = TreeIndexer::new(&index).index_tree(tree).unwrap();
//! println!("indexed {} entries", stats.documents);
//!
//! for path in search::search(&index, "report").unwrap() {
//!     println!("{path}");
//! }
//! ```

pub mod data_dir;
pub mod document;
pub mod engine;
pub mod error;
pub mod fs;
pub mod indexer;
pub mod local_fs;
pub mod mem_fs;
pub mod search;
pub mod substrate_dir;
pub mod tantivy_index;

pub use data_dir::DataDir;
pub use document::NameDocument;
pub use engine::IndexEngine;
pub use error::{Error, Result};
pub use fs::{Substrate, TreeFs};
pub use indexer::{TreeIndexer, WalkStats};
pub use local_fs::LocalFs;
pub use mem_fs::MemFs;
pub use tantivy_index::NameIndex;
