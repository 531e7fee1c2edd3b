use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    vec,
};

use serde::Serialize;
use tracing::{debug, info};

use crate::{
    document::{NameDocument, is_ignored},
    engine::IndexEngine,
    error::{Error, Result},
    fs::{DirEntry, TreeFs},
};

/// Counters from one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WalkStats {
    /// Documents submitted, files and directories combined.
    pub documents: usize,
    /// Directories listed, the walk root included.
    pub directories: usize,
    /// Entries dropped by the ignore set.
    pub skipped: usize,
}

/// Walks a tree and submits one document per entry name.
pub struct TreeIndexer<'a, E: IndexEngine + ?Sized> {
    engine: &'a E,
    cancel: Option<Arc<AtomicBool>>,
}

/// A listed directory and the children not yet handled.
struct Frame<F> {
    dir: F,
    children: vec::IntoIter<DirEntry>,
}

impl<'a, E: IndexEngine + ?Sized> TreeIndexer<'a, E> {
    pub fn new(engine: &'a E) -> Self {
        Self {
            engine,
            cancel: None,
        }
    }

    /// Stop the walk with [`Error::Cancelled`] once `flag` is set.
    ///
    /// The flag is checked before each entry.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Index every entry reachable from `root`, then commit.
    ///
    /// The first listing, scoping or submission error ends the walk and is
    /// returned. Documents submitted before the error are committed anyway.
    pub fn index_tree<F: TreeFs>(&self, root: F) -> Result<WalkStats> {
        let mut stats = WalkStats::default();
        let walked = self.walk(root, &mut stats);
        let committed = self.engine.commit();
        walked?;
        committed?;

        info!(
            documents = stats.documents,
            directories = stats.directories,
            skipped = stats.skipped,
            "indexed tree"
        );
        Ok(stats)
    }

    fn walk<F: TreeFs>(&self, root: F, stats: &mut WalkStats) -> Result<()> {
        let mut stack = vec![self.open(root, stats)?];

        while let Some(frame) = stack.last_mut() {
            let Some(entry) = frame.children.next() else {
                stack.pop();
                continue;
            };
            self.check_cancelled()?;

            if is_ignored(&entry.name) {
                stats.skipped += 1;
                continue;
            }

            let id = frame.dir.join(&entry.name);
            let doc = NameDocument::new(&entry.name, entry.kind);
            self.engine.index_document(&id, &doc)?;
            stats.documents += 1;

            if entry.is_dir() {
                let child = frame.dir.chroot(&entry.name)?;
                let frame = self.open(child, stats)?;
                stack.push(frame);
            }
        }

        Ok(())
    }

    fn open<F: TreeFs>(
        &self,
        dir: F,
        stats: &mut WalkStats,
    ) -> Result<Frame<F>> {
        let children = dir.read_dir()?;
        debug!(
            root = dir.root(),
            children = children.len(),
            "listed directory"
        );
        stats.directories += 1;
        Ok(Frame {
            dir,
            children: children.into_iter(),
        })
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => {
                Err(Error::Cancelled)
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, io};

    use parking_lot::Mutex;

    use super::*;
    use crate::{
        fs::{EntryKind, Substrate},
        mem_fs::MemFs,
        tantivy_index::NameIndex,
    };

    /// Records submissions instead of indexing them.
    #[derive(Default)]
    struct RecordingEngine {
        submitted: Mutex<Vec<(String, NameDocument)>>,
        commits: Mutex<usize>,
        fail_on: Option<String>,
    }

    impl RecordingEngine {
        fn failing_on(id: &str) -> Self {
            Self {
                fail_on: Some(id.to_string()),
                ..Self::default()
            }
        }

        fn ids(&self) -> Vec<String> {
            self.submitted.lock().iter().map(|(id, _)| id.clone()).collect()
        }
    }

    impl IndexEngine for RecordingEngine {
        fn index_document(&self, id: &str, doc: &NameDocument) -> Result<()> {
            if self.fail_on.as_deref() == Some(id) {
                return Err(io::Error::other("engine rejected document").into());
            }
            self.submitted.lock().push((id.to_string(), doc.clone()));
            Ok(())
        }

        fn commit(&self) -> Result<()> {
            *self.commits.lock() += 1;
            Ok(())
        }

        fn search(&self, _query: &str, _limit: usize) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn doc_count(&self) -> Result<u64> {
            Ok(self.submitted.lock().len() as u64)
        }
    }

    /// root/{notes.txt, .DS_Store, sub/a_b.md}
    fn scenario() -> MemFs {
        let fs = MemFs::new();
        fs.write_file("root/notes.txt", "notes").unwrap();
        fs.write_file("root/.DS_Store", "junk").unwrap();
        fs.write_file("root/sub/a_b.md", "md").unwrap();
        fs
    }

    #[test]
    fn scenario_indexes_three_documents() {
        let fs = scenario();
        let engine = RecordingEngine::default();

        let stats = TreeIndexer::new(&engine)
            .index_tree(fs.chroot("root").unwrap())
            .unwrap();

        let ids: HashSet<_> = engine.ids().into_iter().collect();
        let expected: HashSet<_> =
            ["root/notes.txt", "root/sub", "root/sub/a_b.md"]
                .into_iter()
                .map(String::from)
                .collect();
        assert_eq!(ids, expected);
        assert_eq!(
            stats,
            WalkStats {
                documents: 3,
                directories: 2,
                skipped: 1,
            }
        );
        assert_eq!(*engine.commits.lock(), 1);
    }

    #[test]
    fn documents_carry_tokenized_names_and_kinds() {
        let fs = scenario();
        let engine = RecordingEngine::default();
        TreeIndexer::new(&engine)
            .index_tree(fs.chroot("root").unwrap())
            .unwrap();

        let submitted = engine.submitted.lock();
        let (_, sub) =
            submitted.iter().find(|(id, _)| id == "root/sub").unwrap();
        assert_eq!(sub.kind, EntryKind::Dir);
        let (_, md) = submitted
            .iter()
            .find(|(id, _)| id == "root/sub/a_b.md")
            .unwrap();
        assert_eq!(md.name, "a_b.md");
        assert_eq!(md.tokenized_name, "a b md");
        assert_eq!(md.kind, EntryKind::File);
    }

    #[test]
    fn directories_are_walked_before_later_siblings() {
        let fs = MemFs::new();
        fs.write_file("root/a/x", "").unwrap();
        fs.write_file("root/b", "").unwrap();
        let engine = RecordingEngine::default();

        TreeIndexer::new(&engine)
            .index_tree(fs.chroot("root").unwrap())
            .unwrap();

        assert_eq!(engine.ids(), vec!["root/a", "root/a/x", "root/b"]);
    }

    #[test]
    fn ignored_directories_are_not_descended() {
        let fs = MemFs::new();
        fs.write_file("root/.Trashes/deleted.txt", "").unwrap();
        fs.write_file("root/.fseventsd/log", "").unwrap();
        fs.write_file("root/._resource/inner.txt", "").unwrap();
        fs.write_file("root/._notes.txt", "").unwrap();
        fs.write_file("root/kept.txt", "").unwrap();
        let engine = RecordingEngine::default();

        let stats = TreeIndexer::new(&engine)
            .index_tree(fs.chroot("root").unwrap())
            .unwrap();

        assert_eq!(engine.ids(), vec!["root/kept.txt"]);
        assert_eq!(stats.skipped, 4);
        assert_eq!(stats.directories, 1);
    }

    #[test]
    fn every_entry_is_submitted_once() {
        let fs = MemFs::new();
        let mut expected = 0;
        for dir in ["root/d0", "root/d1/nested", "root/d2/nested/deeper"] {
            for i in 0..3 {
                fs.write_file(&format!("{dir}/file_{i}.txt"), "").unwrap();
                expected += 1;
            }
        }
        // d0, d1, d1/nested, d2, d2/nested, d2/nested/deeper
        expected += 6;
        let engine = RecordingEngine::default();

        let stats = TreeIndexer::new(&engine)
            .index_tree(fs.chroot("root").unwrap())
            .unwrap();

        let ids = engine.ids();
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(ids.len(), expected);
        assert_eq!(unique.len(), expected);
        assert_eq!(stats.documents, expected);
    }

    #[test]
    fn deep_trees_do_not_recurse() {
        let fs = MemFs::new();
        let path = (0..500).map(|i| format!("d{i}")).collect::<Vec<_>>();
        fs.mkdir_all(&format!("root/{}", path.join("/"))).unwrap();
        let engine = RecordingEngine::default();

        let stats = TreeIndexer::new(&engine)
            .index_tree(fs.chroot("root").unwrap())
            .unwrap();

        assert_eq!(stats.documents, 500);
        assert_eq!(stats.directories, 501);
    }

    #[test]
    fn listing_failure_stops_the_walk() {
        let fs = MemFs::new();
        fs.write_file("root/a/x", "").unwrap();
        fs.write_file("root/b/y", "").unwrap();
        fs.write_file("root/c/z", "").unwrap();
        fs.inject_failure("root/b").unwrap();
        let engine = RecordingEngine::default();

        let err = TreeIndexer::new(&engine)
            .index_tree(fs.chroot("root").unwrap())
            .unwrap_err();

        assert!(
            matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::Other)
        );
        assert_eq!(engine.ids(), vec!["root/a", "root/a/x", "root/b"]);
        assert_eq!(*engine.commits.lock(), 1);
    }

    #[test]
    fn scoping_failure_stops_the_walk() {
        let fs = MemFs::new();
        fs.write_file("root/a/x", "").unwrap();
        fs.write_file("root/b/y", "").unwrap();
        fs.write_file("root/c", "").unwrap();
        fs.inject_scope_failure("root/b").unwrap();
        let engine = RecordingEngine::default();

        let err = TreeIndexer::new(&engine)
            .index_tree(fs.chroot("root").unwrap())
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Io(ref e) if e.kind() == io::ErrorKind::PermissionDenied
        ));
        assert_eq!(engine.ids(), vec!["root/a", "root/a/x", "root/b"]);
        assert_eq!(*engine.commits.lock(), 1);
    }

    #[test]
    fn root_listing_failure_submits_nothing() {
        let fs = scenario();
        fs.inject_failure("root").unwrap();
        let engine = RecordingEngine::default();

        assert!(
            TreeIndexer::new(&engine)
                .index_tree(fs.chroot("root").unwrap())
                .is_err()
        );
        assert!(engine.ids().is_empty());
    }

    #[test]
    fn submission_failure_stops_the_walk() {
        let fs = MemFs::new();
        fs.write_file("root/a", "").unwrap();
        fs.write_file("root/b", "").unwrap();
        fs.write_file("root/c", "").unwrap();
        let engine = RecordingEngine::failing_on("root/b");

        let err = TreeIndexer::new(&engine)
            .index_tree(fs.chroot("root").unwrap())
            .unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert_eq!(engine.ids(), vec!["root/a"]);
    }

    #[test]
    fn cancelled_walk_submits_nothing_further() {
        let fs = scenario();
        let engine = RecordingEngine::default();
        let flag = Arc::new(AtomicBool::new(true));

        let err = TreeIndexer::new(&engine)
            .with_cancel(Arc::clone(&flag))
            .index_tree(fs.chroot("root").unwrap())
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert!(engine.ids().is_empty());
        assert_eq!(*engine.commits.lock(), 1);
    }

    #[test]
    fn scenario_against_tantivy() {
        let fs = scenario();
        let index = NameIndex::open_in_ram().unwrap();

        TreeIndexer::new(&index)
            .index_tree(fs.chroot("root").unwrap())
            .unwrap();

        assert_eq!(index.doc_count().unwrap(), 3);
        assert!(index.search("DS_Store", 10).unwrap().is_empty());
        assert_eq!(index.search("a_b", 10).unwrap(), vec!["root/sub/a_b.md"]);
    }

    #[test]
    fn reindexing_is_idempotent() {
        let fs = scenario();
        let index = NameIndex::open_in_ram().unwrap();
        let indexer = TreeIndexer::new(&index);

        indexer.index_tree(fs.chroot("root").unwrap()).unwrap();
        let first = index.doc_count().unwrap();
        indexer.index_tree(fs.chroot("root").unwrap()).unwrap();

        assert_eq!(first, 3);
        assert_eq!(index.doc_count().unwrap(), first);
    }

    #[test]
    fn partial_walk_keeps_submitted_documents() {
        let fs = MemFs::new();
        fs.write_file("root/a/report.txt", "").unwrap();
        fs.write_file("root/b/later.txt", "").unwrap();
        fs.inject_failure("root/b").unwrap();
        let index = NameIndex::open_in_ram().unwrap();

        assert!(
            TreeIndexer::new(&index)
                .index_tree(fs.chroot("root").unwrap())
                .is_err()
        );

        assert_eq!(
            index.search("report", 10).unwrap(),
            vec!["root/a/report.txt"]
        );
        assert!(index.search("later", 10).unwrap().is_empty());
    }
}
