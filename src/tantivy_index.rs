use std::{io, sync::Arc};

use parking_lot::Mutex;
use tantivy::{
    Index,
    IndexReader,
    IndexSettings,
    IndexWriter,
    ReloadPolicy,
    TantivyDocument,
    Term,
    collector::TopDocs,
    doc,
    indexer::LogMergePolicy,
    query::QueryParser,
    schema::{Field, STORED, STRING, Schema, TEXT, Value},
};
use tracing::{debug, info};

use crate::{
    document::NameDocument,
    engine::IndexEngine,
    error::Result,
    fs::{Substrate, TreeFs},
    substrate_dir::SubstrateDirectory,
};

/// Directory created at the top of a tree to hold the index.
pub const INDEX_DIR: &str = "kbfs_index";

/// Path of the index inside [`INDEX_DIR`].
pub const INDEX_NAME: &str = "kbindex";

/// Writer memory budget (tantivy's per-thread minimum).
const WRITER_MEMORY_BUDGET: usize = 15_000_000;

/// Field names used in the schema.
pub mod fields {
    pub const PATH: &str = "path";
    pub const NAME: &str = "name";
    pub const TOKENIZED_NAME: &str = "tokenized_name";
    pub const KIND: &str = "kind";
}

/// Resolved field handles for the schema.
#[derive(Debug, Clone, Copy)]
pub struct SchemaFields {
    pub path: Field,
    pub name: Field,
    pub tokenized_name: Field,
    pub kind: Field,
}

impl SchemaFields {
    fn resolve(schema: &Schema) -> Result<Self> {
        Ok(Self {
            path: schema.get_field(fields::PATH)?,
            name: schema.get_field(fields::NAME)?,
            tokenized_name: schema.get_field(fields::TOKENIZED_NAME)?,
            kind: schema.get_field(fields::KIND)?,
        })
    }
}

fn build_schema() -> Schema {
    let mut builder = Schema::builder();
    builder.add_text_field(fields::PATH, STRING | STORED);
    builder.add_text_field(fields::NAME, TEXT | STORED);
    builder.add_text_field(fields::TOKENIZED_NAME, TEXT);
    builder.add_text_field(fields::KIND, STRING | STORED);
    builder.build()
}

/// A tantivy index of entry names, keyed by path.
///
/// Opening an index only sets up a reader. The writer, and with it tantivy's
/// exclusive writer lock, is taken on the first [`IndexEngine::index_document`]
/// call, so any number of handles can search while one of them indexes.
pub struct NameIndex {
    index: Index,
    reader: IndexReader,
    writer: Mutex<Option<IndexWriter>>,
    fields: SchemaFields,
}

impl NameIndex {
    /// Open the index at `path` inside `substrate`, creating it if `path`
    /// does not exist.
    ///
    /// Only a not-found `stat` leads to creation; any other `stat` error is
    /// returned as is.
    pub fn open_or_create<S: Substrate>(
        substrate: S,
        path: &str,
    ) -> Result<Self> {
        let substrate: Arc<dyn Substrate> = Arc::new(substrate);
        let directory = SubstrateDirectory::new(Arc::clone(&substrate), path);

        let index = match substrate.stat(path) {
            Ok(_) => {
                info!(path, "opening name index");
                Index::open(directory)?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path, "creating name index");
                substrate.mkdir_all(path)?;
                Index::create(
                    directory,
                    build_schema(),
                    IndexSettings::default(),
                )?
            }
            Err(e) => return Err(e.into()),
        };

        Self::from_index(index)
    }

    /// Open or create the index in the dedicated [`INDEX_DIR`] of `fs`.
    pub fn open_in_tree<F>(fs: &F) -> Result<Self>
    where
        F: TreeFs + Substrate,
    {
        fs.mkdir_all(INDEX_DIR)?;
        let scoped = fs.chroot(INDEX_DIR)?;
        Self::open_or_create(scoped, INDEX_NAME)
    }

    /// Create an in-memory index (for testing).
    pub fn open_in_ram() -> Result<Self> {
        Self::from_index(Index::create_in_ram(build_schema()))
    }

    fn from_index(index: Index) -> Result<Self> {
        let fields = SchemaFields::resolve(&index.schema())?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            reader,
            writer: Mutex::new(None),
            fields,
        })
    }

    /// Run `f` against the writer, acquiring it on first use.
    fn with_writer<T>(
        &self,
        f: impl FnOnce(&mut IndexWriter) -> Result<T>,
    ) -> Result<T> {
        let mut slot = self.writer.lock();
        let writer = match slot.take() {
            Some(writer) => writer,
            None => {
                let writer: IndexWriter = self
                    .index
                    .writer_with_num_threads(1, WRITER_MEMORY_BUDGET)?;
                writer.set_merge_policy(Box::new(LogMergePolicy::default()));
                debug!("acquired index writer");
                writer
            }
        };
        f(slot.insert(writer))
    }

    /// Get the resolved field handles.
    pub fn fields(&self) -> SchemaFields {
        self.fields
    }
}

impl IndexEngine for NameIndex {
    fn index_document(&self, id: &str, doc: &NameDocument) -> Result<()> {
        let f = self.fields;
        self.with_writer(|writer| {
            // Delete any existing document with this path first.
            writer.delete_term(Term::from_field_text(f.path, id));
            writer.add_document(doc!(
                f.path => id,
                f.name => doc.name.as_str(),
                f.tokenized_name => doc.tokenized_name.as_str(),
                f.kind => doc.kind.as_str(),
            ))?;
            Ok(())
        })
    }

    fn commit(&self) -> Result<()> {
        // Without a writer nothing was staged through this handle.
        if let Some(writer) = self.writer.lock().as_mut() {
            writer.commit()?;
        }
        Ok(())
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let f = self.fields;
        self.reader.reload()?;
        let searcher = self.reader.searcher();

        let parser =
            QueryParser::for_index(&self.index, vec![f.name, f.tokenized_name]);
        let query = parser.parse_query(query)?;
        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit))?;

        let mut paths = Vec::with_capacity(top_docs.len());
        for (_score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            paths.push(extract_text(&doc, f.path));
        }

        Ok(paths)
    }

    fn doc_count(&self) -> Result<u64> {
        self.reader.reload()?;
        Ok(self.reader.searcher().num_docs())
    }
}

impl std::fmt::Debug for NameIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameIndex").finish_non_exhaustive()
    }
}

fn extract_text(doc: &TantivyDocument, field: Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}
