use crate::{document::NameDocument, error::Result};

/// The operations the tree walk and the query service need from a
/// full-text engine.
///
/// Creating and opening an index are left to the implementation's
/// constructors (see [`crate::tantivy_index::NameIndex`]).
pub trait IndexEngine {
    /// Add `doc` under `id`, replacing any document already stored with the
    /// same identifier once the next commit lands.
    fn index_document(&self, id: &str, doc: &NameDocument) -> Result<()>;

    /// Make everything submitted so far durable and searchable.
    fn commit(&self) -> Result<()>;

    /// Run a query string and return up to `limit` identifiers in the
    /// engine's hit order.
    fn search(&self, query: &str, limit: usize) -> Result<Vec<String>>;

    /// Number of live documents as of the last commit.
    fn doc_count(&self) -> Result<u64>;
}
