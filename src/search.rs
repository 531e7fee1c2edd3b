use serde::Serialize;

use crate::{engine::IndexEngine, error::Result};

/// Hits returned when no limit is given.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Run `query` and return the matching paths, best hit first.
///
/// The query string goes to the engine untouched, so field qualifiers,
/// boolean operators and phrases follow the engine's query grammar. A query
/// that matches nothing yields an empty list.
pub fn search<E: IndexEngine + ?Sized>(
    engine: &E,
    query: &str,
) -> Result<Vec<String>> {
    search_with_limit(engine, query, DEFAULT_SEARCH_LIMIT)
}

/// Like [`search`], with an explicit hit limit.
pub fn search_with_limit<E: IndexEngine + ?Sized>(
    engine: &E,
    query: &str,
    limit: usize,
) -> Result<Vec<String>> {
    engine.search(query, limit)
}

#[derive(Debug, Serialize)]
pub struct SearchResponse<'a> {
    pub query: &'a str,
    pub result_count: usize,
    pub results: &'a [String],
}

impl<'a> SearchResponse<'a> {
    pub fn new(query: &'a str, results: &'a [String]) -> Self {
        Self {
            query,
            result_count: results.len(),
            results,
        }
    }
}

/// Format results for human-readable terminal output.
pub fn format_human(paths: &[String]) {
    if paths.is_empty() {
        println!("No results found.");
        return;
    }

    for (i, path) in paths.iter().enumerate() {
        println!("{:>3}. {path}", i + 1);
    }
    println!("\n{} result(s)", paths.len());
}

/// Format results as JSON output.
pub fn format_json(paths: &[String], query: &str) -> Result<()> {
    let response = SearchResponse::new(query, paths);
    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

/// Format results as plain paths (one per line).
pub fn format_files(paths: &[String]) {
    for path in paths {
        println!("{path}");
    }
}
