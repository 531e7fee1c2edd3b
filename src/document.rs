use serde::Serialize;

use crate::fs::EntryKind;

/// Entry names that are never indexed or descended into.
pub const IGNORED_NAMES: [&str; 3] = [".Trashes", ".fseventsd", ".DS_Store"];

/// Prefix of AppleDouble resource-fork files, also ignored.
pub const IGNORED_PREFIX: &str = "._";

pub fn is_ignored(name: &str) -> bool {
    IGNORED_NAMES.contains(&name) || name.starts_with(IGNORED_PREFIX)
}

/// Replace every `_`, `-` and `.` in `name` with a space.
///
/// ```
/// use kbsearch::document::tokenize_name;
///
/// assert_eq!(tokenize_name("My-File_Name.txt"), "My File Name txt");
/// ```
pub fn tokenize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '_' | '-' | '.' => ' ',
            c => c,
        })
        .collect()
}

/// The record submitted to the index for one filesystem entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameDocument {
    pub name: String,
    pub tokenized_name: String,
    pub kind: EntryKind,
}

impl NameDocument {
    pub fn new(name: &str, kind: EntryKind) -> Self {
        Self {
            name: name.to_string(),
            tokenized_name: tokenize_name(name),
            kind,
        }
    }
}
