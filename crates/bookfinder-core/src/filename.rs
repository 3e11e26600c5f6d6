//! Collision-free filenames for exported second-pass codes.
//!
//! The first time a name is seen it is returned verbatim. Repeats get a
//! `(n)` suffix inserted before the extension: `book.pdf`, `book(2).pdf`,
//! `book(3).pdf`, ...

use std::collections::HashMap;

/// Running table of issued names and the highest suffix handed out for each.
///
/// One table lives for the lifetime of a result set and is reset whenever the
/// result set is replaced. Calls are order-dependent, so a table must only be
/// driven from one place at a time.
#[derive(Debug, Clone, Default)]
pub struct FilenameCounterTable {
    counters: HashMap<String, u32>,
}

impl FilenameCounterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a name for `candidate` that has not been issued by this table yet.
    ///
    /// An empty candidate yields an empty string and leaves the table untouched.
    pub fn ensure_unique(&mut self, candidate: &str) -> String {
        if candidate.is_empty() {
            return String::new();
        }

        let Some(&seen) = self.counters.get(candidate) else {
            self.counters.insert(candidate.to_string(), 1);
            return candidate.to_string();
        };

        let (stem, extension) = split_extension(candidate);
        let mut counter = seen;
        let minted = loop {
            counter += 1;
            let name = format!("{stem}({counter}){extension}");
            if !self.counters.contains_key(&name) {
                break name;
            }
        };

        self.counters.insert(candidate.to_string(), counter);
        self.counters.insert(minted.clone(), 1);
        minted
    }

    /// Number of distinct names recorded so far.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    pub fn reset(&mut self) {
        self.counters.clear();
    }
}

/// Split `name` into `(stem, extension)` at the last `.`.
///
/// The dot must have at least one character before it and a non-empty,
/// dot-free suffix after it; otherwise the whole string is the stem.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => name.split_at(idx),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn first_occurrence_is_verbatim() {
        let mut table = FilenameCounterTable::new();
        assert_eq!(table.ensure_unique("book.pdf"), "book.pdf");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn repeats_get_suffix_before_extension() {
        let mut table = FilenameCounterTable::new();
        let names: Vec<String> = (0..4).map(|_| table.ensure_unique("book.pdf")).collect();
        assert_eq!(names, ["book.pdf", "book(2).pdf", "book(3).pdf", "book(4).pdf"]);
    }

    #[test]
    fn many_repeats_are_pairwise_distinct() {
        let mut table = FilenameCounterTable::new();
        let names: Vec<String> = (0..50).map(|_| table.ensure_unique("book.pdf")).collect();
        assert_eq!(names[0], "book.pdf");
        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn bare_stem_without_extension() {
        let mut table = FilenameCounterTable::new();
        assert_eq!(table.ensure_unique("README"), "README");
        assert_eq!(table.ensure_unique("README"), "README(2)");
        assert_eq!(table.ensure_unique("README"), "README(3)");
    }

    #[test]
    fn probing_skips_names_already_issued() {
        let mut table = FilenameCounterTable::new();
        // "a(2).txt" arrives as a literal candidate first
        assert_eq!(table.ensure_unique("a(2).txt"), "a(2).txt");
        assert_eq!(table.ensure_unique("a.txt"), "a.txt");
        assert_eq!(table.ensure_unique("a.txt"), "a(3).txt");
        // the minted name is itself registered
        assert_eq!(table.ensure_unique("a(3).txt"), "a(3)(2).txt");
    }

    #[test]
    fn empty_candidate_is_a_no_op() {
        let mut table = FilenameCounterTable::new();
        assert_eq!(table.ensure_unique(""), "");
        assert!(table.is_empty());
    }

    #[test]
    fn reset_forgets_issued_names() {
        let mut table = FilenameCounterTable::new();
        table.ensure_unique("x.epub");
        table.ensure_unique("x.epub");
        table.reset();
        assert_eq!(table.ensure_unique("x.epub"), "x.epub");
    }

    #[test]
    fn split_extension_edge_cases() {
        assert_eq!(split_extension("book.pdf"), ("book", ".pdf"));
        assert_eq!(split_extension("a.tar.gz"), ("a.tar", ".gz"));
        assert_eq!(split_extension("README"), ("README", ""));
        assert_eq!(split_extension("archive."), ("archive.", ""));
        assert_eq!(split_extension(".bashrc"), (".bashrc", ""));
    }

    #[test]
    fn dotfile_suffix_goes_at_end() {
        let mut table = FilenameCounterTable::new();
        table.ensure_unique(".bashrc");
        assert_eq!(table.ensure_unique(".bashrc"), ".bashrc(2)");
    }
}
