//! FASTA-ish sequence dictionaries
//!
//! A dictionary is an ordered list of named sequences with an optional
//! name index. The file format is line-oriented: a non-empty name line
//! followed by a non-empty sequence line, repeated; leading and trailing
//! non-alphanumerics (`>`, whitespace, ...) are trimmed from both.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rustc_hash::FxHashMap;

use crate::error::{Result, RiftyError};

/// A named sequence.
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub sequence: Vec<u8>,
}

/// Ordered list of named sequences with an optional name index.
#[derive(Debug, Default)]
pub struct Dict {
    entries: Vec<Entry>,
    index: FxHashMap<String, usize>,
}

fn trim_label(s: &str) -> &str {
    s.trim_matches(|c: char| !c.is_ascii_alphanumeric())
}

impl Dict {
    /// Load a dictionary from a FASTA-ish file.
    pub fn load(path: impl AsRef<Path>) -> Result<Dict> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| RiftyError::Io(format!("{}: {}", path.display(), e)))?;

        let mut dict = Dict::default();
        let mut name: Option<String> = None;

        for line in BufReader::new(file).lines() {
            let line = line?;
            let trimmed = trim_label(&line);
            if trimmed.is_empty() {
                continue;
            }

            match name.take() {
                None => name = Some(trimmed.to_string()),
                Some(n) => dict.entries.push(Entry {
                    name: n,
                    sequence: trimmed.as_bytes().to_vec(),
                }),
            }
        }

        if let Some(n) = name {
            return Err(RiftyError::Fasta(format!(
                "{}: entry \"{}\" has no sequence line",
                path.display(),
                n
            )));
        }

        Ok(dict)
    }

    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    /// Sort entries by name. Invalidates any built index.
    pub fn sort_by_name(&mut self) {
        self.entries.sort_by(|u, v| u.name.cmp(&v.name));
        self.index.clear();
    }

    /// Build the name -> entry index for O(1) lookups.
    pub fn build_index(&mut self) {
        self.index.clear();
        for (i, e) in self.entries.iter().enumerate() {
            self.index.insert(e.name.clone(), i);
        }
    }

    /// Find an entry by name; falls back to a linear scan when the index
    /// has not been built.
    pub fn find(&self, name: &str) -> Option<&Entry> {
        if self.index.is_empty() {
            self.entries.iter().find(|e| e.name == name)
        } else {
            self.index.get(name).map(|&i| &self.entries[i])
        }
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Entry> {
        if self.index.is_empty() {
            self.entries.iter_mut().find(|e| e.name == name)
        } else {
            let i = *self.index.get(name)?;
            Some(&mut self.entries[i])
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }
}

impl std::ops::Index<usize> for Dict {
    type Output = Entry;

    fn index(&self, i: usize) -> &Entry {
        &self.entries[i]
    }
}
