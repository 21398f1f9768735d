//! Letter-partitioned search tree over dataset rows.
//!
//! Rows are bucketed by the uppercased first letter of the country name and
//! the buckets are kept in an unbalanced binary search tree. A lookup costs
//! one descent over at most a few dozen distinct letters plus a scan of the
//! rows sharing that letter, instead of a scan of the whole file.

use std::cmp::Ordering;

use crate::dataset::DatasetRow;
use crate::error::{AppError, Result};

#[derive(Debug)]
struct IndexNode {
    letter: char,
    rows: Vec<DatasetRow>,
    left: Option<Box<IndexNode>>,
    right: Option<Box<IndexNode>>,
}

impl IndexNode {
    fn new(letter: char, row: DatasetRow) -> Self {
        Self {
            letter,
            rows: vec![row],
            left: None,
            right: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct LetterIndex {
    root: Option<Box<IndexNode>>,
    // file order, for queries without a country
    all: Vec<DatasetRow>,
}

pub fn partition_key(name: &str) -> Option<char> {
    name.chars().next().and_then(|c| c.to_uppercase().next())
}

/// Token length that marks a query as an ISO alpha-3 code rather than a name.
pub fn is_country_code(token: &str) -> bool {
    token.chars().count() == 3
}

impl LetterIndex {
    pub fn build(rows: Vec<DatasetRow>) -> Self {
        let mut index = LetterIndex::default();
        for row in &rows {
            if let Some(letter) = partition_key(&row.country) {
                index.insert(letter, row.clone());
            }
        }
        index.all = rows;
        index
    }

    fn insert(&mut self, letter: char, row: DatasetRow) {
        insert_into(&mut self.root, letter, row);
    }

    pub fn is_available(&self) -> bool {
        self.root.is_some()
    }

    /// Rows filed under `letter`, in load order. Fails with
    /// `IndexUnavailable` when nothing was loaded.
    pub fn lookup(&self, letter: char) -> Result<&[DatasetRow]> {
        let mut current = self.root.as_deref().ok_or(AppError::IndexUnavailable)?;
        loop {
            let next = match letter.cmp(&current.letter) {
                Ordering::Less => current.left.as_deref(),
                Ordering::Greater => current.right.as_deref(),
                Ordering::Equal => return Ok(current.rows.as_slice()),
            };
            match next {
                Some(node) => current = node,
                None => return Ok(&[]),
            }
        }
    }

    /// Every loaded row in file order.
    pub fn all(&self) -> Result<&[DatasetRow]> {
        if !self.is_available() {
            return Err(AppError::IndexUnavailable);
        }
        Ok(self.all.as_slice())
    }

    /// Rows whose country name (or code, for three-letter tokens) equals `token`.
    ///
    /// Buckets are keyed by name, so a code whose first letter differs from
    /// its country's (DEU for Germany) misses its bucket; those fall back to
    /// a full scan.
    pub fn find(&self, token: &str) -> Result<Vec<DatasetRow>> {
        let token = token.trim();
        let Some(letter) = partition_key(token) else {
            return if self.is_available() { Ok(Vec::new()) } else { Err(AppError::IndexUnavailable) };
        };
        let matches = match_exact(self.lookup(letter)?, token);
        if matches.is_empty() && is_country_code(token) {
            return Ok(match_exact(&self.all, token));
        }
        Ok(matches)
    }
}

// Depth is bounded by the number of distinct letters.
fn insert_into(slot: &mut Option<Box<IndexNode>>, letter: char, row: DatasetRow) {
    match slot {
        None => *slot = Some(Box::new(IndexNode::new(letter, row))),
        Some(node) => match letter.cmp(&node.letter) {
            Ordering::Less => insert_into(&mut node.left, letter, row),
            Ordering::Greater => insert_into(&mut node.right, letter, row),
            Ordering::Equal => node.rows.push(row),
        },
    }
}

pub fn match_exact(candidates: &[DatasetRow], token: &str) -> Vec<DatasetRow> {
    let by_code = is_country_code(token);
    let token = token.to_lowercase();
    candidates
        .iter()
        .filter(|row| {
            let field = if by_code { &row.country_code } else { &row.country };
            field.to_lowercase() == token
        })
        .cloned()
        .collect()
}
