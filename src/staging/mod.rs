//! Staged filesystem creation with rollback.
//!
//! Both creators share the same transactional discipline: every successful
//! mutation is appended to a [`CreationLedger`], and `rollback()` undoes the
//! ledger in strict reverse order, best-effort - every entry is attempted,
//! failures are collected and reported in aggregate rather than aborting on
//! the first.

pub mod dirs;
pub mod files;

pub use dirs::DirectoryCreator;
pub use files::FileCreator;

use crate::paths::ResolvedPath;

/// Append-only ordered record of the resources created in the current run.
///
/// Owned by exactly one creator; cleared destructively on rollback or on
/// successful completion.
#[derive(Debug, Default)]
pub struct CreationLedger {
    entries: Vec<ResolvedPath>,
}

impl CreationLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful creation.
    pub fn record(&mut self, path: ResolvedPath) {
        self.entries.push(path);
    }

    /// Entries in creation order.
    pub fn entries(&self) -> &[ResolvedPath] {
        &self.entries
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Destructively take all entries, leaving the ledger empty.
    pub fn drain(&mut self) -> Vec<ResolvedPath> {
        std::mem::take(&mut self.entries)
    }
}

/// Aggregate result of a best-effort rollback pass.
///
/// `failures` holds one message per entry that could not be removed; rollback
/// attempts every entry regardless.
#[derive(Debug, Default)]
pub struct RollbackReport {
    /// Entries attempted (always the full ledger length).
    pub attempted: usize,
    /// Entries actually removed.
    pub removed: usize,
    /// Entries skipped (already gone, or directories no longer empty).
    pub skipped: usize,
    /// Removal failures, one message per entry.
    pub failures: Vec<String>,
}

impl RollbackReport {
    /// True when every attempted entry was removed or legitimately skipped.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
