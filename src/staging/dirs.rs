//! Staged directory creation.
//!
//! Walks a [`StructureTree`] depth-first and creates each directory node
//! under the target base, composing every path through the path resolver.
//! Each creation is appended to the ledger; a pre-existing directory is a
//! no-op (and not ledgered, so rollback never removes what this run did not
//! create); a pre-existing non-directory is a structural error.
//!
//! In dry-run mode nothing is mutated, but every name and path is still
//! validated, so a dry run surfaces the same errors a live run would.

use crate::error::{LatheError, Result};
use crate::paths::{self, ResolvedPath};
use crate::staging::{CreationLedger, RollbackReport};
use crate::structure::{StructureNode, StructureTree};
use std::fs;

/// Directory-side staged creator.
#[derive(Debug, Default)]
pub struct DirectoryCreator {
    ledger: CreationLedger,
}

impl DirectoryCreator {
    /// Create a new creator with an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// The creation ledger (creation order).
    pub fn ledger(&self) -> &CreationLedger {
        &self.ledger
    }

    /// Destructively take the ledger entries after a successful run.
    pub fn take_created(&mut self) -> Vec<ResolvedPath> {
        self.ledger.drain()
    }

    /// Walk the tree and create its directory nodes under `base`.
    ///
    /// File leaves are skipped (their names are still validated). In
    /// `dry_run` mode, validation runs but no directory is created.
    pub fn create_structure(
        &mut self,
        tree: &StructureTree,
        base: &ResolvedPath,
        dry_run: bool,
    ) -> Result<()> {
        let mut rel: Vec<String> = Vec::new();
        self.walk(tree, base, &mut rel, dry_run)
    }

    fn walk(
        &mut self,
        tree: &StructureTree,
        base: &ResolvedPath,
        rel: &mut Vec<String>,
        dry_run: bool,
    ) -> Result<()> {
        for (name, node) in tree.entries() {
            paths::validate_name(name)?;

            match node {
                StructureNode::Directory(sub) => {
                    rel.push(name.clone());
                    let segments: Vec<&str> = rel.iter().map(String::as_str).collect();
                    let path = paths::join(base, &segments)?;

                    if path.as_path().exists() {
                        if !path.as_path().is_dir() {
                            return Err(LatheError::StructuralFailure(format!(
                                "'{}' already exists and is not a directory",
                                path
                            )));
                        }
                        // Pre-existing directory: no-op, not ledgered.
                    } else if !dry_run {
                        fs::create_dir(path.as_path()).map_err(|e| {
                            LatheError::StructuralFailure(format!(
                                "failed to create directory '{}': {}",
                                path, e
                            ))
                        })?;
                        self.ledger.record(path.clone());
                    }

                    self.walk(sub, base, rel, dry_run)?;
                    rel.pop();
                }
                StructureNode::File { .. } => {
                    // File leaves are staged by the file creator.
                }
            }
        }
        Ok(())
    }

    /// Remove ledgered directories in strict reverse creation order.
    ///
    /// Removal precondition is "directory is empty": entries that are
    /// non-empty or already gone are skipped, not fatal. Every entry is
    /// attempted; failures are collected into the report.
    pub fn rollback(&mut self) -> RollbackReport {
        let entries = self.ledger.drain();
        let mut report = RollbackReport {
            attempted: entries.len(),
            ..Default::default()
        };

        for path in entries.iter().rev() {
            let p = path.as_path();
            if !p.exists() {
                report.skipped += 1;
                continue;
            }
            match fs::read_dir(p) {
                Ok(mut listing) => {
                    if listing.next().is_some() {
                        // Not empty: contents this run did not create.
                        report.skipped += 1;
                        continue;
                    }
                }
                Err(e) => {
                    report
                        .failures
                        .push(format!("failed to inspect '{}': {}", path, e));
                    continue;
                }
            }
            match fs::remove_dir(p) {
                Ok(()) => report.removed += 1,
                Err(e) => report
                    .failures
                    .push(format!("failed to remove '{}': {}", path, e)),
            }
        }

        report
    }
}
