//! Structure tree model for template-defined project layouts.
//!
//! A [`StructureTree`] is built once per generation from the template
//! manifest's `structure:` mapping and discarded after staging. Directories
//! are nested trees; files are leaves that optionally reference a template
//! source (a path relative to the template root). Entry order is preserved
//! so generation is deterministic.

use crate::error::{LatheError, Result};
use crate::paths;
use serde_yaml::Value;

/// One entry in a structure tree: a nested directory or a file leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureNode {
    /// A directory containing further entries.
    Directory(StructureTree),
    /// A file leaf. `template` is the template-relative source to render;
    /// `None` means an empty file is created.
    File { template: Option<String> },
}

/// Ordered mapping from entry name to [`StructureNode`].
///
/// Invariants (enforced by [`StructureTree::validate`]): no empty names, and
/// every name passes [`paths::validate_name`] independently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructureTree {
    entries: Vec<(String, StructureNode)>,
}

impl StructureTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the entries in declaration order.
    pub fn entries(&self) -> &[(String, StructureNode)] {
        &self.entries
    }

    /// True when the tree has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a directory entry. Builder-style, used by tests and fixtures.
    pub fn insert_dir(&mut self, name: impl Into<String>, subtree: StructureTree) -> &mut Self {
        self.entries
            .push((name.into(), StructureNode::Directory(subtree)));
        self
    }

    /// Append a file entry. Builder-style, used by tests and fixtures.
    pub fn insert_file(
        &mut self,
        name: impl Into<String>,
        template: Option<String>,
    ) -> &mut Self {
        self.entries
            .push((name.into(), StructureNode::File { template }));
        self
    }

    /// Total number of file leaves, recursively.
    pub fn file_count(&self) -> usize {
        self.entries
            .iter()
            .map(|(_, node)| match node {
                StructureNode::Directory(sub) => sub.file_count(),
                StructureNode::File { .. } => 1,
            })
            .sum()
    }

    /// Total number of directory nodes, recursively.
    pub fn dir_count(&self) -> usize {
        self.entries
            .iter()
            .map(|(_, node)| match node {
                StructureNode::Directory(sub) => 1 + sub.dir_count(),
                StructureNode::File { .. } => 0,
            })
            .sum()
    }

    /// Validate every entry name in the tree, recursively.
    pub fn validate(&self) -> Result<()> {
        for (name, node) in &self.entries {
            paths::validate_name(name)?;
            if let StructureNode::Directory(sub) = node {
                sub.validate()?;
            }
        }
        Ok(())
    }

    /// Build a tree from the manifest's `structure:` YAML mapping.
    ///
    /// Mapping values: a nested mapping is a directory, `null` is an empty
    /// file, a string is a file rendered from that template-relative source.
    pub fn from_yaml(value: &Value) -> Result<Self> {
        let mapping = value.as_mapping().ok_or_else(|| {
            LatheError::TemplateSyntax("structure must be a mapping of names to entries".to_string())
        })?;

        let mut tree = StructureTree::new();
        for (key, val) in mapping {
            let name = key
                .as_str()
                .ok_or_else(|| {
                    LatheError::TemplateSyntax(format!(
                        "structure entry name must be a string, got {:?}",
                        key
                    ))
                })?
                .to_string();

            let node = match val {
                Value::Null => StructureNode::File { template: None },
                Value::String(source) => StructureNode::File {
                    template: Some(source.clone()),
                },
                Value::Mapping(_) => StructureNode::Directory(Self::from_yaml(val)?),
                other => {
                    return Err(LatheError::TemplateSyntax(format!(
                        "structure entry '{}' must be null, a template path, or a nested mapping, got {:?}",
                        name, other
                    )));
                }
            };
            tree.entries.push((name, node));
        }

        Ok(tree)
    }
}
