//! Template store and descriptor model.
//!
//! Templates live on disk under a templates root, one directory per template
//! id, with a `template.yaml` manifest plus the source files it references:
//!
//! ```text
//! templates/
//!   python-lib/
//!     template.yaml
//!     README.md.tpl
//!     src/
//!       main.py.tpl
//! ```
//!
//! The manifest declares a description, variables (name, required, default,
//! type tag), the structure mapping, raw-copy glob patterns, and optional
//! post-generation commands. Unknown fields are ignored for forward
//! compatibility.

pub mod render;

pub use render::{RenderError, render};

use crate::error::{LatheError, Result};
use crate::paths::{self, ResolvedPath};
use crate::structure::{StructureNode, StructureTree};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

/// Manifest filename inside each template directory.
pub const MANIFEST_FILE: &str = "template.yaml";

/// Suffix marking a target name as rendered-from-template; stripped on write.
pub const TEMPLATE_SUFFIX: &str = ".tpl";

/// Type tag for a declared variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VarType {
    /// Any string (default).
    #[default]
    String,
    /// `true` or `false`.
    Bool,
    /// A base-10 integer.
    Int,
}

impl VarType {
    /// Check whether a string value conforms to this type tag.
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            VarType::String => true,
            VarType::Bool => matches!(value, "true" | "false"),
            VarType::Int => value.parse::<i64>().is_ok(),
        }
    }
}

/// A variable declared by a template manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableSpec {
    /// Variable name as referenced in template sources.
    pub name: String,
    /// Whether generation fails when the caller does not supply it.
    #[serde(default)]
    pub required: bool,
    /// Default value applied when the caller does not supply one.
    #[serde(default)]
    pub default: Option<serde_yaml::Value>,
    /// Type tag checked against supplied values.
    #[serde(default, rename = "type")]
    pub var_type: VarType,
    /// Human-readable description shown by `lathe templates`.
    #[serde(default)]
    pub description: String,
}

impl VariableSpec {
    /// The declared default rendered as a string, if any.
    pub fn default_string(&self) -> Option<String> {
        self.default.as_ref().map(yaml_scalar_to_string)
    }
}

fn yaml_scalar_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .unwrap_or_default()
            .trim_end()
            .to_string(),
    }
}

/// On-disk manifest model. Unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateManifest {
    /// Human-readable description.
    pub description: String,
    /// Declared variables.
    pub variables: Vec<VariableSpec>,
    /// Structure mapping (see [`StructureTree::from_yaml`]).
    pub structure: serde_yaml::Value,
    /// Glob patterns (relative to the target) copied verbatim even when text.
    pub raw_copy: Vec<String>,
    /// Post-generation command lines, run in the generated tree.
    pub post_commands: Vec<String>,
}

impl Default for TemplateManifest {
    fn default() -> Self {
        Self {
            description: String::new(),
            variables: Vec::new(),
            structure: serde_yaml::Value::Mapping(serde_yaml::Mapping::new()),
            raw_copy: Vec::new(),
            post_commands: Vec::new(),
        }
    }
}

/// A loaded template: manifest contents plus the resolved template root.
#[derive(Debug, Clone)]
pub struct TemplateDescriptor {
    /// Template id (directory name under the templates root).
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Resolved template directory; source lookups are contained within it.
    pub root: ResolvedPath,
    /// The structure tree built from the manifest.
    pub tree: StructureTree,
    /// Declared variables.
    pub variables: Vec<VariableSpec>,
    /// Raw-copy glob patterns.
    pub raw_copy: Vec<String>,
    /// Post-generation command lines.
    pub post_commands: Vec<String>,
}

impl TemplateDescriptor {
    /// Resolve a template-relative source path, contained within the
    /// template root.
    pub fn source_path(&self, source: &str) -> Result<ResolvedPath> {
        paths::join(&self.root, &[source])
    }
}

/// Summary row for `lathe templates`.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateSummary {
    pub id: String,
    pub description: String,
}

/// Filesystem-backed template store rooted at a templates directory.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    root: ResolvedPath,
}

impl TemplateStore {
    /// Create a store over a resolved templates root.
    pub fn new(root: ResolvedPath) -> Self {
        Self { root }
    }

    /// The templates root.
    pub fn root(&self) -> &ResolvedPath {
        &self.root
    }

    /// Load a template by id.
    ///
    /// # Errors
    ///
    /// * `TemplateNotFound` - no such template directory or manifest
    /// * `TemplateSyntax` - manifest fails to parse or declares an invalid
    ///   structure mapping
    /// * `SecurityViolation` - the id attempts to escape the templates root
    pub fn load(&self, id: &str) -> Result<TemplateDescriptor> {
        let template_root = paths::join(&self.root, &[id])?;
        if !template_root.as_path().is_dir() {
            return Err(LatheError::TemplateNotFound(id.to_string()));
        }

        let manifest_path = paths::join(&template_root, &[MANIFEST_FILE])?;
        if !manifest_path.as_path().is_file() {
            return Err(LatheError::TemplateNotFound(format!(
                "{} (missing {})",
                id, MANIFEST_FILE
            )));
        }

        let raw = std::fs::read_to_string(manifest_path.as_path()).map_err(|e| {
            LatheError::TemplateSyntax(format!("failed to read manifest for '{}': {}", id, e))
        })?;
        let manifest: TemplateManifest = serde_yaml::from_str(&raw).map_err(|e| {
            LatheError::TemplateSyntax(format!("invalid manifest for '{}': {}", id, e))
        })?;

        let tree = StructureTree::from_yaml(&manifest.structure)?;

        Ok(TemplateDescriptor {
            id: id.to_string(),
            description: manifest.description,
            root: template_root,
            tree,
            variables: manifest.variables,
            raw_copy: manifest.raw_copy,
            post_commands: manifest.post_commands,
        })
    }

    /// List all templates under the root (directories carrying a manifest).
    pub fn list(&self) -> Result<Vec<TemplateSummary>> {
        let entries = std::fs::read_dir(self.root.as_path()).map_err(|e| {
            LatheError::UserError(format!(
                "failed to read templates root '{}': {}",
                self.root, e
            ))
        })?;

        let mut summaries = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                LatheError::UserError(format!("failed to read templates root entry: {}", e))
            })?;
            if !entry.path().is_dir() {
                continue;
            }
            let Some(id) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            if !entry.path().join(MANIFEST_FILE).is_file() {
                continue;
            }
            match self.load(&id) {
                Ok(descriptor) => summaries.push(TemplateSummary {
                    id,
                    description: descriptor.description,
                }),
                // A broken manifest still shows up in the listing.
                Err(_) => summaries.push(TemplateSummary {
                    id,
                    description: "(invalid manifest)".to_string(),
                }),
            }
        }

        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(summaries)
    }

    /// Validate a template definition without generating anything.
    ///
    /// Returns the list of problems found (empty means the template is
    /// sound). Problems are collected in aggregate rather than failing on
    /// the first, so template authors see everything at once.
    pub fn check(&self, id: &str) -> Result<Vec<String>> {
        let descriptor = self.load(id)?;
        let mut problems = Vec::new();

        if let Err(e) = descriptor.tree.validate() {
            problems.push(e.to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for var in &descriptor.variables {
            if var.name.trim().is_empty() {
                problems.push("variable with empty name".to_string());
                continue;
            }
            if !seen.insert(var.name.clone()) {
                problems.push(format!("duplicate variable '{}'", var.name));
            }
            if let Some(default) = var.default_string()
                && !var.var_type.accepts(&default)
            {
                problems.push(format!(
                    "variable '{}' default {:?} does not match its declared type",
                    var.name, default
                ));
            }
            if var.required && var.default.is_some() {
                problems.push(format!(
                    "variable '{}' is required but also declares a default",
                    var.name
                ));
            }
        }

        collect_source_problems(&descriptor, &descriptor.tree, &mut problems);

        if let Err(e) = build_globset(&descriptor.raw_copy) {
            problems.push(e.to_string());
        }

        for command in &descriptor.post_commands {
            if let Err(e) = shell_words::split(command) {
                problems.push(format!("post command {:?} fails to parse: {}", command, e));
            }
        }

        Ok(problems)
    }
}

/// Recursively verify that every referenced template source resolves inside
/// the template root and exists on disk.
fn collect_source_problems(
    descriptor: &TemplateDescriptor,
    tree: &StructureTree,
    problems: &mut Vec<String>,
) {
    for (name, node) in tree.entries() {
        match node {
            StructureNode::Directory(sub) => collect_source_problems(descriptor, sub, problems),
            StructureNode::File {
                template: Some(source),
            } => match descriptor.source_path(source) {
                Ok(path) => {
                    if !path.as_path().is_file() {
                        problems.push(format!(
                            "entry '{}' references missing source '{}'",
                            name, source
                        ));
                    }
                }
                Err(e) => problems.push(format!(
                    "entry '{}' references invalid source '{}': {}",
                    name, source, e
                )),
            },
            StructureNode::File { template: None } => {}
        }
    }
}

/// Build a glob matcher from manifest patterns.
pub(crate) fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            LatheError::TemplateSyntax(format!("invalid raw_copy pattern {:?}: {}", pattern, e))
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| {
        LatheError::TemplateSyntax(format!("failed to build raw_copy matcher: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::normalize;
    use tempfile::TempDir;

    fn store_with_template(manifest: &str) -> (TempDir, TemplateStore) {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("python-lib");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(MANIFEST_FILE), manifest).unwrap();
        let root = normalize(temp.path().to_str().unwrap()).unwrap();
        (temp, TemplateStore::new(root))
    }

    const BASIC_MANIFEST: &str = r#"
description: A small Python library
variables:
  - name: project_name
    required: true
  - name: license
    default: MIT
structure:
  src:
    "__init__.py": ~
  README.md: README.md.tpl
post_commands:
  - "git status"
"#;

    #[test]
    fn test_load_basic_template() {
        let (temp, store) = store_with_template(BASIC_MANIFEST);
        std::fs::write(
            temp.path().join("python-lib").join("README.md.tpl"),
            "# {project_name}\n",
        )
        .unwrap();

        let descriptor = store.load("python-lib").unwrap();
        assert_eq!(descriptor.id, "python-lib");
        assert_eq!(descriptor.description, "A small Python library");
        assert_eq!(descriptor.variables.len(), 2);
        assert_eq!(descriptor.tree.file_count(), 2);
        assert_eq!(descriptor.post_commands, vec!["git status".to_string()]);
    }

    #[test]
    fn test_load_unknown_template() {
        let (_temp, store) = store_with_template(BASIC_MANIFEST);
        let err = store.load("no-such-template").unwrap_err();
        assert!(matches!(err, LatheError::TemplateNotFound(_)));
    }

    #[test]
    fn test_load_missing_manifest() {
        let (temp, store) = store_with_template(BASIC_MANIFEST);
        std::fs::create_dir_all(temp.path().join("empty-template")).unwrap();
        let err = store.load("empty-template").unwrap_err();
        assert!(matches!(err, LatheError::TemplateNotFound(_)));
    }

    #[test]
    fn test_load_invalid_manifest_yaml() {
        let (_temp, store) = store_with_template("description: [unclosed");
        let err = store.load("python-lib").unwrap_err();
        assert!(matches!(err, LatheError::TemplateSyntax(_)));
    }

    #[test]
    fn test_load_rejects_traversal_id() {
        let (_temp, store) = store_with_template(BASIC_MANIFEST);
        let err = store.load("../outside").unwrap_err();
        assert!(matches!(err, LatheError::SecurityViolation(_)));
    }

    #[test]
    fn test_manifest_unknown_fields_ignored() {
        let manifest = "description: ok\nfuture_field: whatever\n";
        let (_temp, store) = store_with_template(manifest);
        let descriptor = store.load("python-lib").unwrap();
        assert_eq!(descriptor.description, "ok");
        assert!(descriptor.tree.is_empty());
    }

    #[test]
    fn test_source_path_contained() {
        let (_temp, store) = store_with_template(BASIC_MANIFEST);
        let descriptor = store.load("python-lib").unwrap();

        let ok = descriptor.source_path("README.md.tpl").unwrap();
        assert!(ok.as_path().starts_with(descriptor.root.as_path()));

        let err = descriptor.source_path("../../etc/passwd").unwrap_err();
        assert!(matches!(err, LatheError::SecurityViolation(_)));
    }

    #[test]
    fn test_list_templates() {
        let (temp, store) = store_with_template(BASIC_MANIFEST);
        let second = temp.path().join("another");
        std::fs::create_dir_all(&second).unwrap();
        std::fs::write(second.join(MANIFEST_FILE), "description: Second\n").unwrap();
        // A directory without a manifest is not a template.
        std::fs::create_dir_all(temp.path().join("not-a-template")).unwrap();

        let summaries = store.list().unwrap();
        let ids: Vec<&str> = summaries.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["another", "python-lib"]);
    }

    #[test]
    fn test_check_reports_missing_source() {
        let (_temp, store) = store_with_template(BASIC_MANIFEST);
        // README.md.tpl referenced by the manifest was never written.
        let problems = store.check("python-lib").unwrap();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("README.md.tpl"));
    }

    #[test]
    fn test_check_clean_template() {
        let (temp, store) = store_with_template(BASIC_MANIFEST);
        std::fs::write(
            temp.path().join("python-lib").join("README.md.tpl"),
            "# {project_name}\n",
        )
        .unwrap();
        let problems = store.check("python-lib").unwrap();
        assert!(problems.is_empty(), "unexpected problems: {:?}", problems);
    }

    #[test]
    fn test_check_reports_variable_problems() {
        let manifest = r#"
variables:
  - name: a
    required: true
    default: x
  - name: a
  - name: flag
    type: bool
    default: nope
"#;
        let (_temp, store) = store_with_template(manifest);
        let problems = store.check("python-lib").unwrap();
        assert!(problems.iter().any(|p| p.contains("required but also")));
        assert!(problems.iter().any(|p| p.contains("duplicate variable")));
        assert!(problems.iter().any(|p| p.contains("does not match")));
    }

    #[test]
    fn test_check_reports_bad_glob_and_command() {
        let manifest = r#"
raw_copy:
  - "assets/[bad"
post_commands:
  - "echo 'unterminated"
"#;
        let (_temp, store) = store_with_template(manifest);
        let problems = store.check("python-lib").unwrap();
        assert!(problems.iter().any(|p| p.contains("raw_copy")));
        assert!(problems.iter().any(|p| p.contains("fails to parse")));
    }

    #[test]
    fn test_var_type_accepts() {
        assert!(VarType::String.accepts("anything"));
        assert!(VarType::Bool.accepts("true"));
        assert!(VarType::Bool.accepts("false"));
        assert!(!VarType::Bool.accepts("yes"));
        assert!(VarType::Int.accepts("42"));
        assert!(VarType::Int.accepts("-7"));
        assert!(!VarType::Int.accepts("4.2"));
    }

    #[test]
    fn test_default_string_conversions() {
        let spec: VariableSpec = serde_yaml::from_str("name: n\ndefault: 42\n").unwrap();
        assert_eq!(spec.default_string(), Some("42".to_string()));

        let spec: VariableSpec = serde_yaml::from_str("name: n\ndefault: true\n").unwrap();
        assert_eq!(spec.default_string(), Some("true".to_string()));

        let spec: VariableSpec = serde_yaml::from_str("name: n\ndefault: text\n").unwrap();
        assert_eq!(spec.default_string(), Some("text".to_string()));

        let spec: VariableSpec = serde_yaml::from_str("name: n\n").unwrap();
        assert_eq!(spec.default_string(), None);
    }
}
