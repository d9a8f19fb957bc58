//! Staged file rendering.
//!
//! Walks the file leaves of a [`StructureTree`], resolving the template-side
//! source and the target-side destination through the path resolver, and
//! writes each file atomically (temp file + rename in the target directory).
//! Every write is appended to the ledger for reverse-order rollback.
//!
//! Sources are classified before rendering: binary content (NUL byte in the
//! lookahead chunk, a known binary signature, or content that is not valid
//! UTF-8) is byte-copied verbatim, bypassing variable substitution, as are
//! targets matching the template's raw-copy globs. Text sources go through
//! the substitution engine. Target names carrying the `.tpl` marker suffix
//! have it stripped before writing.

use crate::error::{LatheError, Result};
use crate::paths::{self, ResolvedPath};
use crate::staging::{CreationLedger, RollbackReport};
use crate::structure::{StructureNode, StructureTree};
use crate::template::{self, TEMPLATE_SUFFIX};
use globset::GlobSet;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;

/// Bytes inspected when classifying a source as binary or text.
const SNIFF_LEN: usize = 8192;

/// Magic prefixes of formats that must never pass through substitution.
const BINARY_SIGNATURES: &[&[u8]] = &[
    b"\x7fELF",            // ELF
    b"\x89PNG\r\n\x1a\n",  // PNG
    b"\xff\xd8\xff",       // JPEG
    b"GIF87a",             // GIF
    b"GIF89a",             // GIF
    b"%PDF",               // PDF
    b"PK\x03\x04",         // ZIP (and formats built on it)
    b"\x1f\x8b",           // gzip
    b"BZh",                // bzip2
    b"\x00\x01\x00\x00",   // TrueType
];

/// File extensions that mark a generated file as a script.
const SCRIPT_EXTENSIONS: &[&str] = &["sh", "bash", "zsh", "ksh"];

/// Exact filenames conventionally executable regardless of extension.
const SCRIPT_FILENAMES: &[&str] = &["configure", "gradlew", "mvnw", "manage.py"];

/// File-side staged creator.
#[derive(Debug, Default)]
pub struct FileCreator {
    ledger: CreationLedger,
    warnings: Vec<String>,
}

impl FileCreator {
    /// Create a new creator with an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// The creation ledger (creation order).
    pub fn ledger(&self) -> &CreationLedger {
        &self.ledger
    }

    /// Non-fatal problems accumulated during rendering (permission bits).
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Destructively take the ledger entries after a successful run.
    pub fn take_created(&mut self) -> Vec<ResolvedPath> {
        self.ledger.drain()
    }

    /// Render every file leaf of `tree` under `target_base`.
    ///
    /// `template_root` is the base for template-side source lookups;
    /// `raw_copy` matches target-relative paths that are byte-copied even
    /// when text. In `dry_run` mode, paths are resolved, sources read and
    /// classified, and text sources rendered in memory, but nothing is
    /// written.
    pub fn render_structure(
        &mut self,
        tree: &StructureTree,
        template_root: &ResolvedPath,
        target_base: &ResolvedPath,
        vars: &HashMap<String, String>,
        raw_copy: &GlobSet,
        dry_run: bool,
    ) -> Result<()> {
        let mut rel: Vec<String> = Vec::new();
        self.walk(tree, template_root, target_base, vars, raw_copy, dry_run, &mut rel)
    }

    #[allow(clippy::too_many_arguments)]
    fn walk(
        &mut self,
        tree: &StructureTree,
        template_root: &ResolvedPath,
        target_base: &ResolvedPath,
        vars: &HashMap<String, String>,
        raw_copy: &GlobSet,
        dry_run: bool,
        rel: &mut Vec<String>,
    ) -> Result<()> {
        for (name, node) in tree.entries() {
            match node {
                StructureNode::Directory(sub) => {
                    rel.push(name.clone());
                    self.walk(sub, template_root, target_base, vars, raw_copy, dry_run, rel)?;
                    rel.pop();
                }
                StructureNode::File { template: source } => {
                    paths::validate_name(name)?;
                    let write_name = strip_template_suffix(name);
                    paths::validate_name(write_name)?;

                    let mut segments: Vec<&str> = rel.iter().map(String::as_str).collect();
                    segments.push(write_name);
                    let target = paths::join(target_base, &segments)?;
                    let rel_target = segments.join("/");

                    if target.as_path().exists() {
                        return Err(LatheError::StructuralFailure(format!(
                            "refusing to overwrite existing file '{}'",
                            target
                        )));
                    }

                    let content = self.prepare_content(
                        source.as_deref(),
                        template_root,
                        vars,
                        raw_copy,
                        &rel_target,
                    )?;

                    if !dry_run {
                        self.write_atomic(&target, &content)?;
                        self.apply_permissions(&target, write_name, &content);
                    }
                }
            }
        }
        Ok(())
    }

    /// Resolve and classify the source, returning the bytes to write.
    fn prepare_content(
        &mut self,
        source: Option<&str>,
        template_root: &ResolvedPath,
        vars: &HashMap<String, String>,
        raw_copy: &GlobSet,
        rel_target: &str,
    ) -> Result<Vec<u8>> {
        let Some(source) = source else {
            return Ok(Vec::new());
        };

        let source_path = paths::join(template_root, &[source])?;
        if !source_path.as_path().is_file() {
            return Err(LatheError::StructuralFailure(format!(
                "template source '{}' does not exist",
                source_path
            )));
        }

        let bytes = fs::read(source_path.as_path()).map_err(|e| {
            LatheError::StructuralFailure(format!(
                "failed to read template source '{}': {}",
                source_path, e
            ))
        })?;

        if raw_copy.is_match(rel_target) || looks_binary(&bytes) {
            return Ok(bytes);
        }

        // Classification guarantees valid UTF-8 here.
        let text = String::from_utf8(bytes).map_err(|e| {
            LatheError::StructuralFailure(format!(
                "template source '{}' is not valid UTF-8: {}",
                source_path, e
            ))
        })?;
        let rendered = template::render(&text, vars).map_err(|e| {
            LatheError::TemplateSyntax(format!("in '{}': {}", source_path, e))
        })?;
        Ok(rendered.into_bytes())
    }

    /// Write content to a temporary file in the target directory, sync it,
    /// and rename it into place. The target is known not to exist, so the
    /// rename never replaces anything.
    fn write_atomic(&mut self, target: &ResolvedPath, content: &[u8]) -> Result<()> {
        let path = target.as_path();
        let parent = path.parent().ok_or_else(|| {
            LatheError::StructuralFailure(format!("'{}' has no parent directory", target))
        })?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                LatheError::StructuralFailure(format!("'{}' has no filename", target))
            })?;
        let temp_path = parent.join(format!(".{}.tmp", filename));

        let mut file = File::create(&temp_path).map_err(|e| {
            LatheError::StructuralFailure(format!(
                "failed to create temporary file '{}': {}",
                temp_path.display(),
                e
            ))
        })?;
        if let Err(e) = file.write_all(content).and_then(|_| file.sync_all()) {
            let _ = fs::remove_file(&temp_path);
            return Err(LatheError::StructuralFailure(format!(
                "failed to write '{}': {}",
                target, e
            )));
        }
        drop(file);

        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            LatheError::StructuralFailure(format!("failed to place '{}': {}", target, e))
        })?;

        self.ledger.record(target.clone());
        Ok(())
    }

    /// Set the executable bit when the script heuristic matches. Failure is
    /// recorded as a warning, never fatal.
    fn apply_permissions(&mut self, target: &ResolvedPath, name: &str, content: &[u8]) {
        if !is_script(name, content) {
            return;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o755);
            if let Err(e) = fs::set_permissions(target.as_path(), perms) {
                self.warnings.push(format!(
                    "failed to set executable bit on '{}': {}",
                    target, e
                ));
            }
        }
        #[cfg(not(unix))]
        {
            let _ = target;
        }
    }

    /// Remove ledgered files in strict reverse creation order, best-effort.
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
            match fs::remove_file(p) {
                Ok(()) => report.removed += 1,
                Err(e) => report
                    .failures
                    .push(format!("failed to remove '{}': {}", path, e)),
            }
        }

        report
    }
}

/// Strip the template-marker suffix from a target name, if present.
fn strip_template_suffix(name: &str) -> &str {
    name.strip_suffix(TEMPLATE_SUFFIX).unwrap_or(name)
}

/// Classify content as binary: NUL byte in the lookahead chunk, a known
/// signature, or bytes that do not decode as UTF-8.
fn looks_binary(bytes: &[u8]) -> bool {
    let chunk = &bytes[..bytes.len().min(SNIFF_LEN)];
    if chunk.contains(&0) {
        return true;
    }
    if BINARY_SIGNATURES.iter().any(|sig| bytes.starts_with(sig)) {
        return true;
    }
    std::str::from_utf8(chunk).is_err()
}

/// Executable heuristic: shebang line, script extension, or a conventional
/// script filename.
fn is_script(name: &str, content: &[u8]) -> bool {
    if content.starts_with(b"#!") {
        return true;
    }
    if let Some(ext) = name.rsplit_once('.').map(|(_, e)| e)
        && SCRIPT_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext))
    {
        return true;
    }
    SCRIPT_FILENAMES.contains(&name)
}
