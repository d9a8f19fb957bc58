//! Path resolution and validation for lathe.
//!
//! Every path that reaches the filesystem is composed here. The staging
//! creators, the pipeline, and the external tool adapters never concatenate
//! path strings themselves; they call [`join`] with a validated base and
//! relative segments, and receive a [`ResolvedPath`] whose invariant is that
//! it is lexically and physically contained within that base.
//!
//! # Containment strategy
//!
//! [`join`] defends in two layers:
//!
//! 1. **Segment screening** - each segment is rejected if it carries a
//!    parent-directory component or any absolute form (leading separator,
//!    drive prefix, UNC prefix). Screening happens on a decoded form of the
//!    segment, so percent-encoded dots (`%2e%2e`) and confusable Unicode
//!    dots (fullwidth full stop, one/two dot leaders) cannot smuggle a
//!    traversal past the check. Nothing is ever silently stripped; a bad
//!    segment is an error.
//! 2. **Resolved-prefix containment** - after composing, the result is
//!    resolved (symlinks in the existing prefix included) and re-verified to
//!    be inside the resolved base by component-wise prefix comparison, not
//!    string comparison. This catches traversal hidden behind symlinks.

use crate::error::{LatheError, Result};
use std::path::{Component, Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Maximum length of a single filename, in bytes.
const MAX_NAME_LEN: usize = 255;

/// Characters that are invalid in a filename on at least one supported platform.
const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Device names reserved by Windows, matched case-insensitively, with or
/// without an extension.
const RESERVED_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// An absolute, normalized, platform-canonical path.
///
/// A `ResolvedPath` is only produced by this module: [`normalize`] for
/// caller-supplied roots, [`join`] for everything composed under a root, and
/// [`ensure_directory`] for directories known to exist. Holding one means the
/// path has passed traversal and containment validation against the base it
/// was resolved from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedPath(PathBuf);

impl ResolvedPath {
    /// Borrow the underlying path.
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Consume into the underlying `PathBuf`.
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    /// Owned copy of the underlying `PathBuf`.
    pub fn to_path_buf(&self) -> PathBuf {
        self.0.clone()
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl std::fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Normalize a raw, caller-supplied path into a [`ResolvedPath`].
///
/// Applies Unicode NFC normalization to the input before any filesystem
/// check, makes the path absolute (relative input is resolved against the
/// current working directory), resolves `.` and `..` components lexically,
/// and resolves symlinks in the existing prefix.
///
/// # Errors
///
/// * `PathInvalid` - empty input, or `..` components that would climb above
///   the filesystem root.
pub fn normalize(raw: &str) -> Result<ResolvedPath> {
    if raw.trim().is_empty() {
        return Err(LatheError::PathInvalid(
            "path must not be empty".to_string(),
        ));
    }

    let nfc: String = raw.nfc().collect();
    let path = PathBuf::from(&nfc);

    let absolute = if path.is_absolute() {
        path
    } else {
        let cwd = std::env::current_dir().map_err(|e| {
            LatheError::PathInvalid(format!("failed to resolve current directory: {}", e))
        })?;
        cwd.join(path)
    };

    let lexical = lexical_normalize(&absolute)?;
    Ok(ResolvedPath(resolve_existing_prefix(&lexical)))
}

/// Join relative segments onto a resolved base, validating containment.
///
/// Each segment may carry multiple components separated by `/` (the template
/// manifest convention); separators are normalized. Parent-directory
/// components and absolute forms are rejected with `SecurityViolation`,
/// never stripped. After composing, the result is resolved and re-verified
/// to be inside `base`.
///
/// # Errors
///
/// * `SecurityViolation` - a segment is absolute, contains `..` (in plain,
///   percent-encoded, or confusable-Unicode form), or the composed path
///   resolves outside `base`.
/// * `PathInvalid` - a segment is empty or contains a NUL byte.
pub fn join(base: &ResolvedPath, segments: &[&str]) -> Result<ResolvedPath> {
    let mut composed = base.to_path_buf();

    for segment in segments {
        if segment.is_empty() {
            return Err(LatheError::PathInvalid(
                "path segment must not be empty".to_string(),
            ));
        }
        if segment.contains('\0') {
            return Err(LatheError::PathInvalid(format!(
                "path segment {:?} contains a NUL byte",
                segment
            )));
        }

        let nfc: String = segment.nfc().collect();
        screen_segment(&nfc)?;

        for component in nfc.split(['/', '\\']) {
            if component.is_empty() || component == "." {
                continue;
            }
            composed.push(component);
        }
    }

    let lexical = lexical_normalize(&composed)?;
    if !is_contained(base.as_path(), &lexical) {
        return Err(LatheError::SecurityViolation(format!(
            "path '{}' escapes base '{}'",
            lexical.display(),
            base
        )));
    }

    // Second layer: containment on the resolved form, so a symlink inside
    // the base cannot redirect the composed path outside it.
    let resolved = resolve_existing_prefix(&lexical);
    let resolved_base = resolve_existing_prefix(base.as_path());
    if !is_contained(&resolved_base, &resolved) {
        return Err(LatheError::SecurityViolation(format!(
            "path '{}' resolves outside base '{}'",
            resolved.display(),
            resolved_base.display()
        )));
    }

    Ok(ResolvedPath(resolved))
}

/// Validate a single directory or file name.
///
/// # Errors
///
/// `PathInvalid` on: empty name, length over 255 bytes, platform-reserved
/// characters or control bytes, reserved device names (exact or with an
/// extension, case-insensitive), or leading/trailing whitespace or `.`.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LatheError::PathInvalid(
            "name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(LatheError::PathInvalid(format!(
            "name is {} bytes, maximum is {}",
            name.len(),
            MAX_NAME_LEN
        )));
    }
    if let Some(bad) = name.chars().find(|c| RESERVED_CHARS.contains(c)) {
        return Err(LatheError::PathInvalid(format!(
            "name {:?} contains reserved character {:?}",
            name, bad
        )));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(LatheError::PathInvalid(format!(
            "name {:?} contains a control character",
            name
        )));
    }
    if name.starts_with('.')
        || name.ends_with('.')
        || name.starts_with(char::is_whitespace)
        || name.ends_with(char::is_whitespace)
    {
        return Err(LatheError::PathInvalid(format!(
            "name {:?} has leading or trailing whitespace or dot",
            name
        )));
    }

    let stem = name.split('.').next().unwrap_or(name);
    if RESERVED_DEVICE_NAMES
        .iter()
        .any(|d| d.eq_ignore_ascii_case(stem))
    {
        return Err(LatheError::PathInvalid(format!(
            "name {:?} is a reserved device name",
            name
        )));
    }

    Ok(())
}

/// Create a directory if absent, idempotently.
///
/// A second call on the same path is a no-op. Fails with `PathInvalid` if
/// the path exists and is not a directory, or with `StructuralFailure` if
/// creation itself fails.
pub fn ensure_directory(path: &ResolvedPath) -> Result<ResolvedPath> {
    let p = path.as_path();
    if p.exists() {
        if !p.is_dir() {
            return Err(LatheError::PathInvalid(format!(
                "'{}' exists and is not a directory",
                path
            )));
        }
    } else {
        std::fs::create_dir_all(p).map_err(|e| {
            LatheError::StructuralFailure(format!("failed to create directory '{}': {}", path, e))
        })?;
    }
    Ok(ResolvedPath(resolve_existing_prefix(p)))
}

/// Reject a segment carrying a parent-directory component or any absolute
/// form, including encoded and confusable spellings.
fn screen_segment(segment: &str) -> Result<()> {
    let decoded = decode_suspicious(segment);

    // Absolute forms: leading separator, drive-letter prefix, UNC prefix.
    if decoded.starts_with('/') || decoded.starts_with('\\') {
        return Err(LatheError::SecurityViolation(format!(
            "segment {:?} is an absolute path",
            segment
        )));
    }
    let bytes = decoded.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && (bytes[0] as char).is_ascii_alphabetic() {
        return Err(LatheError::SecurityViolation(format!(
            "segment {:?} carries a drive-letter prefix",
            segment
        )));
    }

    for component in decoded.split(['/', '\\']) {
        if component == ".." {
            return Err(LatheError::SecurityViolation(format!(
                "segment {:?} contains a parent-directory component",
                segment
            )));
        }
    }

    Ok(())
}

/// Decode the encodings an attacker can hide a dot or separator behind:
/// percent-encoding and visually-confusable Unicode characters. The decoded
/// form is used for screening only; the original segment is what gets
/// composed.
fn decode_suspicious(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '%' => {
                let hi = chars.peek().copied();
                if let Some(hi) = hi
                    && hi.is_ascii_hexdigit()
                {
                    chars.next();
                    let lo = chars.peek().copied();
                    if let Some(lo) = lo
                        && lo.is_ascii_hexdigit()
                    {
                        chars.next();
                        let byte =
                            u8::from_str_radix(&format!("{}{}", hi, lo), 16).unwrap_or(b'%');
                        out.push(byte as char);
                        continue;
                    }
                    out.push('%');
                    out.push(hi);
                    continue;
                }
                out.push('%');
            }
            // Fullwidth full stop, one dot leader, halfwidth ideographic full stop.
            '\u{FF0E}' | '\u{2024}' | '\u{FF61}' | '\u{3002}' => out.push('.'),
            // Two dot leader expands to two dots.
            '\u{2025}' => out.push_str(".."),
            // Fullwidth solidus and reverse solidus.
            '\u{FF0F}' => out.push('/'),
            '\u{FF3C}' => out.push('\\'),
            _ => out.push(c),
        }
    }

    out
}

/// Resolve `.` and `..` components lexically without touching the filesystem.
///
/// Fails if `..` would climb above the root; that input has no resolution.
fn lexical_normalize(path: &Path) -> Result<PathBuf> {
    let mut out = PathBuf::new();
    let mut depth: usize = 0;

    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(LatheError::PathInvalid(format!(
                        "path '{}' climbs above the filesystem root",
                        path.display()
                    )));
                }
                out.pop();
                depth -= 1;
            }
            Component::Normal(name) => {
                out.push(name);
                depth += 1;
            }
        }
    }

    Ok(out)
}

/// Resolve symlinks in the longest existing prefix of `path`, reattaching
/// the non-existing remainder. Falls back to the lexical form when nothing
/// of the path exists yet.
fn resolve_existing_prefix(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut remainder: Vec<&std::ffi::OsStr> = Vec::new();

    loop {
        if existing.exists() {
            break;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                remainder.push(name);
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }

    let mut resolved = match existing.canonicalize() {
        Ok(p) => p,
        Err(_) => return path.to_path_buf(),
    };
    for name in remainder.iter().rev() {
        resolved.push(name);
    }
    resolved
}

/// Component-wise prefix containment: `candidate` is `base` itself or a
/// descendant of it. Deliberately not a string comparison, so `/a/bc` is not
/// "inside" `/a/b`.
fn is_contained(base: &Path, candidate: &Path) -> bool {
    candidate.starts_with(base)
}
