//! Shared test fixtures.
//!
//! Builds template stores and target roots on disk inside temp directories,
//! so tests exercise the same filesystem paths production does.

use crate::paths::normalize;
use crate::template::{MANIFEST_FILE, TemplateStore};
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, MutexGuard};
use tempfile::TempDir;

static CWD_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Scoped change of the process working directory.
///
/// Changing the working directory is global and not thread-safe; the guard
/// holds a lock so cwd-dependent tests cannot race even if a `#[serial]`
/// annotation is missed.
pub(crate) struct DirGuard {
    original: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl DirGuard {
    pub(crate) fn new(new_dir: &Path) -> Self {
        let lock = CWD_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(new_dir).unwrap();
        Self {
            original,
            _lock: lock,
        }
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.original);
    }
}

/// A templates root plus a separate target root, both temp-backed.
pub(crate) struct TemplateFixture {
    templates_dir: TempDir,
    target_dir: TempDir,
}

/// Manifest used by [`TemplateFixture::with_basic_template`]: one nested
/// directory, one empty file, one rendered file, one post command.
pub(crate) const BASIC_MANIFEST: &str = r#"
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
  - "git add {project_name}"
"#;

/// Manifest whose README source is never written: structural failure during
/// file rendering, after directories and earlier files already staged.
pub(crate) const BROKEN_MANIFEST: &str = r#"
description: References a source that does not exist
structure:
  src:
    "__init__.py": ~
  notes.txt: ~
  README.md: README.md.tpl
"#;

/// Manifest with a required variable that has no default.
pub(crate) const STRICT_MANIFEST: &str = r#"
description: Requires an author
variables:
  - name: author
    required: true
structure:
  AUTHORS.md: ~
"#;

impl TemplateFixture {
    /// Empty fixture: no templates yet.
    pub(crate) fn new() -> Self {
        Self {
            templates_dir: TempDir::new().unwrap(),
            target_dir: TempDir::new().unwrap(),
        }
    }

    /// Fixture with the `python-lib` template (see [`BASIC_MANIFEST`]).
    pub(crate) fn with_basic_template() -> Self {
        let fixture = Self::new();
        fixture.add_template("python-lib", BASIC_MANIFEST);
        fixture.add_source(
            "python-lib",
            "README.md.tpl",
            "# {project_name}\n\nLicense: {license}\n",
        );
        fixture
    }

    /// Fixture with the `broken` template (see [`BROKEN_MANIFEST`]).
    pub(crate) fn with_broken_template() -> Self {
        let fixture = Self::new();
        fixture.add_template("broken", BROKEN_MANIFEST);
        fixture
    }

    /// Write a template manifest under the templates root.
    pub(crate) fn add_template(&self, id: &str, manifest: &str) {
        let dir = self.templates_dir.path().join(id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(MANIFEST_FILE), manifest).unwrap();
    }

    /// Write a template source file for an existing template.
    pub(crate) fn add_source(&self, id: &str, rel: &str, content: &str) {
        let path = self.templates_dir.path().join(id).join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    /// A store over this fixture's templates root.
    pub(crate) fn store(&self) -> TemplateStore {
        TemplateStore::new(normalize(self.templates_dir.path().to_str().unwrap()).unwrap())
    }

    /// A target path (not yet created) under the target root.
    pub(crate) fn target(&self, name: &str) -> String {
        self.target_dir
            .path()
            .join(name)
            .to_string_lossy()
            .into_owned()
    }
}
