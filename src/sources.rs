use globset::{GlobBuilder, GlobMatcher};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::error::ManifestError;

/// Expands source file patterns against a package directory
#[derive(Debug, Clone)]
pub struct SourceMatcher {
    /// Directory the patterns are relative to
    base_dir: PathBuf,
    /// Descend into symlinked directories; symlinked files always match
    follow_symlinks: bool,
}

impl SourceMatcher {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            follow_symlinks: false,
        }
    }

    /// Set whether to descend into symlinked directories
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Files matching `pattern`, as paths relative to the base directory, sorted.
    ///
    /// `*` and `?` never cross a `/`, so `*.c` only matches files directly in the
    /// base directory while `src/*.c` and `**/*.c` reach into subdirectories. A
    /// leading `./` is ignored.
    pub fn expand(&self, pattern: &str) -> Result<Vec<PathBuf>, ManifestError> {
        let normalized = normalize(pattern)?;
        let matcher = compile(pattern, &normalized)?;
        let mut state = Walk {
            max_depth: pattern_depth(&normalized),
            matcher: &matcher,
            visited: HashSet::new(),
            files: Vec::new(),
        };

        self.walk(Path::new(""), 0, &mut state);
        let mut files = state.files;
        files.sort();

        if files.is_empty() {
            return Err(ManifestError::NoMatchingSources {
                pattern: pattern.to_string(),
                base_dir: self.base_dir.clone(),
            });
        }
        debug!(pattern, matches = files.len(), "expanded source pattern");
        Ok(files)
    }

    fn walk(&self, relative: &Path, depth: usize, state: &mut Walk<'_>) {
        let dir = self.base_dir.join(relative);
        // Symlinked directories may form cycles
        if let Ok(canonical) = dir.canonicalize()
            && !state.visited.insert(canonical)
        {
            return;
        }
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(dir = %dir.display(), error = %err, "skipping unreadable directory");
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let entry_relative = relative.join(entry.file_name());

            if path.is_file() {
                if state.matcher.is_match(&entry_relative) {
                    state.files.push(entry_relative);
                }
            } else if path.is_dir() && state.max_depth.is_none_or(|max| depth < max) {
                if path.is_symlink() && !self.follow_symlinks {
                    debug!(dir = %path.display(), "not following symlinked directory");
                    continue;
                }
                self.walk(&entry_relative, depth + 1, state);
            }
        }
    }
}

struct Walk<'m> {
    max_depth: Option<usize>,
    matcher: &'m GlobMatcher,
    visited: HashSet<PathBuf>,
    files: Vec<PathBuf>,
}

fn invalid_pattern(pattern: &str, message: impl Into<String>) -> ManifestError {
    ManifestError::InvalidPattern {
        pattern: pattern.to_string(),
        message: message.into(),
    }
}

/// Drop `.` components so `./src/*.c` and `src/*.c` match the same files
fn normalize(pattern: &str) -> Result<String, ManifestError> {
    let mut parts = Vec::new();
    for component in Path::new(pattern).components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => parts.push(part.to_string_lossy()),
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(invalid_pattern(
                    pattern,
                    "pattern must stay inside the package directory",
                ));
            }
        }
    }
    if parts.is_empty() {
        return Err(invalid_pattern(pattern, "pattern names no file"));
    }
    Ok(parts.join("/"))
}

fn compile(pattern: &str, normalized: &str) -> Result<GlobMatcher, ManifestError> {
    GlobBuilder::new(normalized)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| invalid_pattern(pattern, e.to_string()))
}

/// Deepest directory level a pattern can match; `None` when it contains `**`
fn pattern_depth(pattern: &str) -> Option<usize> {
    if pattern.contains("**") {
        None
    } else {
        Some(pattern.matches('/').count())
    }
}
