use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::WalkBuilder;

use crate::error::{Result, TagrefError};
use crate::matcher::{GlobPattern, SEPARATOR};

const DEFAULT_IGNORES: &[&str] = &[".git"];

/// A file to scan, with the path tags will be attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub display: String,
}

/// Renders a walked path the way it appears in locations: `/`-separated and
/// without a leading `./`.
pub fn display_path(path: &Path) -> String {
    let mut s = path.to_string_lossy().into_owned();

    if std::path::MAIN_SEPARATOR != SEPARATOR {
        s = s.replace(std::path::MAIN_SEPARATOR, &SEPARATOR.to_string());
    }

    while let Some(rest) = s.strip_prefix("./") {
        s = rest.to_string();
    }

    s
}

#[derive(Debug)]
struct Ignores(Vec<GlobPattern>);

impl Ignores {
    fn is_ignored(&self, display: &str, is_dir: bool) -> bool {
        let candidate = if is_dir && !display.ends_with(SEPARATOR) {
            format!("{}{}", display, SEPARATOR)
        } else {
            display.to_string()
        };

        match self.0.iter().find(|p| p.is_match(&candidate)) {
            Some(p) => {
                tracing::trace!(path = %candidate, pattern = p.as_str(), "ignored");
                true
            }
            None => false,
        }
    }
}

pub struct FileWalker {
    ignores: Arc<Ignores>,
}

impl FileWalker {
    /// Creates a walker skipping paths that match any of the gitignore-style
    /// `ignore` globs. With no globs, `.git` is skipped.
    pub fn new<S: AsRef<str>>(ignore: &[S]) -> Result<Self> {
        let patterns = if ignore.is_empty() {
            DEFAULT_IGNORES
                .iter()
                .map(|p| GlobPattern::new(p))
                .collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            ignore
                .iter()
                .map(|p| GlobPattern::new(p.as_ref()))
                .collect::<std::result::Result<Vec<_>, _>>()?
        };

        Ok(Self {
            ignores: Arc::new(Ignores(patterns)),
        })
    }

    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        self.ignores.is_ignored(&display_path(path), is_dir)
    }

    /// Lists regular files under `root`, sorted by display path. Symlinks are
    /// not followed, hidden entries and gitignored paths are skipped.
    pub fn walk(&self, root: &Path) -> Result<Vec<SourceFile>> {
        let mut files = Vec::new();

        if !root.exists() {
            return Err(TagrefError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{}: no such file or directory", root.display()),
            )));
        }

        let ignores = Arc::clone(&self.ignores);

        let walker = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .ignore(true)
            .follow_links(false)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                !ignores.is_ignored(&display_path(entry.path()), is_dir)
            })
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("walk {}: {}", root.display(), e);
                    continue;
                }
            };

            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let path = entry.path().to_path_buf();
            let display = display_path(&path);

            files.push(SourceFile { path, display });
        }

        files.sort_by(|a, b| a.display.cmp(&b.display));

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn create_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    fn names(root: &Path, files: &[SourceFile]) -> Vec<String> {
        let prefix = display_path(root);
        files
            .iter()
            .map(|f| {
                f.display
                    .strip_prefix(&prefix)
                    .unwrap_or(&f.display)
                    .trim_start_matches('/')
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn test_display_path() {
        assert_eq!(display_path(Path::new("./a/b.rs")), "a/b.rs");
        assert_eq!(display_path(Path::new("a/b.rs")), "a/b.rs");
        assert_eq!(display_path(Path::new("./././x")), "x");
    }

    #[test]
    fn test_walk_recursive_and_sorted() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "root.txt", "");
        create_file(temp_dir.path(), "src/lib.rs", "");
        create_file(temp_dir.path(), "src/module/deep/file.go", "");
        create_file(temp_dir.path(), "README.md", "");

        let walker = FileWalker::new::<&str>(&[]).unwrap();
        let files = walker.walk(temp_dir.path()).unwrap();

        assert_eq!(
            names(temp_dir.path(), &files),
            vec!["README.md", "root.txt", "src/lib.rs", "src/module/deep/file.go"]
        );
    }

    #[test]
    fn test_walk_hidden_files_ignored() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "visible.rs", "");
        create_file(temp_dir.path(), ".hidden.rs", "");
        create_file(temp_dir.path(), ".tagref/index", "");

        let walker = FileWalker::new::<&str>(&[]).unwrap();
        let files = walker.walk(temp_dir.path()).unwrap();

        assert_eq!(names(temp_dir.path(), &files), vec!["visible.rs"]);
    }

    #[test]
    fn test_walk_config_ignores() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "src/main.rs", "");
        create_file(temp_dir.path(), "vendor/dep/lib.rs", "");
        create_file(temp_dir.path(), "src/gen.pb.rs", "");

        let walker = FileWalker::new(&["vendor/", "*.pb.rs"]).unwrap();
        let files = walker.walk(temp_dir.path()).unwrap();

        assert_eq!(names(temp_dir.path(), &files), vec!["src/main.rs"]);
    }

    #[test]
    fn test_walk_respects_gitignore() {
        let temp_dir = TempDir::new().unwrap();

        std::process::Command::new("git")
            .args(["init"])
            .current_dir(temp_dir.path())
            .output()
            .ok();

        create_file(temp_dir.path(), ".gitignore", "target/\n");
        create_file(temp_dir.path(), "src/main.rs", "");
        create_file(temp_dir.path(), "target/debug/build.rs", "");

        let walker = FileWalker::new::<&str>(&[]).unwrap();
        let files = walker.walk(temp_dir.path()).unwrap();

        let found = names(temp_dir.path(), &files);
        assert!(found.contains(&"src/main.rs".to_string()));
    }

    #[test]
    fn test_walk_empty_directory() {
        let temp_dir = TempDir::new().unwrap();

        let walker = FileWalker::new::<&str>(&[]).unwrap();
        assert!(walker.walk(temp_dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_walk_missing_root() {
        let temp_dir = TempDir::new().unwrap();

        let walker = FileWalker::new::<&str>(&[]).unwrap();
        let err = walker.walk(&temp_dir.path().join("nope")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_walk_single_file_root() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "one.txt", "");

        let walker = FileWalker::new::<&str>(&[]).unwrap();
        let files = walker.walk(&temp_dir.path().join("one.txt")).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_invalid_ignore_glob() {
        assert!(FileWalker::new(&["src/[ab"]).is_err());
    }

    #[test]
    fn test_is_ignored() {
        let walker = FileWalker::new(&["build/", "*.tmp"]).unwrap();
        assert!(walker.is_ignored(Path::new("./build"), true));
        assert!(!walker.is_ignored(Path::new("./build"), false));
        assert!(walker.is_ignored(Path::new("a/b.tmp"), false));
        assert!(!walker.is_ignored(Path::new("a/b.rs"), false));
    }
}
