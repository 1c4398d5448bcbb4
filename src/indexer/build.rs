use std::path::Path;

use rayon::prelude::*;

use super::parser::parse_elements;
use super::scanner::{scan_file, RawElement};
use super::walker::FileWalker;
use crate::config::ScannerConfig;
use crate::error::Result;
use crate::index::Index;

/// Scans every file under `roots`, returning raw elements ordered by location.
pub fn scan_roots<P: AsRef<Path>>(roots: &[P], config: &ScannerConfig) -> Result<Vec<RawElement>> {
    let walker = FileWalker::new(&config.ignore)?;
    let bracket = config.bracket.clone().or_default();
    // Fail on a bad bracket before touching any file.
    bracket.regex()?;

    let mut files = Vec::new();
    for root in roots {
        files.extend(walker.walk(root.as_ref())?);
    }
    files.sort_by(|a, b| a.display.cmp(&b.display));
    files.dedup_by(|a, b| a.path == b.path);

    tracing::info!(files = files.len(), "scanning");

    let scanned: Vec<Vec<RawElement>> = files
        .par_iter()
        .map(|file| match scan_file(&bracket, &file.path, &file.display) {
            // Removed between walking and scanning.
            Err(e) if e.is_not_found() => {
                tracing::debug!(path = %file.display, "vanished");
                Ok(Vec::new())
            }
            other => other,
        })
        .collect::<Result<_>>()?;

    let mut elems: Vec<RawElement> = scanned.into_iter().flatten().collect();
    elems.sort_by(|a, b| a.loc.cmp(&b.loc));

    for el in &elems {
        tracing::debug!(loc = %el.loc, text = %el.text, "found");
    }

    Ok(elems)
}

/// Builds an index from every tag under `roots`.
pub fn build_index<P: AsRef<Path>>(roots: &[P], config: &ScannerConfig) -> Result<Index> {
    let elems = scan_roots(roots, config)?;
    let index = Index::new(parse_elements(&elems)?);

    tracing::info!(entries = index.len(), "index built");

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TagrefError;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "b.txt", "[# meow #]\n[# bark #]\n");
        write(dir.path(), "a/x.rs", "// [# ./meow who=zumi #]\n");
        write(dir.path(), "a/y.rs", "// [# %stop #] [# hidden #] [# %cont #]\n");
        dir
    }

    #[test]
    fn test_build_index() {
        let dir = tree();
        let index = build_index(&[dir.path()], &ScannerConfig::default()).unwrap();

        let names: Vec<_> = index.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["bark", "meow", "meow"]);

        let scoped = &index.entries()[1];
        assert!(scoped.loc.path.ends_with("a/x.rs"));
        assert!(scoped.scope().ends_with("a/"));
        assert_eq!(scoped.attr("who"), Some("zumi"));
    }

    #[test]
    fn test_scan_roots_orders_by_location() {
        let dir = tree();
        let elems = scan_roots(&[dir.path()], &ScannerConfig::default()).unwrap();

        let locs: Vec<_> = elems.iter().map(|e| e.loc.clone()).collect();
        let mut sorted = locs.clone();
        sorted.sort();
        assert_eq!(locs, sorted);
        assert_eq!(elems.len(), 3);
    }

    #[test]
    fn test_ignore_globs() {
        let dir = tree();
        let config = ScannerConfig {
            ignore: vec!["a/".to_string()],
            ..Default::default()
        };

        let index = build_index(&[dir.path()], &config).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_first_parse_error_wins() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "z.txt", "[# @x meow x #]\n");
        write(dir.path(), "a.txt", "[# ok #]\n[# me*ow #]\n");

        match build_index(&[dir.path()], &ScannerConfig::default()).unwrap_err() {
            TagrefError::Element { text, loc, .. } => {
                assert_eq!(text, "me*ow");
                assert!(loc.ends_with("a.txt:2.1-11"), "{}", loc);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_pragma_error_fails_build() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.txt", "[# %cont #]\n");

        assert!(matches!(
            build_index(&[dir.path()], &ScannerConfig::default()),
            Err(TagrefError::Scan { .. })
        ));
    }
}
