//! Integration tests for the scan -> index -> persist -> query pipeline.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use tagref::index::IndexReader;
use tagref::matcher::compile_glob;
use tagref::{
    build_index, element_at, parse_element, read_index, resolve, write_index, BracketConfig,
    Entry, EntryFilter, Index, Linter, LinterConfig, Location, ResolveOptions, Rule,
    ScannerConfig,
};

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A small project with a global tag, a directory-scoped tag and a search.
fn create_project() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");

    write(
        dir.path(),
        "server/handler.go",
        "// [# request-id who=api #]\nfunc h() {} // [# ./retry #]\n",
    );
    write(
        dir.path(),
        "server/client.go",
        "// [# ./retry #]\n// [# request-id #]\n",
    );
    write(
        dir.path(),
        "web/app.js",
        "// [# request-id who=web #]\n// [# ./retry #]\n// [# ?g request-* #]\n",
    );
    write(dir.path(), "README.md", "Tags look like [# name #].\n");

    dir
}

fn build(dir: &TempDir) -> Index {
    build_index(&[dir.path()], &ScannerConfig::default()).expect("Failed to build index")
}

fn path_of(dir: &TempDir, rel: &str) -> String {
    format!("{}/{}", dir.path().to_string_lossy(), rel)
}

// ============================================================================
// Index
// ============================================================================

mod index {
    use super::*;

    #[test]
    fn test_build_collects_every_tag() {
        let dir = create_project();
        let index = build(&dir);

        let names: Vec<_> = index.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "name",
                "request-*",
                "request-id",
                "request-id",
                "request-id",
                "retry",
                "retry",
                "retry"
            ]
        );
    }

    #[test]
    fn test_persisted_index_round_trips() {
        let dir = create_project();
        let index = build(&dir);
        let path = dir.path().join(".tagref/index");

        write_index(&path, &index, "test").unwrap();
        assert_eq!(read_index(&path).unwrap(), index);

        // Rebuilding does not pick up the index file itself.
        assert_eq!(build(&dir), index);
    }

    #[test]
    fn test_escaped_line_breaks_survive_persisting() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        write(
            dir.path(),
            "a.rs",
            "// [# meow x=\"a\\nb\" y=\"c\\rd\" #]\n// [# bark #]\n",
        );

        let index = build(&dir);
        let meow = index.iter().find(|e| e.name == "meow").unwrap();
        assert_eq!(meow.attr("x"), Some("a\nb"));
        assert_eq!(meow.attr("y"), Some("c\rd"));

        let path = dir.path().join(".tagref/index");
        write_index(&path, &index, "test").unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert_eq!(read_index(&path).unwrap(), index);
    }

    #[test]
    fn test_index_reader_streams_in_order() {
        let dir = create_project();
        let index = build(&dir);
        let path = dir.path().join("index");
        write_index(&path, &index, "").unwrap();

        let file = fs::File::open(&path).unwrap();
        let streamed: Vec<Entry> = IndexReader::new(std::io::BufReader::new(file))
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(streamed, index.into_entries());
    }

    #[test]
    fn test_filter_by_attribute_glob() {
        let dir = create_project();
        let index = build(&dir);

        let filter = EntryFilter::new(compile_glob, &["request-id"], &["who=*"]).unwrap();
        let found = index.filter(|e| filter.matches(e));

        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|e| e.attr("who").is_some()));
    }
}

// ============================================================================
// Resolve
// ============================================================================

mod resolving {
    use super::*;

    fn tag_at(dir: &TempDir, rel: &str, line: u32, column: u32) -> Entry {
        let cursor = Location::new(path_of(dir, rel), line, column, column + 1);
        let el = element_at(&BracketConfig::default(), &cursor).unwrap();
        parse_element(&el.text, &el.loc).unwrap()
    }

    #[test]
    fn test_global_tag_sees_every_instance() {
        let dir = create_project();
        let index = build(&dir);

        let what = tag_at(&dir, "server/client.go", 2, 6);
        let r = resolve(&what, &index, ResolveOptions::all()).unwrap();

        assert_eq!(r.entries.len(), 3);
    }

    #[test]
    fn test_scoped_tag_stays_in_directory() {
        let dir = create_project();
        let index = build(&dir);

        let what = tag_at(&dir, "server/client.go", 1, 5);
        assert_eq!(what.name, "retry");

        let r = resolve(&what, &index, ResolveOptions::all()).unwrap();
        let paths: Vec<_> = r.entries.iter().map(|e| e.loc.path.clone()).collect();

        assert_eq!(
            paths,
            vec![
                path_of(&dir, "server/client.go"),
                path_of(&dir, "server/handler.go")
            ]
        );
    }

    #[test]
    fn test_next_and_prev_walk_instances() {
        let dir = create_project();
        let index = build(&dir);

        let what = tag_at(&dir, "server/client.go", 2, 6);

        let next = resolve(&what, &index, ResolveOptions::next(false)).unwrap();
        assert_eq!(next.entries.len(), 1);
        assert_eq!(next.entries[0].loc.path, path_of(&dir, "server/handler.go"));

        let prev = resolve(&what, &index, ResolveOptions::prev(false)).unwrap();
        assert!(prev.entries.is_empty());

        let prev = resolve(&what, &index, ResolveOptions::prev(true)).unwrap();
        assert_eq!(prev.entries[0].loc.path, path_of(&dir, "web/app.js"));
    }

    #[test]
    fn test_search_tag_resolves_patterns() {
        let dir = create_project();
        let index = build(&dir);

        let what = tag_at(&dir, "web/app.js", 3, 5);
        assert_eq!(what.is_search(), Some("glob"));

        let r = resolve(&what, &index, ResolveOptions::next(true)).unwrap();
        assert_eq!(r.entries.len(), 3);
        assert!(r.entries.iter().all(|e| e.name == "request-id"));
        assert_eq!(r.warnings.len(), 1);
    }
}

// ============================================================================
// Lint
// ============================================================================

#[cfg(unix)]
mod lint {
    use super::*;

    #[test]
    fn test_rules_flag_violations() {
        let dir = create_project();
        let index = build(&dir);

        let config = LinterConfig {
            rules: vec![Rule {
                name: "needs-owner".to_string(),
                path_glob: Some("**/server/*.go".to_string()),
                path_regexp: None,
                shell: vec![
                    "sh".to_string(),
                    "-c".to_string(),
                    "test \"$TAGREF_NAME\" != request-id || test -n \"$TAGREF_ATTR_WHO\""
                        .to_string(),
                ],
            }],
        };

        let linter = Linter::new(&config).unwrap();

        let failing: Vec<_> = index
            .iter()
            .filter(|e| !linter.lint(*e).unwrap().is_empty())
            .map(|e| e.loc.path.clone())
            .collect();

        assert_eq!(failing, vec![path_of(&dir, "server/client.go")]);
    }
}
