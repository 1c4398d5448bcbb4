use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::config::{default_config_path, default_index_path, Config};
use crate::error::{Result, TagrefError};
use crate::index::{
    read_index, resolve, write_index, Attrs, Entry, Index, Location, ResolveOptions, SEARCH_ATTR,
};
use crate::indexer::{build_index, display_path, element_at, parse_element, FileWatcher, WatchEvent};
use crate::linter::Linter;

#[derive(Parser)]
#[command(name = "tagref")]
#[command(about = "Cross-reference tags embedded in source comments")]
#[command(version)]
#[command(after_long_help = r#"
TAGS:
    // [# name #]                  a tag
    // [# ./name #]                visible only in this directory
    // [# .name #]                 visible only in this file
    // [# @who=zumi name k=v #]    with attributes
    // [# ?g na* #]                a search (glob); ?re for regexp

EXAMPLES:
    # Index the current directory
    tagref index

    # Keep the index fresh
    tagref index --watch

    # List every tag named "meow" carrying an "urgent" attribute
    tagref search meow urgent=

    # Resolve the tag under the cursor to its next occurrence
    tagref resolve --loc src/main.rs:12.8 --next --cyclic

    # Check tags against lint rules
    tagref lint
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the config file
    #[arg(long, global = true, default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Path to the index file, "-" for stdin/stdout
    #[arg(short = 'i', long = "index-path", global = true)]
    pub index_path: Option<PathBuf>,

    /// Log progress
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log everything
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan source trees and write the index
    #[command(alias = "i")]
    Index {
        /// Directories or files to scan
        #[arg(default_value = ".")]
        roots: Vec<PathBuf>,

        /// Rebuild the index whenever files change
        #[arg(short, long)]
        watch: bool,

        /// With --watch, also rebuild every SECS seconds (0 disables)
        #[arg(long, value_name = "SECS", default_value = "30")]
        poll_interval: u64,
    },

    /// Search the index for tag and attribute patterns
    #[command(alias = "s")]
    Search {
        /// Match patterns as globs
        #[arg(short = 'g', long, conflicts_with = "regexp")]
        glob: bool,

        /// Match patterns as regular expressions
        #[arg(short = 'e', long)]
        regexp: bool,

        /// Tag name pattern and key=value attribute patterns
        args: Vec<String>,

        /// Output format: text or json
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Resolve the tag at a position, for editor integrations
    #[command(alias = "r")]
    Resolve {
        /// Position as path:line.column
        #[arg(short, long)]
        loc: String,

        /// Tag text, instead of reading it from the file
        #[arg(short, long)]
        content: Option<String>,

        /// Only the occurrence after this one
        #[arg(long)]
        next: bool,

        /// Only the occurrence before this one
        #[arg(long)]
        prev: bool,

        /// Wrap around at either end with --next/--prev
        #[arg(long)]
        cyclic: bool,

        /// Output format: text or json
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Check tags against the configured lint rules
    #[command(alias = "l")]
    Lint,
}

fn header_comment() -> String {
    format!("tagref {}", env!("CARGO_PKG_VERSION"))
}

/// Index to query: the explicit path if given, else the default index file,
/// else an ad hoc scan of the current directory.
pub fn load_index(config: &Config, index_path: Option<&Path>) -> Result<Index> {
    if let Some(path) = index_path {
        return read_index(path);
    }

    if !config.ignore_index {
        let path = default_index_path();
        match read_index(&path) {
            Ok(index) => {
                tracing::info!(path = %path.display(), entries = index.len(), "index read");
                return Ok(index);
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(path = %path.display(), "index file does not exist, scanning");
            }
            Err(e) => return Err(e),
        }
    }

    build_index(&["."], &config.scanner)
}

fn print_entries(entries: &[Entry], format: &str) -> Result<()> {
    if format == "json" {
        let output = serde_json::to_string_pretty(entries)
            .map_err(|e| TagrefError::Usage(format!("json: {}", e)))?;
        println!("{}", output);
    } else {
        for entry in entries {
            println!("{}", entry);
        }
    }

    Ok(())
}

pub fn index_directory(
    config: &Config,
    index_path: Option<&Path>,
    roots: &[PathBuf],
    watch: bool,
    poll_interval: u64,
) -> Result<()> {
    let out = index_path.map(Path::to_path_buf).unwrap_or_else(default_index_path);

    let rebuild = || -> Result<()> {
        let index = build_index(roots, &config.scanner)?;
        write_index(&out, &index, &header_comment())?;
        eprintln!("Indexed {} tags", index.len());
        Ok(())
    };

    rebuild()?;

    if !watch {
        return Ok(());
    }

    let exclude = if out.as_os_str() == "-" {
        Vec::new()
    } else {
        vec![out.clone()]
    };

    let watcher = FileWatcher::new(roots, &config.scanner.ignore, &exclude)?;
    let interval = (poll_interval > 0).then(|| Duration::from_secs(poll_interval));

    eprintln!("Watching for changes...");

    loop {
        match watcher.wait(interval)? {
            WatchEvent::Changed(paths) => {
                tracing::info!(first = %paths[0].display(), files = paths.len(), "changed");
            }
            WatchEvent::Elapsed => tracing::debug!("poll interval elapsed"),
        }

        // A broken tag mid-edit should not end the watch.
        if let Err(e) = rebuild() {
            tracing::error!("rebuild failed: {}", e);
        }
    }
}

/// Builds the search entry for `search` arguments: one bare name pattern and
/// any number of `key=value` attribute patterns.
pub fn search_entry(glob: bool, regexp: bool, args: &[String]) -> Result<Entry> {
    if glob && regexp {
        return Err(TagrefError::Usage(
            "--glob and --regexp are mutually exclusive".to_string(),
        ));
    }

    let mut attrs = Attrs::new();
    if glob {
        attrs.insert(SEARCH_ATTR.to_string(), "glob".to_string());
    } else if regexp {
        attrs.insert(SEARCH_ATTR.to_string(), "regexp".to_string());
    }

    let mut name: Option<&str> = None;

    for arg in args {
        match arg.split_once('=') {
            Some((k, v)) => {
                if attrs.contains_key(k) {
                    return Err(TagrefError::Usage(format!("attribute {:?} already specified", k)));
                }
                attrs.insert(k.to_string(), v.to_string());
            }
            None if name.is_some() => {
                return Err(TagrefError::Usage("name already specified".to_string()));
            }
            None => name = Some(arg.as_str()),
        }
    }

    attrs
        .entry(SEARCH_ATTR.to_string())
        .or_insert_with(|| "exact".to_string());

    Ok(Entry {
        name: name.unwrap_or_default().to_string(),
        attrs,
        loc: Location::default(),
    })
}

pub fn search(
    config: &Config,
    index_path: Option<&Path>,
    glob: bool,
    regexp: bool,
    args: &[String],
    format: &str,
) -> Result<()> {
    let what = search_entry(glob, regexp, args)?;
    tracing::info!(entry = %what, "searching");

    let matcher = what.matcher()?;
    let index = load_index(config, index_path)?;

    let found: Vec<Entry> = index.iter().filter(|e| matcher.matches(e)).cloned().collect();
    print_entries(&found, format)
}

/// Finds the tag at `loc` (or parses `content` as if it were there) and
/// resolves it against the index.
pub fn resolve_at(
    config: &Config,
    index_path: Option<&Path>,
    loc: &str,
    content: Option<&str>,
    opts: ResolveOptions,
    format: &str,
) -> Result<Vec<Entry>> {
    opts.mode()?;

    let mut cursor = Location::parse(loc)?;
    cursor.path = display_path(Path::new(&cursor.path));

    let (text, at) = match content {
        Some(text) => (text.to_string(), cursor),
        None => {
            let el = element_at(&config.scanner.bracket, &cursor)?;
            tracing::info!(text = %el.text, loc = %el.loc, "located tag");
            (el.text, el.loc)
        }
    };

    let what = parse_element(&text, &at)?;
    tracing::info!(entry = %what, "parsed tag");

    let index = load_index(config, index_path)?;
    let resolution = resolve(&what, &index, opts)?;

    print_entries(&resolution.entries, format)?;

    Ok(resolution.entries)
}

/// Prints `<loc> <rule>` per violation. Returns false if any were found.
pub fn lint(config: &Config, index_path: Option<&Path>) -> Result<bool> {
    let linter = Linter::new(&config.linter)?;
    let index = load_index(config, index_path)?;

    let mut pass = true;

    for entry in &index {
        tracing::debug!(loc = %entry.loc, "checking");

        let fails = linter.lint(entry)?;
        if fails.is_empty() {
            continue;
        }

        pass = false;
        for i in fails {
            let name = linter.rule(i).map(|r| r.display_name(i)).unwrap_or_default();
            println!("{} {}", entry.loc, name);
        }
    }

    Ok(pass)
}
