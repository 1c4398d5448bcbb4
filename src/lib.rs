pub mod config;
pub mod error;
pub mod index;
pub mod indexer;
pub mod linter;
pub mod matcher;

pub use config::{Config, ScannerConfig};
pub use error::{Result, TagrefError};
pub use index::{
    read_index, resolve, write_index, Entry, EntryFilter, EntryView, Index, IndexReader, Location,
    Mode, Resolution, ResolveOptions,
};
pub use indexer::{
    build_index, element_at, parse_element, parse_elements, BracketConfig, FileWalker,
    FileWatcher, RawElement,
};
pub use linter::{Linter, LinterConfig, Rule, RuleExecutor, ShellExecutor};
pub use matcher::{Matcher, PatternKind};
