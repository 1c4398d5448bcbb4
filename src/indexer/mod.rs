pub mod build;
pub mod parser;
pub mod scanner;
pub mod walker;
pub mod watcher;

pub use build::{build_index, scan_roots};
pub use parser::{parse_element, parse_elements};
pub use scanner::{element_at, scan_file, scan_reader, BracketConfig, RawElement};
pub use walker::{display_path, FileWalker, SourceFile};
pub use watcher::{FileWatcher, WatchEvent};
