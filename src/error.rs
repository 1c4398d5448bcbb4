use thiserror::Error;

/// Errors raised while turning raw tag text into an [`Entry`](crate::index::Entry).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty element")]
    EmptyElement,

    #[error("attribute {key:?} already set to {value:?}")]
    DuplicateAttribute { key: String, value: String },

    #[error("invalid attribute name: {0:?}")]
    InvalidAttributeName(String),

    #[error("invalid name: {0:?}")]
    InvalidName(String),

    #[error("invalid quotes: {0}")]
    InvalidQuoting(String),

    #[error("invalid search type: {0:?}")]
    UnknownSearchType(String),
}

/// Errors raised while compiling patterns, before any matching happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("unknown pattern type: {0:?}")]
    UnknownPatternType(String),

    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Errors raised while reading a serialized index.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexFormatError {
    #[error("missing or incompatible index version marker - please reindex")]
    MissingVersionMarker,

    #[error("index line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no tag at {0}")]
    NoTagAtLocation(String),

    #[error("more than one tag at {0}")]
    AmbiguousLocation(String),

    #[error("--next and --prev are mutually exclusive")]
    ConflictingNavigationFlags,

    #[error("invalid search tag: {0}")]
    InvalidSearchTag(#[from] MatchError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    #[error("invalid location {0:?}: expected path:line.column[-end]")]
    Malformed(String),

    #[error("invalid location {text:?}: {reason}")]
    OutOfRange { text: String, reason: &'static str },
}

#[derive(Error, Debug)]
pub enum TagrefError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse {text:?}@{loc}: {source}")]
    Element {
        text: String,
        loc: String,
        #[source]
        source: ParseError,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Match error: {0}")]
    Match(#[from] MatchError),

    #[error("Index format error: {0}")]
    IndexFormat(#[from] IndexFormatError),

    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    #[error("{path}:{line}: {message}")]
    Scan {
        path: String,
        line: usize,
        message: String,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("{0}")]
    Usage(String),

    #[error("Lint error: {0}")]
    Lint(String),

    #[error("Watcher error: {0}")]
    Watcher(String),
}

impl TagrefError {
    /// True when the error only says that a file does not exist, which callers
    /// reading an index treat as a soft miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TagrefError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, TagrefError>;
