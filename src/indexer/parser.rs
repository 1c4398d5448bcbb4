//! Parser for the tag grammar found between comment brackets.
//!
//! ```text
//! [?[g|gl|e|re]] [@attr[=value]...] [./|.]name [attr[=value]...]
//! ```
//!
//! - `?` makes the tag a search pattern: exact (`?`), glob (`?g`, `?gl`) or
//!   regexp (`?e`, `?re`).
//! - `./name` scopes the tag to its directory, `.name` to its file.
//! - Values and the name may be double-quoted with C-style escapes. Any
//!   other character, backticks included, is taken literally.

use once_cell::sync::Lazy;
use regex::Regex;

use super::scanner::RawElement;
use crate::error::{ParseError, Result, TagrefError};
use crate::index::{Attrs, Entry, Location, SCOPE_ATTR, SEARCH_ATTR};
use crate::matcher::{PatternKind, SEPARATOR};

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_:\-./]*$").expect("valid regex"));

static ATTR_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_:\-]*$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
    Equals,
}

type Chars<'a> = std::iter::Peekable<std::str::Chars<'a>>;

fn read_hex(chars: &mut Chars<'_>, n: usize) -> std::result::Result<u32, String> {
    let digits: String = (0..n).filter_map(|_| chars.next()).collect();

    if digits.chars().count() != n || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("invalid hex escape {:?}", digits));
    }

    u32::from_str_radix(&digits, 16).map_err(|_| format!("invalid hex escape {:?}", digits))
}

fn read_escape(chars: &mut Chars<'_>) -> std::result::Result<char, String> {
    let c = match chars.next() {
        Some('a') => '\x07',
        Some('b') => '\x08',
        Some('f') => '\x0c',
        Some('n') => '\n',
        Some('r') => '\r',
        Some('t') => '\t',
        Some('v') => '\x0b',
        Some('\\') => '\\',
        Some('"') => '"',
        Some('\'') => '\'',
        Some('x') => {
            let v = read_hex(chars, 2)?;
            if v > 0x7f {
                return Err(format!("non-ASCII byte escape \\x{:02x}", v));
            }
            char::from(v as u8)
        }
        Some('u') => {
            let v = read_hex(chars, 4)?;
            char::from_u32(v).ok_or_else(|| format!("invalid code point \\u{:04x}", v))?
        }
        Some('U') => {
            let v = read_hex(chars, 8)?;
            char::from_u32(v).ok_or_else(|| format!("invalid code point \\U{:08x}", v))?
        }
        Some(d @ '0'..='7') => {
            let mut v = d.to_digit(8).unwrap_or(0);
            for _ in 0..2 {
                match chars.next().and_then(|c| c.to_digit(8)) {
                    Some(n) => v = v * 8 + n,
                    None => return Err("truncated octal escape".to_string()),
                }
            }
            if v > 0x7f {
                return Err(format!("non-ASCII byte escape \\{:03o}", v));
            }
            char::from(v as u8)
        }
        Some(other) => return Err(format!("unknown escape sequence \\{}", other)),
        None => return Err("unterminated string".to_string()),
    };

    Ok(c)
}

fn tokenize(text: &str) -> std::result::Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '=' => {
                chars.next();
                tokens.push(Token::Equals);
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => s.push(read_escape(&mut chars).map_err(ParseError::InvalidQuoting)?),
                        Some('\n') => {
                            return Err(ParseError::InvalidQuoting("newline in string".to_string()))
                        }
                        Some(c) => s.push(c),
                        None => {
                            return Err(ParseError::InvalidQuoting("unterminated string".to_string()))
                        }
                    }
                }
                tokens.push(Token::Quoted(s));
            }
            _ => {
                let mut s = String::new();
                while let Some(c) =
                    chars.next_if(|c| !c.is_whitespace() && !matches!(c, '=' | '"'))
                {
                    s.push(c);
                }
                tokens.push(Token::Word(s));
            }
        }
    }

    Ok(tokens)
}

/// Directory of `path` with a trailing separator, or `None` at the root.
fn containing_dir(path: &str) -> Option<String> {
    match path.rfind(SEPARATOR) {
        None => None,
        Some(0) => Some(SEPARATOR.to_string()),
        Some(i) => Some(format!("{}{}", &path[..i], SEPARATOR)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pre,
    Post,
}

#[derive(Debug)]
enum State {
    Expect(Phase),
    Attr { key: String, back: Phase, eq: bool },
}

struct ElementParser<'a> {
    loc: &'a Location,
    attrs: Attrs,
    search: Option<PatternKind>,
    name: Option<String>,
    state: State,
}

impl<'a> ElementParser<'a> {
    fn new(loc: &'a Location) -> Self {
        Self {
            loc,
            attrs: Attrs::new(),
            search: None,
            name: None,
            state: State::Expect(Phase::Pre),
        }
    }

    fn add_attr(&mut self, key: &str, value: &str) -> std::result::Result<(), ParseError> {
        if !ATTR_NAME_RE.is_match(key) {
            return Err(ParseError::InvalidAttributeName(key.to_string()));
        }

        if let Some(old) = self.attrs.get(key) {
            return Err(ParseError::DuplicateAttribute {
                key: key.to_string(),
                value: old.clone(),
            });
        }

        let value = match key {
            SCOPE_ATTR => match value {
                "." => self.loc.path.clone(),
                "./" => match containing_dir(&self.loc.path) {
                    Some(dir) => dir,
                    // Tags in root files are global already.
                    None => return Ok(()),
                },
                other => other.to_string(),
            },
            SEARCH_ATTR => {
                let kind = match value {
                    "" | "exact" => PatternKind::Exact,
                    "g" | "gl" => PatternKind::Glob,
                    "e" | "re" => PatternKind::Regexp,
                    other => return Err(ParseError::UnknownSearchType(other.to_string())),
                };
                self.search = Some(kind);
                kind.as_str().to_string()
            }
            _ => value.to_string(),
        };

        self.attrs.insert(key.to_string(), value);

        Ok(())
    }

    fn set_name(&mut self, token: &str, quoted: bool) -> std::result::Result<(), ParseError> {
        let mut name = token;

        if !quoted {
            if let Some(rest) = name.strip_prefix("./") {
                self.add_attr(SCOPE_ATTR, "./")?;
                name = rest;
            } else if let Some(rest) = name.strip_prefix('.') {
                self.add_attr(SCOPE_ATTR, ".")?;
                name = rest;
            }
        }

        // Glob and regexp names are patterns and may hold metacharacters.
        let strict = matches!(self.search, None | Some(PatternKind::Exact));
        if strict && !NAME_RE.is_match(name) {
            return Err(ParseError::InvalidName(name.to_string()));
        }

        self.name = Some(name.to_string());
        self.state = State::Expect(Phase::Post);

        Ok(())
    }

    fn feed(&mut self, token: Token) -> std::result::Result<(), ParseError> {
        let state = std::mem::replace(&mut self.state, State::Expect(Phase::Pre));

        match state {
            State::Expect(Phase::Pre) => {
                self.state = State::Expect(Phase::Pre);
                match token {
                    Token::Word(w) if w.starts_with('?') => self.add_attr(SEARCH_ATTR, &w[1..]),
                    Token::Word(w) if w.starts_with('@') => {
                        self.state = State::Attr {
                            key: w[1..].to_string(),
                            back: Phase::Pre,
                            eq: false,
                        };
                        Ok(())
                    }
                    Token::Word(w) => self.set_name(&w, false),
                    Token::Quoted(s) => self.set_name(&s, true),
                    Token::Equals => Err(ParseError::InvalidName("=".to_string())),
                }
            }
            State::Expect(Phase::Post) => {
                self.state = State::Expect(Phase::Post);
                match token {
                    Token::Word(w) => {
                        self.state = State::Attr {
                            key: w,
                            back: Phase::Post,
                            eq: false,
                        };
                        Ok(())
                    }
                    Token::Quoted(s) => Err(ParseError::InvalidAttributeName(format!("{:?}", s))),
                    Token::Equals => Err(ParseError::InvalidAttributeName("=".to_string())),
                }
            }
            State::Attr { key, back, eq: false } => match token {
                Token::Equals => {
                    self.state = State::Attr { key, back, eq: true };
                    Ok(())
                }
                other => {
                    self.add_attr(&key, "")?;
                    self.state = State::Expect(back);
                    self.feed(other)
                }
            },
            State::Attr { key, back, eq: true } => {
                let value = match token {
                    Token::Word(v) | Token::Quoted(v) => v,
                    Token::Equals => "=".to_string(),
                };
                self.add_attr(&key, &value)?;
                self.state = State::Expect(back);
                Ok(())
            }
        }
    }

    fn finish(mut self) -> std::result::Result<Entry, ParseError> {
        if let State::Attr { key, .. } = std::mem::replace(&mut self.state, State::Expect(Phase::Post)) {
            self.add_attr(&key, "")?;
        }

        let name = self.name.ok_or_else(|| ParseError::InvalidName(String::new()))?;

        Ok(Entry {
            name,
            attrs: self.attrs,
            loc: self.loc.clone(),
        })
    }
}

/// Parses the text of one tag found at `loc`.
pub fn parse_element(text: &str, loc: &Location) -> std::result::Result<Entry, ParseError> {
    let tokens = tokenize(text)?;

    if tokens.is_empty() {
        return Err(ParseError::EmptyElement);
    }

    let mut parser = ElementParser::new(loc);
    for token in tokens {
        parser.feed(token)?;
    }

    parser.finish()
}

/// Parses a batch of raw elements, failing on the first invalid one.
pub fn parse_elements(elems: &[RawElement]) -> Result<Vec<Entry>> {
    elems
        .iter()
        .map(|el| {
            parse_element(&el.text, &el.loc).map_err(|source| TagrefError::Element {
                text: el.text.clone(),
                loc: el.loc.to_string(),
                source,
            })
        })
        .collect()
}
