//! Type names and their canonical textual form.
//!
//! Hook signature keys embed parameter types as text, so two spellings of the
//! same type (`Vec<u8>`, `Vec < u8 >`) must render identically and no two
//! different types may render the same. Canonical form is produced from a
//! token stream of the written type:
//!
//! - whitespace is normalised, lifetimes and `r#` prefixes are dropped
//! - generic brackets `<` / `>` become `[` / `]`
//! - `, ` separates list items, `; ` separates array lengths, ` -> ` precedes returns
//!
//! Every bracket stays balanced, so a rendered type never contains a top-level
//! `, ` and parameter lists built from canonical names stay unambiguous.

use std::{
    fmt,
    hash::{Hash, Hasher},
};

/// The name every boxed value is erased to on the wire.
pub const OBJECT_TYPE: &str = "Object";

/// A type as written in source, paired with its canonical rendering.
///
/// Equality and hashing use the canonical form only.
#[derive(Debug, Clone)]
pub struct TypeName {
    source: String,
    canonical: String,
}

impl TypeName {
    /// Create a type name from its written form.
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let canonical = canonicalize(&source);
        Self { source, canonical }
    }

    /// The generic erased object type.
    pub fn object() -> Self {
        Self::new(OBJECT_TYPE)
    }

    /// The type as originally written.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The canonical rendering used inside signature keys.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Whether this names the erased object type (by any path).
    pub fn is_object(&self) -> bool {
        self.canonical.rsplit("::").next() == Some(OBJECT_TYPE)
    }

    /// The owned type an argument of this type is stored as.
    ///
    /// Unsized element types cannot be unboxed directly: `str` is stored as
    /// `String` and a slice `[T]` as `Vec<T>`. Every other type is its own
    /// storage.
    pub fn storage(&self) -> TypeName {
        if self.canonical == "str" {
            return TypeName::new("String");
        }
        let source = self.source.trim();
        if let Some(inner) = source
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            if !has_top_level(inner, ';') {
                return TypeName::new(format!("Vec<{}>", inner.trim()));
            }
        }
        self.clone()
    }
}

impl PartialEq for TypeName {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for TypeName {}

impl Hash for TypeName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl From<&str> for TypeName {
    fn from(source: &str) -> Self {
        TypeName::new(source)
    }
}

fn has_top_level(text: &str, needle: char) -> bool {
    let mut depth = 0i32;
    for c in text.chars() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth -= 1,
            c if c == needle && depth == 0 => return true,
            _ => {}
        }
    }
    false
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Word(&'a str),
    Punct(&'static str),
}

fn is_word_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        if c.is_whitespace() {
            rest = &rest[c.len_utf8()..];
            continue;
        }

        // Lifetimes carry no identity for dispatch.
        if c == '\'' {
            let end = rest[1..]
                .find(|ch: char| !is_word_char(ch))
                .map_or(rest.len(), |i| i + 1);
            rest = &rest[end..];
            if tokens.last() == Some(&Token::Punct("+")) {
                tokens.pop();
            }
            continue;
        }

        if is_word_char(c) {
            let end = rest.find(|ch: char| !is_word_char(ch)).unwrap_or(rest.len());
            let word = &rest[..end];
            rest = &rest[end..];
            if word == "r" && rest.starts_with('#') {
                rest = &rest[1..];
                continue;
            }
            tokens.push(Token::Word(word));
            continue;
        }

        let (punct, len) = if rest.starts_with("::") {
            ("::", 2)
        } else if rest.starts_with("->") {
            ("->", 2)
        } else {
            let p = match c {
                '<' => "<",
                '>' => ">",
                '(' => "(",
                ')' => ")",
                '[' => "[",
                ']' => "]",
                ',' => ",",
                ';' => ";",
                '&' => "&",
                '*' => "*",
                '!' => "!",
                '+' => "+",
                '=' => "=",
                '?' => "?",
                _ => "#",
            };
            (p, c.len_utf8())
        };
        rest = &rest[len..];
        tokens.push(Token::Punct(punct));
    }

    tokens
}

/// Render a written type in canonical form.
pub fn canonicalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_word = false;

    for token in tokenize(text) {
        match token {
            Token::Word(word) => {
                if prev_word {
                    out.push(' ');
                }
                out.push_str(word);
                prev_word = true;
                continue;
            }
            Token::Punct(punct) => {
                match punct {
                    "<" => out.push('['),
                    ">" | "]" | ")" => {
                        if out.ends_with(", ") {
                            out.truncate(out.len() - 2);
                        }
                        out.push(if punct == ")" { ')' } else { ']' });
                    }
                    "," => out.push_str(", "),
                    ";" => out.push_str("; "),
                    "->" => out.push_str(" -> "),
                    "+" => out.push_str(" + "),
                    "=" => out.push_str(" = "),
                    other => out.push_str(other),
                }
                prev_word = false;
            }
        }
    }

    out.trim_end_matches([',', ' ']).to_string()
}
