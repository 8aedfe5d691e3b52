//! Data-driven element matchers.
//!
//! The host page's class names are build artifacts that change without notice, so
//! every lookup the engine does goes through a [`Matcher`] that can be written in the
//! config file with a small subset of CSS selector syntax:
//!
//! - `div`, `*` (tag)
//! - `.placeholder` (class)
//! - `[data-eventchip]`, `[role="button"]`, `[class*="gVNoLb"]` (attributes)
//! - `:not(...)`
//! - `a, b` (selector list, first matching alternative wins)
//!
//! Combinators (descendant, child, sibling) are not supported: the engine always
//! scopes queries explicitly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dom::{Document, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Matcher {
    Any,
    Tag(String),
    Class(String),
    HasAttr(String),
    AttrEquals(String, String),
    AttrContains(String, String),
    Not(Box<Matcher>),
    All(Vec<Matcher>),
    AnyOf(Vec<Matcher>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unsupported syntax in selector `{selector}` at `{at}`")]
    Unsupported { selector: String, at: String },
    #[error("unbalanced `{delimiter}` in selector `{selector}`")]
    Unbalanced { selector: String, delimiter: char },
    #[error("`{0}` is not a single class name")]
    InvalidClass(String),
}

impl Matcher {
    /// Only elements can match; text nodes never do.
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        if !doc.is_element(node) {
            return false;
        }
        match self {
            Matcher::Any => true,
            Matcher::Tag(tag) => doc.tag(node).is_some_and(|t| t.eq_ignore_ascii_case(tag)),
            Matcher::Class(class) => doc.has_class(node, class),
            Matcher::HasAttr(name) => attribute_value(doc, node, name).is_some(),
            Matcher::AttrEquals(name, value) => {
                attribute_value(doc, node, name).is_some_and(|v| v == *value)
            }
            Matcher::AttrContains(name, value) => {
                !value.is_empty()
                    && attribute_value(doc, node, name).is_some_and(|v| v.contains(value.as_str()))
            }
            Matcher::Not(inner) => !inner.matches(doc, node),
            Matcher::All(parts) => parts.iter().all(|m| m.matches(doc, node)),
            Matcher::AnyOf(alternatives) => alternatives.iter().any(|m| m.matches(doc, node)),
        }
    }

    /// Builds a fallback chain: an element matches if any link matches.
    pub fn chain(links: &[Matcher]) -> Matcher {
        match links {
            [single] => single.clone(),
            _ => Matcher::AnyOf(links.to_vec()),
        }
    }
}

fn attribute_value(doc: &Document, node: NodeId, name: &str) -> Option<String> {
    if name == "class" {
        return doc
            .class_name(node)
            .filter(|_| doc.element(node).is_some_and(|el| !el.classes.is_empty()));
    }
    doc.attribute(node, name).map(str::to_string)
}

impl FromStr for Matcher {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut alternatives = split_top_level(s)?
            .into_iter()
            .map(parse_compound)
            .collect::<Result<Vec<_>, _>>()?;
        if alternatives.len() == 1 {
            Ok(alternatives.remove(0))
        } else {
            Ok(Matcher::AnyOf(alternatives))
        }
    }
}

impl TryFrom<String> for Matcher {
    type Error = SelectorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Matcher> for String {
    fn from(value: Matcher) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Any => write!(f, "*"),
            Matcher::Tag(tag) => write!(f, "{tag}"),
            Matcher::Class(class) => write!(f, ".{class}"),
            Matcher::HasAttr(name) => write!(f, "[{name}]"),
            Matcher::AttrEquals(name, value) => write!(f, "[{name}=\"{value}\"]"),
            Matcher::AttrContains(name, value) => write!(f, "[{name}*=\"{value}\"]"),
            Matcher::Not(inner) => write!(f, ":not({inner})"),
            Matcher::All(parts) => parts.iter().try_for_each(|p| write!(f, "{p}")),
            Matcher::AnyOf(alternatives) => {
                for (i, alt) in alternatives.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{alt}")?;
                }
                Ok(())
            }
        }
    }
}

/// Splits a selector list on commas that are not nested in brackets, parens or quotes.
fn split_top_level(s: &str) -> Result<Vec<&str>, SelectorError> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, ch) in s.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(' | '[') => depth += 1,
            (None, ')' | ']') => depth -= 1,
            (None, ',') if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        if depth < 0 {
            return Err(SelectorError::Unbalanced {
                selector: s.to_string(),
                delimiter: ch,
            });
        }
    }
    if depth != 0 || quote.is_some() {
        return Err(SelectorError::Unbalanced {
            selector: s.to_string(),
            delimiter: quote.unwrap_or('('),
        });
    }
    parts.push(&s[start..]);
    Ok(parts)
}

/// Checks that `s` is one class name (letters, digits, `-`, `_`).
pub fn class_name(s: &str) -> Result<String, SelectorError> {
    if s.is_empty() || ident_len(s) != s.len() {
        return Err(SelectorError::InvalidClass(s.to_string()));
    }
    Ok(s.to_string())
}

fn ident_len(s: &str) -> usize {
    s.find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(s.len())
}

fn parse_compound(input: &str) -> Result<Matcher, SelectorError> {
    let selector = input.trim();
    if selector.is_empty() {
        return Err(SelectorError::Empty);
    }
    let unsupported = |at: &str| SelectorError::Unsupported {
        selector: selector.to_string(),
        at: at.to_string(),
    };

    let mut parts = Vec::new();
    let mut rest = selector;

    if let Some(r) = rest.strip_prefix('*') {
        parts.push(Matcher::Any);
        rest = r;
    } else {
        let n = ident_len(rest);
        if n > 0 {
            parts.push(Matcher::Tag(rest[..n].to_ascii_lowercase()));
            rest = &rest[n..];
        }
    }

    while !rest.is_empty() {
        if let Some(r) = rest.strip_prefix('.') {
            let n = ident_len(r);
            if n == 0 {
                return Err(unsupported(rest));
            }
            parts.push(Matcher::Class(r[..n].to_string()));
            rest = &r[n..];
        } else if let Some(r) = rest.strip_prefix('[') {
            let end = closing_index(r, ']').ok_or_else(|| SelectorError::Unbalanced {
                selector: selector.to_string(),
                delimiter: '[',
            })?;
            parts.push(parse_attribute(&r[..end]).ok_or_else(|| unsupported(rest))?);
            rest = &r[end + 1..];
        } else if let Some(r) = rest.strip_prefix(":not(") {
            let end = closing_index(r, ')').ok_or_else(|| SelectorError::Unbalanced {
                selector: selector.to_string(),
                delimiter: '(',
            })?;
            parts.push(Matcher::Not(Box::new(r[..end].parse()?)));
            rest = &r[end + 1..];
        } else {
            return Err(unsupported(rest));
        }
    }

    Ok(if parts.len() == 1 {
        parts.remove(0)
    } else {
        Matcher::All(parts)
    })
}

/// Index of the `close` delimiter ending the current group, skipping quoted text
/// and nested groups.
fn closing_index(s: &str, close: char) -> Option<usize> {
    let open = if close == ')' { '(' } else { '[' };
    let mut depth = 0;
    let mut quote: Option<char> = None;
    for (i, ch) in s.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, c) if c == open => depth += 1,
            (None, c) if c == close => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    None
}

fn parse_attribute(inner: &str) -> Option<Matcher> {
    let inner = inner.trim();
    let (name, op, value) = if let Some(idx) = inner.find("*=") {
        (&inner[..idx], "*=", Some(&inner[idx + 2..]))
    } else if let Some(idx) = inner.find('=') {
        (&inner[..idx], "=", Some(&inner[idx + 1..]))
    } else {
        (inner, "", None)
    };
    let name = name.trim();
    if name.is_empty() || ident_len(name) != name.len() {
        return None;
    }
    let name = name.to_ascii_lowercase();
    match value {
        None => Some(Matcher::HasAttr(name)),
        Some(raw) => {
            let value = unquote(raw.trim())?;
            if op == "*=" {
                Some(Matcher::AttrContains(name, value))
            } else {
                Some(Matcher::AttrEquals(name, value))
            }
        }
    }
}

fn unquote(raw: &str) -> Option<String> {
    for q in ['"', '\''] {
        if let Some(body) = raw.strip_prefix(q) {
            return body.strip_suffix(q).map(str::to_string);
        }
    }
    (!raw.is_empty() && ident_len(raw) == raw.len()).then(|| raw.to_string())
}
