//! Deterministic GraphQL-safe naming.
//!
//! GraphQL names must match `[_A-Za-z][_0-9A-Za-z]*` and may not start with
//! `__`. Everything in here is a pure function of its input so that repeated
//! synthesis over the same document yields the same names.

use std::collections::HashSet;

use crate::descriptor::HttpMethod;

/// Returns true when `name` is already a valid, non-reserved GraphQL name.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first == '_' || first.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        && !name.starts_with("__")
}

/// Splits `raw` into alphanumeric words.
fn words(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
}

fn upper_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn lower_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn guard_leading(name: String, fallback: &str) -> String {
    match name.chars().next() {
        None => fallback.to_string(),
        Some(c) if c.is_ascii_digit() => format!("_{name}"),
        Some(_) => name,
    }
}

/// camelCase join of the words in `raw`.
#[must_use]
pub fn camel_case(raw: &str) -> String {
    let joined: String = words(raw)
        .enumerate()
        .map(|(i, w)| if i == 0 { lower_first(w) } else { upper_first(w) })
        .collect();
    guard_leading(joined, "field")
}

/// PascalCase join of the words in `raw`.
#[must_use]
pub fn pascal_case(raw: &str) -> String {
    let joined: String = words(raw).map(upper_first).collect();
    guard_leading(joined, "Type")
}

/// Sanitizes a field or argument name.
///
/// Valid identifiers pass through unchanged; anything else is camel-cased.
#[must_use]
pub fn sanitize_identifier(raw: &str) -> String {
    if is_valid_identifier(raw) {
        raw.to_string()
    } else {
        camel_case(raw)
    }
}

/// Sanitizes a type name to PascalCase.
#[must_use]
pub fn sanitize_type_name(raw: &str) -> String {
    if is_valid_identifier(raw) && raw.starts_with(|c: char| c.is_ascii_uppercase()) {
        raw.to_string()
    } else {
        pascal_case(raw)
    }
}

/// Sanitizes an enum value to an upper-case GraphQL enum name.
#[must_use]
pub fn sanitize_enum_value(raw: &str) -> String {
    let mut name: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() {
        name = "EMPTY".to_string();
    }
    guard_leading(name, "EMPTY")
}

/// Derives an operation id from method and path template.
///
/// `get /user/{id}` becomes `getUserId`, `put /some-route/{id}` becomes
/// `putSomeRouteId`.
#[must_use]
pub fn derive_operation_id(method: HttpMethod, path: &str) -> String {
    let mut id = method.as_str().to_ascii_lowercase();
    for word in words(path) {
        id.push_str(&upper_first(word));
    }
    id
}

/// Allocates unique names, appending `2`, `3`, ... on collision.
#[derive(Debug, Clone, Default)]
pub struct UniqueNames {
    used: HashSet<String>,
}

impl UniqueNames {
    /// Creates an allocator with `reserved` names already taken.
    pub fn with_reserved<I, S>(reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            used: reserved.into_iter().map(Into::into).collect(),
        }
    }

    /// Allocates `base`, or the first free `base<N>` with N starting at 2.
    pub fn allocate(&mut self, base: &str) -> String {
        if self.used.insert(base.to_string()) {
            return base.to_string();
        }
        let mut suffix = 2usize;
        loop {
            let candidate = format!("{base}{suffix}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            suffix += 1;
        }
    }
}
