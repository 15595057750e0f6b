//! Path template utilities: merging prefixes and converting placeholder styles.

use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static BRACE_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"));

static COLON_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|/):([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex"));

static BRACKET_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([A-Za-z_][A-Za-z0-9_]*)\]").expect("valid regex"));

/// Join two path segments.
///
/// | base    | sub      | result       |
/// |---------|----------|--------------|
/// | `/api`  | `/users` | `/api/users` |
/// | `/api/` | `/users` | `/api/users` |
/// | `/api`  | `/`      | `/api`       |
/// | `/api/` | `/`      | `/api/`      |
pub fn merge_path(base: &str, sub: &str) -> String {
    let base = if base.is_empty() { "/" } else { base };
    let sub = if sub.is_empty() { "/" } else { sub };

    let mut out = String::with_capacity(base.len() + sub.len() + 2);
    if !base.starts_with('/') {
        out.push('/');
    }
    out.push_str(base);

    if sub != "/" {
        if !base.ends_with('/') {
            out.push('/');
        }
        out.push_str(sub.strip_prefix('/').unwrap_or(sub));
    }
    out
}

/// Variadic [`merge_path`], folding from the right:
/// `merge_paths(&[a, b, c]) == merge_path(a, &merge_path(b, c))`.
pub fn merge_paths(paths: &[&str]) -> String {
    match paths {
        [] => "/".to_string(),
        [only] => merge_path(only, "/"),
        [base, sub] => merge_path(base, sub),
        [base, rest @ ..] => merge_path(base, &merge_paths(rest)),
    }
}

/// Placeholder syntax used by a host router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathStyle {
    /// `{id}`: OpenAPI documents, axum 0.8, actix-web.
    Brace,
    /// `:id`
    Colon,
    /// `[id]`, as used by file-system routers.
    Bracket,
}

impl PathStyle {
    pub(crate) fn index(self) -> usize {
        match self {
            PathStyle::Brace => 0,
            PathStyle::Colon => 1,
            PathStyle::Bracket => 2,
        }
    }
}

/// Convert a brace-style template into `style`.
pub fn to_style(path: &str, style: PathStyle) -> String {
    let replacement = match style {
        PathStyle::Brace => return path.to_string(),
        PathStyle::Colon => ":$1",
        PathStyle::Bracket => "[$1]",
    };
    BRACE_PARAM.replace_all(path, replacement).into_owned()
}

/// Convert a colon- or bracket-style path back to brace style.
/// Brace-style input is returned unchanged.
pub fn to_brace(path: &str) -> String {
    let colon: Cow<'_, str> = COLON_PARAM.replace_all(path, "$1{$2}");
    BRACKET_PARAM.replace_all(&colon, "{$1}").into_owned()
}

/// Error in a route path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    MissingLeadingSlash(String),
    UnbalancedBrace(String),
    InvalidPlaceholder { path: String, name: String },
    DuplicatePlaceholder { path: String, name: String },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::MissingLeadingSlash(path) => {
                write!(f, "path `{path}` must start with `/`")
            }
            PathError::UnbalancedBrace(path) => write!(f, "path `{path}` has an unbalanced brace"),
            PathError::InvalidPlaceholder { path, name } => {
                write!(f, "path `{path}` has an invalid placeholder `{{{name}}}`")
            }
            PathError::DuplicatePlaceholder { path, name } => {
                write!(f, "path `{path}` declares `{{{name}}}` more than once")
            }
        }
    }
}

impl std::error::Error for PathError {}

/// Validate a brace-style template and return its placeholder names in order.
pub fn placeholders(path: &str) -> Result<Vec<String>, PathError> {
    if !path.starts_with('/') {
        return Err(PathError::MissingLeadingSlash(path.to_string()));
    }

    let mut names: Vec<String> = Vec::new();
    let mut rest = path;
    while let Some(open) = rest.find(['{', '}']) {
        if rest.as_bytes()[open] == b'}' {
            return Err(PathError::UnbalancedBrace(path.to_string()));
        }
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| PathError::UnbalancedBrace(path.to_string()))?;
        let name = &after[..close];
        if name.contains('{') {
            return Err(PathError::UnbalancedBrace(path.to_string()));
        }
        if !is_identifier(name) {
            return Err(PathError::InvalidPlaceholder {
                path: path.to_string(),
                name: name.to_string(),
            });
        }
        if names.iter().any(|n| n == name) {
            return Err(PathError::DuplicatePlaceholder {
                path: path.to_string(),
                name: name.to_string(),
            });
        }
        names.push(name.to_string());
        rest = &after[close + 1..];
    }
    Ok(names)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
