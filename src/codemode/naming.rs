//! Canonical method names for registry tools.
//!
//! `pg_json_extract` in group `json` becomes `extract`; `pg_doc_find` in
//! `docstore` becomes `find`; `pg_fulltext_search` keeps its group prefix
//! and becomes `fulltextSearch`.

use once_cell::sync::Lazy;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

/// Prefix shared by every tool in the registry.
pub const TOOL_PREFIX: &str = "pg_";

/// Groups whose tool names do not start with the group tag itself.
static GROUP_PREFIX_OVERRIDES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("transactions", "transaction_"),
        ("docstore", "doc_"),
    ])
});

/// Groups whose prefix stays part of the method name.
static KEEP_PREFIX_GROUPS: Lazy<HashSet<&'static str>> = Lazy::new(|| HashSet::from(["fulltext"]));

/// Name prefix expected on tools of `group`, after [`TOOL_PREFIX`] is removed.
pub fn group_prefix(group: &str) -> Cow<'static, str> {
    match GROUP_PREFIX_OVERRIDES.get(group) {
        Some(prefix) => Cow::Borrowed(*prefix),
        None => Cow::Owned(format!("{}_", group)),
    }
}

/// Derive the canonical method name of `tool_name` within `group`.
///
/// Never fails: a tail without the expected group prefix is used whole.
pub fn resolve_method_name(tool_name: &str, group: &str) -> String {
    let tail = tool_name.strip_prefix(TOOL_PREFIX).unwrap_or(tool_name);

    let tail = if KEEP_PREFIX_GROUPS.contains(group) {
        tail
    } else {
        let prefix = group_prefix(group);
        match tail.strip_prefix(prefix.as_ref()) {
            Some(rest) if !rest.is_empty() => rest,
            _ => tail,
        }
    };

    to_camel_case(tail)
}

/// `_x` becomes `X` for every ASCII lowercase `x`; nothing else changes case.
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '_'
            && let Some(&next) = chars.peek()
            && next.is_ascii_lowercase()
        {
            out.push(next.to_ascii_uppercase());
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}
