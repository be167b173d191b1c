//! Static alias table: alternative method names per group.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// `alias` resolves to `canonical` within `group`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AliasEntry {
    pub group: &'static str,
    pub alias: &'static str,
    pub canonical: &'static str,
}

const fn alias(group: &'static str, alias: &'static str, canonical: &'static str) -> AliasEntry {
    AliasEntry {
        group,
        alias,
        canonical,
    }
}

/// Aliases never point at other aliases.
pub const ALIASES: &[AliasEntry] = &[
    alias("core", "query", "readQuery"),
    alias("core", "read", "readQuery"),
    alias("core", "select", "readQuery"),
    alias("core", "exec", "writeQuery"),
    alias("core", "write", "writeQuery"),
    alias("core", "execute", "writeQuery"),
    alias("core", "tables", "listTables"),
    alias("core", "schemas", "listSchemas"),
    alias("core", "describe", "describeTable"),
    alias("core", "index", "createIndex"),
    alias("core", "drop", "dropTable"),
    alias("transactions", "run", "execute"),
    alias("transactions", "batch", "execute"),
    alias("transactions", "transaction", "execute"),
    alias("json", "jsonExtract", "extract"),
    alias("json", "jsonSet", "set"),
    alias("json", "jsonKeys", "keys"),
    alias("json", "get", "extract"),
    alias("fulltext", "search", "fulltextSearch"),
    alias("fulltext", "createIndex", "fulltextCreateIndex"),
    alias("performance", "plan", "explain"),
    alias("performance", "explainQuery", "explain"),
    alias("performance", "indexUsage", "indexStats"),
    alias("performance", "cacheHit", "cacheHitRatio"),
    alias("admin", "vacuumTable", "vacuum"),
    alias("admin", "analyzeTable", "analyze"),
    alias("admin", "reindexTable", "reindex"),
    alias("docstore", "newCollection", "createCollection"),
    alias("docstore", "insertDocuments", "insert"),
    alias("docstore", "query", "find"),
    alias("docstore", "findDocuments", "find"),
    alias("docstore", "drop", "dropCollection"),
];

static BY_GROUP: Lazy<HashMap<&'static str, Vec<AliasEntry>>> = Lazy::new(|| {
    let mut by_group: HashMap<&'static str, Vec<AliasEntry>> = HashMap::new();
    for entry in ALIASES {
        by_group.entry(entry.group).or_default().push(*entry);
    }
    by_group
});

/// Entries of the standard table for one group, in table order.
pub fn aliases_for(group: &str) -> &'static [AliasEntry] {
    BY_GROUP.get(group).map(Vec::as_slice).unwrap_or(&[])
}

/// Whether an alias is worth listing in help output: aliases that merely
/// repeat the group name (`jsonExtract` in `json`) are left out.
pub fn is_useful_alias(group: &str, alias: &str) -> bool {
    !alias.to_lowercase().starts_with(&group.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_aliases_for_group() {
        let docstore: Vec<_> = aliases_for("docstore").iter().map(|e| e.alias).collect();
        assert_eq!(
            docstore,
            vec!["newCollection", "insertDocuments", "query", "findDocuments", "drop"]
        );
        assert!(aliases_for("unknown").is_empty());
    }

    #[test]
    fn test_no_alias_chains() {
        for entry in ALIASES {
            let chained = ALIASES
                .iter()
                .any(|other| other.group == entry.group && other.alias == entry.canonical);
            assert!(!chained, "{}.{} points at another alias", entry.group, entry.alias);
        }
    }

    #[test]
    fn test_aliases_unique_per_group() {
        let mut seen = HashSet::new();
        for entry in ALIASES {
            assert!(seen.insert((entry.group, entry.alias)), "duplicate alias {}", entry.alias);
        }
    }

    #[test]
    fn test_useful_alias_filter() {
        assert!(!is_useful_alias("json", "jsonExtract"));
        assert!(!is_useful_alias("json", "JSONKeys"));
        assert!(is_useful_alias("json", "get"));
        assert!(is_useful_alias("docstore", "docFind"));
    }
}
