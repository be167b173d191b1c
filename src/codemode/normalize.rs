//! Call-site argument normalization.
//!
//! Code-mode callers may write `count("orders")`, `createIndex("orders",
//! ["id"], {unique: true})` or `execute(["...", "..."])`; the normalizer turns
//! every such call into the single parameter object a handler expects.

use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Keys filled with a lone scalar when a method has no positional mapping.
pub const FALLBACK_KEYS: &[&str] = &["sql", "query", "table", "name"];

/// Parameter keys that positional arguments bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionalParams {
    Single(&'static str),
    Ordered(&'static [&'static str]),
}

use PositionalParams::{Ordered, Single};

static POSITIONAL: Lazy<HashMap<&'static str, PositionalParams>> = Lazy::new(|| {
    HashMap::from([
        // core
        ("readQuery", Single("sql")),
        ("writeQuery", Single("sql")),
        ("listTables", Single("schema")),
        ("describeTable", Ordered(&["table", "schema"])),
        ("createTable", Ordered(&["table", "columns"])),
        ("dropTable", Single("table")),
        ("createIndex", Ordered(&["table", "columns"])),
        ("count", Ordered(&["table", "where"])),
        ("exists", Ordered(&["table", "where"])),
        // transactions
        ("execute", Single("statements")),
        // json
        ("extract", Ordered(&["table", "column", "path"])),
        ("set", Ordered(&["table", "column", "path", "value"])),
        ("keys", Ordered(&["table", "column"])),
        ("contains", Ordered(&["table", "column", "value"])),
        // fulltext
        ("fulltextSearch", Ordered(&["table", "columns", "query"])),
        ("fulltextCreateIndex", Ordered(&["table", "columns"])),
        // performance
        ("explain", Single("sql")),
        ("indexStats", Single("table")),
        ("tableStats", Single("table")),
        // admin
        ("vacuum", Single("table")),
        ("analyze", Single("table")),
        ("reindex", Single("table")),
        // docstore
        ("createCollection", Single("collection")),
        ("dropCollection", Single("collection")),
        ("insert", Ordered(&["collection", "documents"])),
        ("find", Ordered(&["collection", "filter"])),
    ])
});

static ARRAY_WRAP: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| HashMap::from([("execute", "statements")]));

static STANDARD: Lazy<Arc<Normalizer>> =
    Lazy::new(|| Arc::new(Normalizer::new(POSITIONAL.clone(), ARRAY_WRAP.clone())));

/// Maps positional call arguments to named parameters, keyed by canonical
/// method name.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    positional: HashMap<&'static str, PositionalParams>,
    array_wrap: HashMap<&'static str, &'static str>,
}

impl Normalizer {
    pub fn new(
        positional: HashMap<&'static str, PositionalParams>,
        array_wrap: HashMap<&'static str, &'static str>,
    ) -> Self {
        Self {
            positional,
            array_wrap,
        }
    }

    /// The normalizer for the built-in tool catalog.
    pub fn standard() -> Arc<Self> {
        Arc::clone(&STANDARD)
    }

    pub fn positional(&self, method: &str) -> Option<PositionalParams> {
        self.positional.get(method).copied()
    }

    pub fn array_wrap(&self, method: &str) -> Option<&'static str> {
        self.array_wrap.get(method).copied()
    }

    /// Methods named by either table.
    pub fn methods(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.positional.keys().chain(self.array_wrap.keys()).copied()
    }

    /// Normalize call-site arguments for `method`.
    ///
    /// Returns `None` for a call without arguments. Never fails: arguments
    /// that fit no rule are passed through for the handler to reject.
    pub fn normalize(&self, method: &str, mut args: Vec<Value>) -> Option<Value> {
        match args.len() {
            0 => None,
            1 => Some(self.normalize_single(method, args.remove(0))),
            _ => Some(self.normalize_many(method, args)),
        }
    }

    fn normalize_single(&self, method: &str, arg: Value) -> Value {
        match arg {
            Value::Object(_) => arg,
            Value::Array(_) => match self.array_wrap(method) {
                Some(key) => single_key(key, arg),
                None => {
                    debug!(method, "Passing bare array through");
                    arg
                }
            },
            scalar => match self.positional(method) {
                Some(Single(key)) => single_key(key, scalar),
                Some(Ordered(keys)) => match keys.first() {
                    Some(key) => single_key(key, scalar),
                    None => scalar,
                },
                None => {
                    debug!(method, "No positional mapping, filling fallback keys");
                    Value::Object(
                        FALLBACK_KEYS
                            .iter()
                            .map(|key| (key.to_string(), scalar.clone()))
                            .collect(),
                    )
                }
            },
        }
    }

    fn normalize_many(&self, method: &str, mut args: Vec<Value>) -> Value {
        if args[0].is_array()
            && let Some(key) = self.array_wrap(method)
        {
            let trailing = trailing_object(&mut args);
            let mut params = Map::new();
            params.insert(key.to_string(), args.swap_remove(0));
            return merge(params, trailing);
        }

        match self.positional(method) {
            Some(Single(key)) => {
                let trailing = trailing_object(&mut args);
                let mut params = Map::new();
                params.insert(key.to_string(), args.swap_remove(0));
                merge(params, trailing)
            }
            Some(Ordered(keys)) => {
                // A final object is options when it names a mapped key or has no slot left.
                let has_options = matches!(
                    args.last(),
                    Some(Value::Object(last))
                        if args.len() > keys.len() || last.keys().any(|k| keys.contains(&k.as_str()))
                );
                let options = if has_options { trailing_object(&mut args) } else { None };

                let params = keys
                    .iter()
                    .zip(args)
                    .map(|(key, value)| (key.to_string(), value))
                    .collect();
                merge(params, options)
            }
            None => {
                debug!(method, "No positional mapping, passing first argument through");
                args.swap_remove(0)
            }
        }
    }
}

fn single_key(key: &str, value: Value) -> Value {
    let mut params = Map::new();
    params.insert(key.to_string(), value);
    Value::Object(params)
}

/// Pop the final argument if it is an object and something precedes it.
fn trailing_object(args: &mut Vec<Value>) -> Option<Map<String, Value>> {
    if args.len() < 2 {
        return None;
    }
    match args.pop() {
        Some(Value::Object(map)) => Some(map),
        Some(other) => {
            args.push(other);
            None
        }
        None => None,
    }
}

/// Shallow merge; keys of `overlay` win.
fn merge(mut params: Map<String, Value>, overlay: Option<Map<String, Value>>) -> Value {
    if let Some(overlay) = overlay {
        params.extend(overlay);
    }
    Value::Object(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalizer() -> Normalizer {
        Normalizer::new(
            HashMap::from([
                ("createIndex", Ordered(&["table", "columns"][..])),
                ("setValue", Ordered(&["table", "column", "value"][..])),
                ("count", Single("table")),
            ]),
            HashMap::from([("execute", "statements")]),
        )
    }

    #[test]
    fn test_zero_args_is_none() {
        let n = normalizer();
        for method in ["createIndex", "count", "execute", "unknown"] {
            assert_eq!(n.normalize(method, vec![]), None);
        }
    }

    #[test]
    fn test_single_object_passes_through() {
        let n = normalizer();
        for method in ["createIndex", "count", "execute", "unknown"] {
            assert_eq!(n.normalize(method, vec![json!({"a": 1})]), Some(json!({"a": 1})));
        }
    }

    #[test]
    fn test_single_array() {
        let n = normalizer();
        assert_eq!(
            n.normalize("execute", vec![json!(["a", "b"])]),
            Some(json!({"statements": ["a", "b"]}))
        );
        assert_eq!(n.normalize("count", vec![json!([1, 2])]), Some(json!([1, 2])));
    }

    #[test]
    fn test_single_scalar() {
        let n = normalizer();
        assert_eq!(n.normalize("count", vec![json!("orders")]), Some(json!({"table": "orders"})));
        assert_eq!(
            n.normalize("createIndex", vec![json!("orders")]),
            Some(json!({"table": "orders"}))
        );
        assert_eq!(
            n.normalize("unknown", vec![json!("SELECT 1")]),
            Some(json!({"sql": "SELECT 1", "query": "SELECT 1", "table": "SELECT 1", "name": "SELECT 1"}))
        );
    }

    #[test]
    fn test_positional_list() {
        let n = normalizer();
        assert_eq!(
            n.normalize("createIndex", vec![json!("orders"), json!(["id", "name"])]),
            Some(json!({"table": "orders", "columns": ["id", "name"]}))
        );
    }

    #[test]
    fn test_trailing_options_merge_over_positional() {
        let n = normalizer();
        assert_eq!(
            n.normalize("createIndex", vec![json!("orders"), json!(["id"]), json!({"unique": true})]),
            Some(json!({"table": "orders", "columns": ["id"], "unique": true}))
        );
        assert_eq!(
            n.normalize("createIndex", vec![json!("orders"), json!({"columns": ["a"], "unique": true})]),
            Some(json!({"table": "orders", "columns": ["a"], "unique": true}))
        );
    }

    #[test]
    fn test_object_in_positional_slot_is_a_value() {
        let n = normalizer();
        assert_eq!(
            n.normalize("setValue", vec![json!("t"), json!("c"), json!({"theme": "dark"})]),
            Some(json!({"table": "t", "column": "c", "value": {"theme": "dark"}}))
        );
    }

    #[test]
    fn test_object_past_the_last_slot_is_options() {
        let n = normalizer();
        assert_eq!(
            n.normalize(
                "setValue",
                vec![json!("t"), json!("c"), json!({"theme": "dark"}), json!({"where": "id = 1"})]
            ),
            Some(json!({"table": "t", "column": "c", "value": {"theme": "dark"}, "where": "id = 1"}))
        );
    }

    #[test]
    fn test_extra_positional_args_are_ignored() {
        let n = normalizer();
        assert_eq!(
            n.normalize("createIndex", vec![json!("t"), json!(["a"]), json!("extra")]),
            Some(json!({"table": "t", "columns": ["a"]}))
        );
    }

    #[test]
    fn test_array_wrap_with_options() {
        let n = normalizer();
        assert_eq!(
            n.normalize("execute", vec![json!(["a"]), json!({"statements": ["b"], "isolation": "serializable"})]),
            Some(json!({"statements": ["b"], "isolation": "serializable"}))
        );
    }

    #[test]
    fn test_single_key_with_options() {
        let n = normalizer();
        assert_eq!(
            n.normalize("count", vec![json!("orders"), json!({"where": "total > 0"})]),
            Some(json!({"table": "orders", "where": "total > 0"}))
        );
        assert_eq!(
            n.normalize("count", vec![json!("orders"), json!("ignored")]),
            Some(json!({"table": "orders"}))
        );
    }

    #[test]
    fn test_unmapped_multi_args_return_first() {
        let n = normalizer();
        assert_eq!(n.normalize("unknown", vec![json!("a"), json!("b")]), Some(json!("a")));
    }

    #[test]
    fn test_standard_tables() {
        let n = Normalizer::standard();
        assert_eq!(n.array_wrap("execute"), Some("statements"));
        assert_eq!(
            n.normalize("find", vec![json!("events"), json!({"kind": "click"})]),
            Some(json!({"collection": "events", "filter": {"kind": "click"}}))
        );
        assert_eq!(
            n.normalize("find", vec![json!("events"), json!({"filter": {"kind": "click"}, "limit": 5})]),
            Some(json!({"collection": "events", "filter": {"kind": "click"}, "limit": 5}))
        );
    }
}
