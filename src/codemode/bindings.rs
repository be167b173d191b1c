//! Sandbox-facing bindings: group APIs, promoted top-level methods and
//! `help()` at every level.

use super::aliases::is_useful_alias;
use super::api::{BoundMethod, CodeModeApi, GroupApi};
use super::usage::{self, SANDBOX_ROOT, USAGE};
use crate::error::{Result, ToolError};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Methods callable without a group qualifier: `(name, group, method)`.
const PROMOTIONS: &[(&str, &str, &str)] = &[
    ("readQuery", "core", "readQuery"),
    ("writeQuery", "core", "writeQuery"),
    ("listTables", "core", "listTables"),
    ("describeTable", "core", "describeTable"),
    ("transaction", "transactions", "execute"),
];

#[derive(Debug, Clone, Serialize)]
pub struct GroupHelp {
    pub group: String,
    pub methods: Vec<String>,
    pub aliases: Vec<String>,
    pub examples: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopLevelHelp {
    pub groups: BTreeMap<String, Vec<String>>,
    pub top_level: Vec<String>,
    pub usage: &'static str,
}

/// The object handed to the sandbox.
#[derive(Debug)]
pub struct SandboxBindings {
    api: CodeModeApi,
    top_level: Vec<(String, Arc<BoundMethod>)>,
}

impl SandboxBindings {
    /// Attach promotions; a promotion whose target is missing is skipped.
    pub fn build(api: CodeModeApi) -> Self {
        let top_level = PROMOTIONS
            .iter()
            .filter_map(|&(name, group, method)| match api.get(group, method) {
                Some(bound) => Some((name.to_string(), Arc::clone(bound))),
                None => {
                    debug!(name, group, method, "Skipping promotion without target");
                    None
                }
            })
            .collect();

        Self { api, top_level }
    }

    pub fn api(&self) -> &CodeModeApi {
        &self.api
    }

    pub fn top_level(&self, name: &str) -> Option<&Arc<BoundMethod>> {
        self.top_level
            .iter()
            .find(|(promoted, _)| promoted == name)
            .map(|(_, bound)| bound)
    }

    pub fn top_level_names(&self) -> Vec<String> {
        self.top_level.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn group_help(&self, group: &str) -> Option<GroupHelp> {
        self.api.group(group).map(describe_group)
    }

    pub fn help(&self) -> TopLevelHelp {
        TopLevelHelp {
            groups: self
                .api
                .groups()
                .map(|g| (g.group().to_string(), g.method_names().to_vec()))
                .collect(),
            top_level: self.top_level_names(),
            usage: USAGE,
        }
    }

    /// Help for `path`: `help`, `<group>` or `<group>.help`; `None` for the top level.
    pub fn describe(&self, path: Option<&str>) -> Result<Value> {
        let path = path.map(strip_root).unwrap_or("help");
        if path.is_empty() || path == "help" {
            return Ok(serde_json::to_value(self.help())?);
        }

        let group = path.strip_suffix(".help").unwrap_or(path);
        let help = self
            .group_help(group)
            .ok_or_else(|| ToolError::NotFound(path.to_string()))?;
        Ok(serde_json::to_value(help)?)
    }

    /// Dispatch a sandbox call by path: `help`, `<group>.help`,
    /// `<group>.<method>` or a promoted name. A leading `pg.` is ignored.
    #[instrument(skip(self, args), fields(path = %path))]
    pub async fn invoke(&self, path: &str, args: Vec<Value>) -> Result<Value> {
        let path = strip_root(path);

        if path == "help" || path.ends_with(".help") {
            return self.describe(Some(path));
        }

        let bound = match path.split_once('.') {
            Some((group, method)) => self.api.get(group, method),
            None => self.top_level(path),
        }
        .ok_or_else(|| ToolError::NotFound(path.to_string()))?;

        bound.call(args).await
    }
}

fn strip_root(path: &str) -> &str {
    let path = path.trim();
    path.strip_prefix(SANDBOX_ROOT)
        .and_then(|rest| rest.strip_prefix('.'))
        .unwrap_or(path)
}

fn describe_group(api: &GroupApi) -> GroupHelp {
    GroupHelp {
        group: api.group().to_string(),
        methods: api.method_names().to_vec(),
        aliases: api
            .alias_names()
            .iter()
            .filter(|alias| is_useful_alias(api.group(), alias))
            .cloned()
            .collect(),
        examples: usage::examples(api.group()).to_vec(),
    }
}
