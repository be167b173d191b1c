//! Code mode: the tool registry exposed as a callable, per-group API.
//!
//! Registry tools are classified by group, given camel-case method names,
//! overlaid with aliases and wrapped so that call-site arguments are
//! normalized before they reach the handler:
//!
//! ```text
//! pg_read_query   (core)          -> pg.core.readQuery(sql)   also pg.readQuery
//! pg_doc_find     (docstore)      -> pg.docstore.find(collection, filter)
//! pg_transaction_execute          -> pg.transactions.execute([...]) also pg.transaction
//! ```
//!
//! Everything here is built once and immutable afterwards; the only
//! suspension point is the handler call itself.

pub mod aliases;
pub mod api;
pub mod bindings;
pub mod groups;
pub mod naming;
pub mod normalize;
pub mod usage;

pub use aliases::AliasEntry;
pub use api::{BoundMethod, CodeModeApi, CodeModeApiBuilder, GroupApi, build_group_api};
pub use bindings::{GroupHelp, SandboxBindings, TopLevelHelp};
pub use groups::{GroupedTools, classify};
pub use naming::resolve_method_name;
pub use normalize::{Normalizer, PositionalParams};
