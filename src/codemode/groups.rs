//! Group classification of registry tools.

use crate::tools::ToolDescriptor;
use std::collections::BTreeMap;

/// Descriptors per group, each list in registry order.
pub type GroupedTools = BTreeMap<String, Vec<ToolDescriptor>>;

/// Partition descriptors by their group tag in one pass.
///
/// Lists keep the input order and are not deduplicated.
pub fn classify<'a, I>(descriptors: I) -> GroupedTools
where
    I: IntoIterator<Item = &'a ToolDescriptor>,
{
    let mut grouped = GroupedTools::new();
    for descriptor in descriptors {
        grouped
            .entry(descriptor.group.clone())
            .or_default()
            .push(descriptor.clone());
    }
    grouped
}
