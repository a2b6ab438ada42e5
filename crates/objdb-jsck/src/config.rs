//! Checker configuration, mirroring the `check` CLI's flags (design doc §6).

use std::collections::BTreeMap;

use objdb::schema::Schema;

/// Configuration for a single [`crate::check`] run.
#[derive(Debug, Clone)]
pub struct JsckConfig {
    /// Apply fixes as issues are found, instead of only reporting them.
    pub repair: bool,
    /// Stop scanning once this many issues have been recorded.
    pub limit: usize,
    /// Garbage-collect schema versions with no live or historical object
    /// once the scan completes cleanly.
    pub gc_schemas: bool,
    /// Schema definitions to use in place of whatever is recorded on disk
    /// under the given version, for recovering from corrupted schema XML.
    pub force_schemas: BTreeMap<u32, Schema>,
    /// Treat the database as having this format version instead of reading
    /// (and validating) the stored one.
    pub force_format_version: Option<u32>,
}

impl JsckConfig {
    pub fn new() -> Self {
        JsckConfig {
            repair: false,
            limit: usize::MAX,
            gc_schemas: false,
            force_schemas: BTreeMap::new(),
            force_format_version: None,
        }
    }
}

impl Default for JsckConfig {
    fn default() -> Self {
        JsckConfig::new()
    }
}
