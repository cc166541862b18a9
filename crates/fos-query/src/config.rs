//! Query runtime configuration

/// Query runtime configuration options
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct QueryConfig {
    /// Only notify collection subscribers when the results actually changed;
    /// otherwise every apply of a collection binding notifies once
    pub emit_distinct_changes_only: bool,

    /// Maximum sub-view nesting followed while collecting results
    pub max_view_depth: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            emit_distinct_changes_only: false,
            max_view_depth: 256,
        }
    }
}
