//! Property Manager identifier prefixes
//!
//! PAPI accepts identifiers both with and without their type prefix
//! (`prp_123` and `123`). Everything inside this crate works with the
//! prefixed form so that comparisons are not fooled by spelling.

/// Prefix for property ids
pub const PROPERTY_PREFIX: &str = "prp_";
/// Prefix for contract ids
pub const CONTRACT_PREFIX: &str = "ctr_";
/// Prefix for group ids
pub const GROUP_PREFIX: &str = "grp_";
/// Prefix for edge hostname ids
pub const EDGE_HOSTNAME_PREFIX: &str = "ehn_";

/// Add `prefix` to `id` unless it is already there
pub fn add_prefix(id: &str, prefix: &str) -> String {
    let id = id.trim();
    if id.starts_with(prefix) {
        id.to_string()
    } else {
        format!("{prefix}{id}")
    }
}

/// Strip `prefix` from `id` when present
pub fn strip_prefix<'a>(id: &'a str, prefix: &str) -> &'a str {
    id.trim().strip_prefix(prefix).unwrap_or(id.trim())
}

/// Normalize an edge hostname id to its `ehn_` form
pub fn edge_hostname_id(id: &str) -> String {
    add_prefix(id, EDGE_HOSTNAME_PREFIX)
}
