//! Channel name expansion.
//!
//! Target applications are configured by a short identifier; the pipe
//! they listen on follows a fixed naming rule. Expansion is pure string
//! manipulation so it can be checked without any I/O.

/// Default pipe namespace prefix.
pub const DEFAULT_CHANNEL_PREFIX: &str = r"\\.\pipe\";

/// Suffix every request pipe carries.
pub const REQUEST_SUFFIX: &str = "_MCP_Request";

/// Expand an application identifier using the default prefix.
///
/// - `"MyApp"` → `"\\.\pipe\MyApp_MCP_Request"`
/// - `"MyApp_MCP_Request"` → `"\\.\pipe\MyApp_MCP_Request"`
/// - `"\\.\pipe\MyApp"` → `"\\.\pipe\MyApp"`
pub fn canonical_channel_name(identifier: &str) -> String {
    expand_channel_name(identifier, DEFAULT_CHANNEL_PREFIX)
}

/// Expand an application identifier using `prefix`.
///
/// A name already starting with `prefix` (or with `\\`, i.e. any UNC pipe
/// path) is fully qualified and returned verbatim.
pub fn expand_channel_name(identifier: &str, prefix: &str) -> String {
    let name = identifier.trim();

    if is_fully_qualified(name, prefix) {
        return name.to_string();
    }

    if name.ends_with(REQUEST_SUFFIX) {
        format!("{prefix}{name}")
    } else {
        format!("{prefix}{name}{REQUEST_SUFFIX}")
    }
}

fn is_fully_qualified(name: &str, prefix: &str) -> bool {
    (!prefix.is_empty() && name.starts_with(prefix)) || name.starts_with(r"\\")
}

// ─── Tests ───────────────────────────────────────────────────────────────────
