//! Utilities for managing network namespaces

/// Create a named network namespace
#[must_use]
pub fn netns_add(namespace: &str) -> String {
    format!("ip netns add {namespace}")
}

/// Delete a named network namespace, along with every link inside it
#[must_use]
pub fn netns_del(namespace: &str) -> String {
    format!("ip netns del {namespace}")
}

/// Argument vector that runs a shell command inside a namespace.
///
/// This is an argv and not a single string so the command itself never needs quoting.
#[must_use]
pub fn exec_argv<'a>(namespace: &'a str, command: &'a str) -> [&'a str; 6] {
    ["netns", "exec", namespace, "sh", "-c", command]
}
