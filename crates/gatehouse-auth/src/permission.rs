//! Permission strings and wildcard-prefix matching.
//!
//! A permission is `"<namespace>:<verb>:<target_id>"`, `"<namespace>:*"`,
//! or the global `"*"`. The two namespaces are `mcp` and `a2a`; verbs are
//! method groups such as `tools.call`, `message`, or `task`.

/// Check whether a set of held permissions satisfies a required one.
///
/// Rules, in order:
/// 1. `"*"` held grants everything.
/// 2. An exact match grants.
/// 3. A held permission ending in `":*"` grants any required string that
///    starts with the held prefix including the final colon, so
///    `"a2a:*"` grants `"a2a:task:agent-7"` but not `"a2ax:task:x"`.
#[must_use]
pub fn has_permission(held: &[String], required: &str) -> bool {
    if held.iter().any(|h| h == "*") {
        return true;
    }
    if held.iter().any(|h| h == required) {
        return true;
    }
    held.iter().any(|h| {
        h.strip_suffix('*')
            .is_some_and(|prefix| prefix.ends_with(':') && required.starts_with(prefix))
    })
}

/// Derive the MCP method group: the first two `/`-separated components of
/// the method, joined with a dot. `tools/call` becomes `tools.call`;
/// single-component methods like `ping` stay as-is.
#[must_use]
pub fn mcp_method_group(method: &str) -> String {
    let mut parts = method.split('/');
    match (parts.next(), parts.next()) {
        (Some(first), Some(second)) => format!("{first}.{second}"),
        (Some(first), None) => first.to_owned(),
        (None, _) => String::new(),
    }
}

/// The required permission for an MCP call.
#[must_use]
pub fn mcp_required(method: &str, connector_id: &str) -> String {
    format!("mcp:{}:{connector_id}", mcp_method_group(method))
}

/// Derive the A2A permission kind for a method. Returns `None` for
/// methods outside the dialect.
#[must_use]
pub fn a2a_kind(method: &str) -> Option<&'static str> {
    match method {
        "message/send" => Some("message"),
        "tasks/send" | "tasks/get" | "tasks/cancel" | "tasks/list" => Some("task"),
        _ => None,
    }
}

/// The required permission for an A2A call of the given kind.
#[must_use]
pub fn a2a_required(kind: &str, agent_id: &str) -> String {
    format!("a2a:{kind}:{agent_id}")
}
