use crate::attributes::ShellRuntimeConfig;
use crate::request::InvocationRequest;

/// Reserved request header that replaces the static arguments for one invocation.
pub const ARGUMENTS_HEADER: &str = "X-Shell-Arguments";

/// Effective argument string for `request`.
///
/// A present override header wins outright, even when its value is empty.
pub fn resolve<'a>(config: &'a ShellRuntimeConfig, request: &'a InvocationRequest) -> &'a str {
    request
        .header(ARGUMENTS_HEADER)
        .unwrap_or_else(|| config.static_arguments())
}
