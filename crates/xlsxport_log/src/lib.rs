//! `xlsxport_log`:
//! Process-wide `tracing` subscriber setup shared by binaries and demos.

use tracing_subscriber::EnvFilter;

/// Environment variable consulted for filter directives.
pub const C_ENV_LOG: &str = "RUST_LOG";
/// Directive used when neither the environment nor the caller supplies a valid one.
pub const C_DIRECTIVE_FALLBACK: &str = "info";

/// Build the filter: `env_value` wins when it parses, then `default_directive`,
/// then [`C_DIRECTIVE_FALLBACK`].
pub fn derive_env_filter(env_value: Option<&str>, default_directive: &str) -> EnvFilter {
    env_value
        .filter(|v| !v.trim().is_empty())
        .and_then(|v| EnvFilter::try_new(v).ok())
        .or_else(|| EnvFilter::try_new(default_directive).ok())
        .unwrap_or_else(|| EnvFilter::new(C_DIRECTIVE_FALLBACK))
}

/// Install a formatted stderr subscriber honoring `RUST_LOG`.
///
/// Returns `false` when a global subscriber was already installed, in which
/// case nothing changes.
pub fn init_logging(default_directive: &str) -> bool {
    let env_value = std::env::var(C_ENV_LOG).ok();
    let filter = derive_env_filter(env_value.as_deref(), default_directive);
    let if_installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .is_ok();
    if if_installed {
        tracing::debug!(default_directive, "logging initialized");
    }
    if_installed
}
