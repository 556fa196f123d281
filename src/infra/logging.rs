use crate::infra::config::{LogConfig, LogFormat};
use anyhow::anyhow;
use tracing_subscriber::{filter::EnvFilter, FmtSubscriber};

/// Crates whose events pass the configured level. Everything else stays at `warn`.
const TARGET_CRATES: &[&str] = &["doc_notary", "preflight"];

/// Installs the global subscriber. `RUST_LOG`, when set, overrides `LOG_LEVEL`.
pub fn init(cfg: &LogConfig) -> anyhow::Result<()> {
    let filter = build_filter(&cfg.level)?;

    let builder = FmtSubscriber::builder()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(enable_ansi());

    let installed = match cfg.format {
        LogFormat::Plain => tracing::subscriber::set_global_default(builder.finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    };
    installed.map_err(|e| anyhow!("failed to install log subscriber: {}", e))
}

fn enable_ansi() -> bool {
    use std::io::IsTerminal;
    std::io::stderr().is_terminal()
}

pub fn default_directive(level: &str) -> String {
    let mut parts = vec!["warn".to_string()];
    parts.extend(TARGET_CRATES.iter().map(|c| format!("{}={}", c, level)));
    parts.join(",")
}

fn build_filter(level: &str) -> anyhow::Result<EnvFilter> {
    if let Ok(from_env) = EnvFilter::try_from_default_env() {
        return Ok(from_env);
    }
    EnvFilter::try_new(default_directive(level))
        .map_err(|e| anyhow!("LOG_LEVEL '{}' is not a valid filter: {}", level, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_scopes_level_to_our_crates() {
        assert_eq!(
            default_directive("debug"),
            "warn,doc_notary=debug,preflight=debug"
        );
    }
}
