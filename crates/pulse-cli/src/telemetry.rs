//! Tracing setup for the deploypulse binary.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Default directives when `RUST_LOG` is unset. The storage and HTTP
/// stacks log per-request detail at info level and drown out the
/// per-repository progress lines, so they start at warn.
fn default_filter(level: Level) -> EnvFilter {
    EnvFilter::new(format!(
        "{},surrealdb=warn,surrealdb_core=warn,reqwest=warn,hyper=warn",
        level.as_str()
    ))
}

/// Install the global subscriber: `RUST_LOG` overrides the defaults,
/// `json` switches to newline-delimited JSON lines for log shippers.
/// Repeated calls are no-ops.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        registry
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init_tracing(false, Level::INFO);
        init_tracing(true, Level::DEBUG);
    }
}
