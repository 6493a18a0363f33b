use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::settings::AppEnvironment;

const DEFAULT_FILTER: &str = "info,sqlx=warn";

/// Installs the global subscriber. `RUST_LOG` overrides the default filter;
/// production logs are emitted as JSON lines.
pub fn init_tracing(env: &AppEnvironment) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match env {
        AppEnvironment::Production => registry.with(fmt::layer().json().with_current_span(true)).try_init(),
        _ => registry.with(fmt::layer().with_target(true)).try_init(),
    };

    if let Err(e) = result {
        eprintln!("tracing subscriber already installed: {e}");
    }
}
