use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use docdesk::LogFormat;

const DEFAULT_FILTER: &str = "info,docdesk=info,docdesk_server=info,tower_http=warn";

/// Installs the global subscriber, then routes `log` records into it.
/// Override the filter with `RUST_LOG`.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Text => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().with_target(true)))
        }
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_current_span(true)),
        ),
    };
    if let Err(e) = installed {
        eprintln!("tracing subscriber already installed: {}", e);
        return;
    }

    if let Err(e) = tracing_log::LogTracer::init() {
        tracing::warn!("log bridge not installed: {}", e);
    }
}
