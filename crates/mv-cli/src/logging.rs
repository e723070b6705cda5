use std::io::IsTerminal;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Install the global subscriber. Events go to stderr so stdout carries only
/// prompts and results. `RUST_LOG` overrides the default `warn` filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(std::io::stderr().is_terminal());
    // A second init (e.g. from a test harness) is harmless.
    let _ = Registry::default().with(filter).with(fmt_layer).try_init();
}
