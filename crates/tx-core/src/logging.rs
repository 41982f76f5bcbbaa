//! `tracing` subscriber setup for the relay.
//!
//! Console output always; a daily-rotated file under `logging.dir` when one is
//! configured, written as plain text or JSON lines. `RUST_LOG` wins over the
//! configured level.

use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Install the global subscriber. Call once, before the first log line.
///
/// The file is named `<module_name>.<date>` inside `dir`.
pub fn init_logging(cfg: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));

    let console = fmt::layer().with_target(true).with_thread_ids(true);

    let file = cfg.dir.as_deref().map(|dir| {
        let writer = tracing_appender::rolling::daily(dir, &cfg.module_name);
        let layer = fmt::layer().with_writer(writer).with_ansi(false).with_target(true);
        if cfg.json { layer.json().boxed() } else { layer.boxed() }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();
}
