//! Tracing subscriber setup shared by the binaries.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over `default_filter`. `log` records from dependencies are
/// bridged into tracing. Returns `false` if a subscriber was already
/// installed, in which case nothing changes.
pub fn init_tracing(default_filter: &str, json: bool) -> bool {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return false;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let format_layer: Box<dyn Layer<Registry> + Send + Sync> = if json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let subscriber = Registry::default().with(format_layer).with(filter);

    // Fails only if another logger already owns the `log` facade.
    let _ = tracing_log::LogTracer::init();

    tracing::subscriber::set_global_default(subscriber).is_ok()
}
