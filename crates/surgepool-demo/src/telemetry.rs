//! Log output for the demo.
//!
//! Everything is written to stdout through a pretty `fmt` layer. The level
//! filter comes from `RUST_LOG` and defaults to `info`, which shows pool
//! events and the shutdown report. Use `RUST_LOG=surgepool=trace` to also
//! see each worker start and stop.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .pretty(),
        )
        .try_init()?;

    Ok(())
}
