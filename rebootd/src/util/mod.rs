//! Small helpers shared across the crate.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a global subscriber writing formatted events to `writer`.
///
/// Does nothing if the host process already installed a subscriber.
pub fn register_to_tracing<W>(writer: W, env_filter: EnvFilter)
where
    W: for<'a> fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .try_init();
}
