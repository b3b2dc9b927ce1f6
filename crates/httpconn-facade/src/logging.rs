//! Structured logging bootstrap. `apps/gproxy` declares `tracing-subscriber`
//! but wires tracing up elsewhere in its bootstrap path; this crate is the
//! library boundary callers embed, so it owns installing the subscriber
//! instead of leaving it to whatever binary links it in.

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber reading its filter from `RUST_LOG`,
/// defaulting to `info` when unset. Safe to call more than once; only the
/// first call takes effect, matching `tracing_subscriber`'s own global-once
/// semantics.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
