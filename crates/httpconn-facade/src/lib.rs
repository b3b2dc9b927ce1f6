//! External interface (§6): `Register`/`Invoke`, the raw passthrough
//! `sendHttpRequest` operation, and the response-header-forwarding
//! envelope this crate's callers shouldn't have to assemble by hand.
//!
//! Grounded on `apps/gproxy/src/main.rs`'s `tracing-subscriber`
//! bootstrap and `gproxy-core`'s thin public-facing wrapper around its
//! internal engine modules.

pub mod connector;
pub mod logging;
pub mod passthrough;

pub use connector::Connector;
pub use logging::init_tracing;
pub use passthrough::{build_passthrough_request, send_passthrough};
