//! Request Builder (§4.6) and Dispatch Engine (§4.7): turns an
//! operation invocation into one or more wire requests and drives their
//! execution, retry, and response decoding.

pub mod builder;
pub mod engine;

pub use builder::{BuiltRequest, build_request, extract_forwarded_headers};
pub use engine::{DispatchInput, send};
