//! Active HTTP(S) response probing.
//!
//! An [`HttpResponse`](http_probe::input::HttpResponse) input owns one client
//! per configured URL. Each [`gather`](http_probe::input::HttpResponse::gather)
//! probes every URL once and writes one `http_response` record per URL into an
//! [`Accumulator`](accumulator::Accumulator), classifying every outcome into a
//! fixed result taxonomy rather than failing.

pub mod accumulator;
pub mod config;
pub mod error;
pub mod http_probe;
pub mod mimir;
pub mod telemetry;

pub use error::{ConfigError, TransportError};
pub use http_probe::input::HttpResponse;
