pub mod app_config;
pub mod probe_config;
pub mod secret;

pub use probe_config::{Config, HttpResponseConfig, OrganisationConfig, TlsConfig};
pub use secret::Secret;
