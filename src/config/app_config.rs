use std::env;

use reqwest::ClientBuilder;
use tracing::info;

use super::probe_config::{Config, TlsConfig};
use crate::error::ConfigError;

pub struct AppConfig {
    pub config: Config,
    pub mimir_endpoint: String,
}

/// Load the application configuration from a YAML file and environment variables.
/// The file is located through the `CONFIG_FILE` environment variable, and the
/// Mimir endpoint through `MIMIR_ENDPOINT`.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let config_file_location =
        env::var("CONFIG_FILE").unwrap_or_else(|_| "config.yml".to_string());
    let config_str =
        std::fs::read_to_string(&config_file_location).map_err(|source| ConfigError::ReadFile {
            path: config_file_location.clone(),
            source,
        })?;

    let config = parse_config(&config_str)?;

    let mimir_endpoint =
        env::var("MIMIR_ENDPOINT").unwrap_or_else(|_| "http://localhost:9009".to_string());
    info!("Using Mimir endpoint: {}", mimir_endpoint);

    Ok(AppConfig {
        config,
        mimir_endpoint,
    })
}

pub fn parse_config(config_str: &str) -> Result<Config, ConfigError> {
    Ok(serde_yaml::from_str(config_str)?)
}

/// Apply the TLS settings of a probe to a client builder.
/// The builder comes back ready to produce a transport for both `http` and
/// `https` targets.
pub fn setup_tls(builder: ClientBuilder, tls: &TlsConfig) -> Result<ClientBuilder, ConfigError> {
    // rustls takes SNI from the request URL and reqwest offers no override.
    if tls.server_name.is_some() {
        return Err(ConfigError::UnsupportedTlsOption("server_name"));
    }

    let mut builder = builder.danger_accept_invalid_certs(tls.insecure_skip_verify);
    if let Some(path) = &tls.tls_ca {
        let pem = read_tls_file(path)?;
        builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
    }

    match (&tls.tls_cert, &tls.tls_key) {
        (Some(cert), Some(key)) => {
            let mut pem = read_tls_file(cert)?;
            pem.push(b'\n');
            pem.extend(read_tls_file(key)?);
            builder = builder.identity(reqwest::Identity::from_pem(&pem)?);
        }
        (None, None) => {}
        _ => return Err(ConfigError::IncompleteTlsIdentity),
    }
    Ok(builder)
}

fn read_tls_file(path: &str) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path).map_err(|source| ConfigError::TlsFile {
        path: path.to_string(),
        source,
    })
}
