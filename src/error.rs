use crate::http_probe::report;

/// Problems detected while building an `HttpResponse` input.
///
/// These are fatal: the input refuses to start probing.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no URLs configured")]
    NoUrls,
    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid HTTP method {0:?}")]
    InvalidMethod(String),
    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error("header {0:?} is configured more than once")]
    ConflictingHeader(String),
    #[error("failed to compile regular expression {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("response timeout must be a positive number of seconds, got {0}")]
    InvalidTimeout(f64),
    #[error("failed to list network interfaces: {0}")]
    InterfaceLookup(#[source] std::io::Error),
    #[error("network interface {0:?} not found")]
    UnknownInterface(String),
    #[error("network interface {interface:?} has no {family} address")]
    NoInterfaceAddress {
        interface: String,
        family: &'static str,
    },
    #[error("failed to read TLS file {path:?}: {source}")]
    TlsFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("tls_cert and tls_key must be set together")]
    IncompleteTlsIdentity,
    #[error("TLS option {0:?} is not supported")]
    UnsupportedTlsOption(&'static str),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("failed to read config file {path:?}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML in config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A request that never produced a usable HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("dns error: {0}")]
    Dns(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connection(String),
}

// Markers found in the source chain of resolver failures. hyper-util does not
// expose its resolver error type, so the rendered chain is all we can inspect.
const DNS_MARKERS: &[&str] = &[
    "dns error",
    "failed to lookup address",
    "name or service not known",
    "nodename nor servname",
    "no such host",
    "temporary failure in name resolution",
];

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let chain = report(&err);
        if err.is_timeout() {
            return TransportError::Timeout(chain);
        }
        let lowered = chain.to_lowercase();
        if err.is_connect() && DNS_MARKERS.iter().any(|m| lowered.contains(m)) {
            return TransportError::Dns(chain);
        }
        TransportError::Connection(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_error_mentions_regex() {
        let source = regex::Regex::new("bad regex:[[").unwrap_err();
        let err = ConfigError::InvalidPattern {
            pattern: "bad regex:[[".to_string(),
            source,
        };
        assert!(
            err.to_string()
                .contains("failed to compile regular expression")
        );
    }

    #[test]
    fn transport_error_display_names_kind() {
        assert!(TransportError::Dns("x".into()).to_string().starts_with("dns error"));
        assert!(TransportError::Timeout("x".into()).to_string().starts_with("timeout"));
        assert!(
            TransportError::Connection("x".into())
                .to_string()
                .starts_with("connection failed")
        );
    }
}
