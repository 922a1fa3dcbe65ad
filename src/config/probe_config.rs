use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use super::secret::Secret;

/// An organisation configuration for the oxyprobe service.
/// Contains the organisation ID, the polling interval in seconds, and the
/// HTTP response probe settings applied to all of its targets.
#[derive(Debug, Clone, Deserialize)]
pub struct OrganisationConfig {
    /// The organisation ID for which this configuration applies.
    /// This translates to the 'X-Scope-OrgID' header in the Mimir requests.
    pub organisation_id: String,

    /// The polling interval in seconds.
    pub polling_interval_seconds: u64,

    /// Probe settings for this organisation's targets.
    pub http_response: HttpResponseConfig,
}

/// Settings of one `http_response` input.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpResponseConfig {
    /// Target URLs; one client is built per URL.
    pub urls: Vec<String>,

    /// Request method, sent upper-cased and tagged as written.
    pub method: String,

    /// Request headers. `Host` overrides the request's host.
    pub headers: BTreeMap<String, String>,

    /// Raw request body.
    pub body: Option<String>,

    /// Form fields, URL-encoded as the body. Takes precedence over `body`.
    pub body_form: BTreeMap<String, Vec<String>>,

    pub username: Option<Secret>,
    pub password: Option<Secret>,

    /// Deadline covering connect, TLS handshake, headers and body.
    pub response_timeout_seconds: f64,

    pub follow_redirects: bool,

    /// Field name under which the full response body is emitted.
    pub response_body_field: Option<String>,

    /// Maximum number of body bytes read; unbounded when unset.
    pub response_body_max_size: Option<usize>,

    /// Regular expression the body must match.
    pub response_string_match: Option<String>,

    /// Status code the response must carry.
    pub response_status_code: Option<u16>,

    /// Outgoing network interface.
    pub interface: Option<String>,

    /// Response header name to tag name.
    pub http_header_tags: HashMap<String, String>,

    pub tls: TlsConfig,
}

impl Default for HttpResponseConfig {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            method: default_method(),
            headers: BTreeMap::new(),
            body: None,
            body_form: BTreeMap::new(),
            username: None,
            password: None,
            response_timeout_seconds: default_timeout_seconds(),
            follow_redirects: false,
            response_body_field: None,
            response_body_max_size: None,
            response_string_match: None,
            response_status_code: None,
            interface: None,
            http_header_tags: HashMap::new(),
            tls: TlsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Skip certificate and hostname verification.
    pub insecure_skip_verify: bool,

    /// Path to an additional PEM encoded root certificate.
    pub tls_ca: Option<String>,

    /// PEM client certificate presented to the server. Requires `tls_key`.
    pub tls_cert: Option<String>,

    /// PEM private key of `tls_cert`.
    pub tls_key: Option<String>,

    /// Name sent as SNI and verified instead of the URL host. Not supported
    /// by the TLS backend; setting it fails initialization.
    pub server_name: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_timeout_seconds() -> f64 {
    5.0
}

pub type Config = HashMap<String, OrganisationConfig>;
