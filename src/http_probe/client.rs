use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{ClientBuilder, Method, Url, redirect};
use tracing::debug;

use super::address::{InterfaceNetwork, is_network_ipv6, is_url_ipv6, split_url_zone};
use crate::config::app_config::setup_tls;
use crate::config::{HttpResponseConfig, Secret};
use crate::error::{ConfigError, TransportError};

/// Hop limit when redirects are followed.
pub const MAX_REDIRECTS: usize = 10;

pub const USER_AGENT: &str = concat!("oxyprobe/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Empty,
    Raw(String),
    /// Key/value pairs, URL-encoded in order.
    Form(Vec<(String, String)>),
}

/// One request, rebuilt from configuration on every probe.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub basic_auth: Option<(Secret, Secret)>,
}

/// Executes a probe request and hands back the response with its body unread.
///
/// The production implementation wraps a [`reqwest::Client`]; tests swap in
/// deterministic fakes.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(&self, request: ProbeRequest) -> Result<reqwest::Response, TransportError>;
}

/// A per-target [`reqwest::Client`] with the deadline, TLS, redirect policy and
/// interface binding of its configuration baked in.
#[derive(Clone)]
pub struct ReqwestExecutor {
    client: reqwest::Client,
}

impl ReqwestExecutor {
    /// Build the client for `url`.
    ///
    /// When an interface is configured, or the target carries an IPv6 zone,
    /// the address family of the target picks the binding; an interface
    /// without a matching address is a configuration error. A configured
    /// interface wins over the zone.
    pub fn new(
        url: &str,
        config: &HttpResponseConfig,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let redirect_policy = if config.follow_redirects {
            redirect::Policy::limited(MAX_REDIRECTS)
        } else {
            redirect::Policy::custom(|attempt| attempt.error("redirects are not followed"))
        };

        let builder = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(redirect_policy)
            .user_agent(USER_AGENT);
        let mut builder = setup_tls(builder, &config.tls)?;

        // A zone names the interface of a link-local target.
        let interface = config.interface.clone().or(split_url_zone(url).1);
        if let Some(interface) = &interface {
            builder = bind_interface(builder, interface, is_url_ipv6(url))?;
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl RequestExecutor for ReqwestExecutor {
    async fn execute(&self, request: ProbeRequest) -> Result<reqwest::Response, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);

        if let Some((username, password)) = &request.basic_auth {
            builder = builder.basic_auth(username.expose(), Some(password.expose()));
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Raw(body) => builder.body(body),
            RequestBody::Form(pairs) => builder.form(&pairs),
        };

        Ok(builder.send().await?)
    }
}

impl std::fmt::Debug for ReqwestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestExecutor").finish_non_exhaustive()
    }
}

fn bind_interface(
    builder: ClientBuilder,
    interface: &str,
    target_is_ipv6: bool,
) -> Result<ClientBuilder, ConfigError> {
    let networks = interface_networks(interface)?;

    if target_is_ipv6 {
        let network = networks
            .iter()
            .find(|n| is_network_ipv6(n))
            .ok_or_else(|| ConfigError::NoInterfaceAddress {
                interface: interface.to_string(),
                family: "IPv6",
            })?;
        debug!("Binding IPv6 target to interface {interface} ({})", network.addr);
        return Ok(bind_ipv6(builder, interface, network));
    }

    let addr = networks
        .iter()
        .filter(|n| !is_network_ipv6(n))
        .find_map(|n| match n.addr {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(ip) => ip.to_ipv4_mapped(),
        })
        .ok_or_else(|| ConfigError::NoInterfaceAddress {
            interface: interface.to_string(),
            family: "IPv4",
        })?;
    debug!("Binding IPv4 target to {addr} on interface {interface}");
    Ok(builder.local_address(IpAddr::V4(addr)))
}

// Binding to the device scopes link-local destinations to it, which a bare
// local address cannot express.
#[cfg(any(target_os = "android", target_os = "fuchsia", target_os = "linux"))]
fn bind_ipv6(builder: ClientBuilder, interface: &str, _network: &InterfaceNetwork) -> ClientBuilder {
    builder.interface(interface)
}

#[cfg(not(any(target_os = "android", target_os = "fuchsia", target_os = "linux")))]
fn bind_ipv6(builder: ClientBuilder, _interface: &str, network: &InterfaceNetwork) -> ClientBuilder {
    builder.local_address(network.addr)
}

fn interface_networks(interface: &str) -> Result<Vec<InterfaceNetwork>, ConfigError> {
    let networks: Vec<InterfaceNetwork> = if_addrs::get_if_addrs()
        .map_err(ConfigError::InterfaceLookup)?
        .iter()
        .filter(|i| i.name == interface)
        .map(|i| InterfaceNetwork::from(&i.addr))
        .collect();

    if networks.is_empty() {
        return Err(ConfigError::UnknownInterface(interface.to_string()));
    }
    Ok(networks)
}

/// Name of an up loopback interface that carries an IPv4 address.
#[cfg(test)]
pub(crate) fn loopback_interface() -> Option<String> {
    if_addrs::get_if_addrs()
        .ok()?
        .into_iter()
        .find(|i| i.is_loopback() && matches!(i.addr, if_addrs::IfAddr::V4(_)))
        .map(|i| i.name)
}
