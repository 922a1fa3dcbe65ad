use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use regex::bytes::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use tracing::{debug, info};

use super::address::split_url_zone;
use super::client::{ProbeRequest, RequestBody, RequestExecutor, ReqwestExecutor};
use super::emit::{RecordSettings, emit};
use super::probe::{BodyPolicy, execute_probe};
use super::result::{Assertions, classify};
use crate::accumulator::Accumulator;
use crate::config::{HttpResponseConfig, Secret};
use crate::error::ConfigError;

/// One configured URL and the client dedicated to it.
struct Target {
    /// The URL exactly as configured; reported as the `server` tag.
    server: String,
    url: Url,
    executor: Arc<dyn RequestExecutor>,
}

/// The `http_response` input: probes every configured URL once per
/// [`gather`](HttpResponse::gather) and records one result per URL.
pub struct HttpResponse {
    config: HttpResponseConfig,
    method: Method,
    headers: HeaderMap,
    body: RequestBody,
    basic_auth: Option<(Secret, Secret)>,
    string_match: Option<Regex>,
    targets: Vec<Target>,
}

impl HttpResponse {
    /// Validate `config` and build one client per URL.
    pub fn new(config: HttpResponseConfig) -> Result<Self, ConfigError> {
        let timeout = response_timeout(config.response_timeout_seconds)?;
        Self::build(config, |url, config| {
            let executor: Arc<dyn RequestExecutor> =
                Arc::new(ReqwestExecutor::new(url, config, timeout)?);
            Ok(executor)
        })
    }

    /// Validate `config` and route every URL through `executor`.
    pub fn with_executor(
        config: HttpResponseConfig,
        executor: Arc<dyn RequestExecutor>,
    ) -> Result<Self, ConfigError> {
        response_timeout(config.response_timeout_seconds)?;
        Self::build(config, |_, _| Ok(executor.clone()))
    }

    fn build(
        mut config: HttpResponseConfig,
        mut make_executor: impl FnMut(
            &str,
            &HttpResponseConfig,
        ) -> Result<Arc<dyn RequestExecutor>, ConfigError>,
    ) -> Result<Self, ConfigError> {
        if config.urls.is_empty() {
            return Err(ConfigError::NoUrls);
        }

        config.response_string_match = config.response_string_match.filter(|s| !s.is_empty());
        config.response_body_field = config.response_body_field.filter(|s| !s.is_empty());

        let method = parse_method(&config.method)?;
        let headers = build_headers(&config)?;
        let string_match = config
            .response_string_match
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .transpose()?;
        let body = request_body(&config);
        let basic_auth = match (&config.username, &config.password) {
            (Some(username), Some(password)) => Some((username.clone(), password.clone())),
            _ => None,
        };

        let targets = config
            .urls
            .iter()
            .map(|server| {
                let (parseable, _zone) = split_url_zone(server);
                let url = Url::parse(&parseable).map_err(|source| ConfigError::InvalidUrl {
                    url: server.clone(),
                    source,
                })?;
                Ok(Target {
                    server: server.clone(),
                    url,
                    executor: make_executor(server, &config)?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        info!(
            "Probing {} target(s) with {} (timeout {}s, follow redirects: {})",
            targets.len(),
            config.method,
            config.response_timeout_seconds,
            config.follow_redirects
        );

        Ok(Self {
            config,
            method,
            headers,
            body,
            basic_auth,
            string_match,
            targets,
        })
    }

    /// Probe every target once, concurrently, writing one record per target.
    ///
    /// Per-target failures become records; nothing is returned to the caller.
    pub async fn gather(&self, acc: &dyn Accumulator) {
        join_all(self.targets.iter().map(|target| self.probe(target, acc))).await;
    }

    async fn probe(&self, target: &Target, acc: &dyn Accumulator) {
        let request = ProbeRequest {
            method: self.method.clone(),
            url: target.url.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
            basic_auth: self.basic_auth.clone(),
        };
        let policy = BodyPolicy {
            max_size: self.config.response_body_max_size,
            decode: self.config.response_body_field.is_some(),
        };

        let outcome = execute_probe(target.executor.as_ref(), request, policy).await;

        let assertions = Assertions {
            status_code: self.config.response_status_code,
            string_match: self.string_match.as_ref(),
        };
        let classification = classify(&outcome, &assertions);
        debug!("{} -> {}", target.server, classification.result_type);

        let settings = RecordSettings {
            method: &self.config.method,
            header_tags: &self.config.http_header_tags,
            body_field: self.config.response_body_field.as_deref(),
        };
        emit(acc, &target.server, &settings, &outcome, &classification);
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().map(|t| t.server.as_str())
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("urls", &self.config.urls)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

fn response_timeout(seconds: f64) -> Result<Duration, ConfigError> {
    if seconds.is_finite() && seconds > 0.0 {
        Ok(Duration::from_secs_f64(seconds))
    } else {
        Err(ConfigError::InvalidTimeout(seconds))
    }
}

fn parse_method(method: &str) -> Result<Method, ConfigError> {
    let upper = method.trim().to_uppercase();
    if upper.is_empty() {
        return Err(ConfigError::InvalidMethod(method.to_string()));
    }
    Method::from_bytes(upper.as_bytes()).map_err(|_| ConfigError::InvalidMethod(method.to_string()))
}

fn build_headers(config: &HttpResponseConfig) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        let header = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            ConfigError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            }
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidHeader {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        if headers.contains_key(&header) {
            return Err(ConfigError::ConflictingHeader(name.clone()));
        }
        headers.insert(header, value);
    }
    Ok(headers)
}

fn request_body(config: &HttpResponseConfig) -> RequestBody {
    if !config.body_form.is_empty() {
        let pairs = config
            .body_form
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |v| (key.clone(), v.clone())))
            .collect();
        return RequestBody::Form(pairs);
    }
    match &config.body {
        Some(body) if !body.is_empty() => RequestBody::Raw(body.clone()),
        _ => RequestBody::Empty,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::accumulator::MemoryAccumulator;
    use crate::error::TransportError;
    use crate::http_probe::probe::tests::FakeExecutor;

    fn config(urls: &[&str]) -> HttpResponseConfig {
        HttpResponseConfig {
            urls: urls.iter().map(|u| u.to_string()).collect(),
            ..Default::default()
        }
    }

    #[derive(Default)]
    struct RecordingExecutor {
        requests: Mutex<Vec<ProbeRequest>>,
    }

    #[async_trait]
    impl RequestExecutor for RecordingExecutor {
        async fn execute(&self, request: ProbeRequest) -> Result<reqwest::Response, TransportError> {
            self.requests.lock().unwrap().push(request);
            Ok(http::Response::builder().status(200).body("").unwrap().into())
        }
    }

    #[test]
    fn rejects_empty_url_list() {
        assert!(matches!(
            HttpResponse::new(config(&[])),
            Err(ConfigError::NoUrls)
        ));
    }

    #[test]
    fn rejects_malformed_url() {
        let err = HttpResponse::new(config(&["http://[::1"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn accepts_zoned_ipv6_url() {
        let executor = Arc::new(FakeExecutor::ok(200, b""));
        let input =
            HttpResponse::with_executor(config(&["http://[fe80::1%25lo]:8080/"]), executor)
                .unwrap();

        assert_eq!(input.urls().collect::<Vec<_>>(), vec!["http://[fe80::1%25lo]:8080/"]);
        assert_eq!(
            input.targets[0].url.host_str(),
            Some("[fe80::1]"),
            "zone is not part of the request URL"
        );
    }

    #[tokio::test]
    async fn zoned_url_keeps_literal_server_tag() {
        let executor = Arc::new(RecordingExecutor::default());
        let input = HttpResponse::with_executor(
            config(&["http://[fe80::1%25eth0]/health"]),
            executor.clone(),
        )
        .unwrap();
        let acc = MemoryAccumulator::new();
        input.gather(&acc).await;

        assert_eq!(
            acc.tag_value("http_response", "server").as_deref(),
            Some("http://[fe80::1%25eth0]/health")
        );
        assert_eq!(
            executor.requests.lock().unwrap()[0].url.as_str(),
            "http://[fe80::1]/health"
        );
    }

    #[test]
    fn rejects_bad_regex() {
        let cfg = HttpResponseConfig {
            response_string_match: Some("bad regex:[[".to_string()),
            ..config(&["http://127.0.0.1/good"])
        };
        let err = HttpResponse::new(cfg).unwrap_err();
        assert!(err.to_string().contains("failed to compile regular expression"));
    }

    #[test]
    fn rejects_conflicting_headers() {
        let cfg = HttpResponseConfig {
            headers: BTreeMap::from([
                ("Host".to_string(), "a".to_string()),
                ("host".to_string(), "b".to_string()),
            ]),
            ..config(&["http://127.0.0.1/"])
        };
        assert!(matches!(
            HttpResponse::new(cfg),
            Err(ConfigError::ConflictingHeader(_))
        ));
    }

    #[test]
    fn rejects_invalid_method_and_timeout() {
        let cfg = HttpResponseConfig {
            method: "GE T".to_string(),
            ..config(&["http://127.0.0.1/"])
        };
        assert!(matches!(HttpResponse::new(cfg), Err(ConfigError::InvalidMethod(_))));

        let cfg = HttpResponseConfig {
            response_timeout_seconds: 0.0,
            ..config(&["http://127.0.0.1/"])
        };
        assert!(matches!(HttpResponse::new(cfg), Err(ConfigError::InvalidTimeout(_))));
    }

    #[tokio::test]
    async fn dns_failure_is_recorded_not_raised() {
        let executor = Arc::new(FakeExecutor::Fail(TransportError::Dns("DNS error".into())));
        let input =
            HttpResponse::with_executor(config(&["https://nonexistent.nonexistent"]), executor)
                .unwrap();

        let acc = MemoryAccumulator::new();
        input.gather(&acc).await;

        assert_eq!(acc.len(), 1);
        assert_eq!(
            acc.string_field("http_response", "result_type").as_deref(),
            Some("dns_error")
        );
        assert_eq!(acc.int_field("http_response", "result_code"), Some(5));
        assert_eq!(
            acc.tag_value("http_response", "server").as_deref(),
            Some("https://nonexistent.nonexistent")
        );
        for absent in [
            "http_response_code",
            "response_time",
            "content_length",
            "response_string_match",
        ] {
            assert!(!acc.has_field("http_response", absent), "{absent}");
        }
        assert!(!acc.has_tag("http_response", "status_code"));
    }

    #[tokio::test]
    async fn string_match_runs_on_undecodable_body() {
        let executor = Arc::new(FakeExecutor::ok(200, b"ok\xff"));
        let cfg = HttpResponseConfig {
            response_string_match: Some("ok".to_string()),
            ..config(&["http://probe.test/"])
        };
        let input = HttpResponse::with_executor(cfg, executor).unwrap();
        let acc = MemoryAccumulator::new();
        input.gather(&acc).await;

        assert_eq!(
            acc.string_field("http_response", "result_type").as_deref(),
            Some("success")
        );
        assert_eq!(acc.int_field("http_response", "response_string_match"), Some(1));
        assert_eq!(acc.int_field("http_response", "content_length"), Some(3));
    }

    #[tokio::test]
    async fn one_record_per_target() {
        let executor = Arc::new(FakeExecutor::ok(200, b"ok"));
        let input = HttpResponse::with_executor(
            config(&["http://a.test/", "http://b.test/", "http://c.test/"]),
            executor,
        )
        .unwrap();

        let acc = MemoryAccumulator::new();
        input.gather(&acc).await;

        let mut servers: Vec<_> = acc
            .metrics()
            .into_iter()
            .map(|m| m.tags["server"].clone())
            .collect();
        servers.sort();
        assert_eq!(servers, vec!["http://a.test/", "http://b.test/", "http://c.test/"]);
    }

    #[tokio::test]
    async fn builds_request_from_config() {
        let executor = Arc::new(RecordingExecutor::default());
        let cfg = HttpResponseConfig {
            method: "post".to_string(),
            headers: BTreeMap::from([("Host".to_string(), "Hello".to_string())]),
            body: Some("ignored".to_string()),
            body_form: BTreeMap::from([
                ("test".to_string(), vec!["42".to_string()]),
                (
                    "list".to_string(),
                    vec!["foobar".to_string(), "fizbuzz".to_string()],
                ),
            ]),
            username: Some(Secret::from("me")),
            password: Some(Secret::from("mypassword")),
            ..config(&["http://probe.test/form"])
        };
        let input = HttpResponse::with_executor(cfg, executor.clone()).unwrap();
        let acc = MemoryAccumulator::new();
        input.gather(&acc).await;

        let requests = executor.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.headers["host"], "Hello");
        assert_eq!(
            request.body,
            RequestBody::Form(vec![
                ("list".to_string(), "foobar".to_string()),
                ("list".to_string(), "fizbuzz".to_string()),
                ("test".to_string(), "42".to_string()),
            ])
        );
        let (username, password) = request.basic_auth.as_ref().unwrap();
        assert_eq!((username.expose(), password.expose()), ("me", "mypassword"));
        assert_eq!(acc.tag_value("http_response", "method").as_deref(), Some("post"));
    }

    #[tokio::test]
    async fn username_alone_sends_no_credentials() {
        let executor = Arc::new(RecordingExecutor::default());
        let cfg = HttpResponseConfig {
            username: Some(Secret::from("me")),
            ..config(&["http://probe.test/"])
        };
        let input = HttpResponse::with_executor(cfg, executor.clone()).unwrap();
        input.gather(&MemoryAccumulator::new()).await;
        assert!(executor.requests.lock().unwrap()[0].basic_auth.is_none());
    }

    #[tokio::test]
    async fn header_tags_skip_absent_headers() {
        let executor = Arc::new(FakeExecutor::Reply {
            status: 200,
            body: b"hit the good page!",
            headers: vec![("Server", "MyTestServer")],
        });
        let cfg = HttpResponseConfig {
            http_header_tags: [
                ("Server".to_string(), "my_server".to_string()),
                ("Content-Type".to_string(), "content_type".to_string()),
            ]
            .into(),
            ..config(&["http://probe.test/good"])
        };
        let input = HttpResponse::with_executor(cfg, executor).unwrap();
        let acc = MemoryAccumulator::new();
        input.gather(&acc).await;

        assert_eq!(
            acc.tag_value("http_response", "my_server").as_deref(),
            Some("MyTestServer")
        );
        assert!(!acc.has_tag("http_response", "content_type"));
    }
}
