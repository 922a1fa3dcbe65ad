use std::time::{Duration, Instant};

use reqwest::header::HeaderMap;
use tracing::debug;

use super::client::{ProbeRequest, RequestExecutor};
use super::report;
use crate::error::TransportError;

/// How the response body is read.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyPolicy {
    /// Maximum number of bytes accepted; `None` reads everything.
    pub max_size: Option<usize>,
    /// Require the body to be valid UTF-8 (needed for capturing it as text).
    pub decode: bool,
}

/// A response whose status, headers and body were all read.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
    pub headers: HeaderMap,
    /// Time from dispatch until the status line and headers arrived.
    pub elapsed: Duration,
    pub body: Vec<u8>,
}

impl ProbeResponse {
    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    /// The body as text; `None` when it is not valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyReadFailure {
    TooLarge { limit: usize },
    InvalidUtf8,
    Read(String),
}

/// Raw outcome of one probe, before classification.
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    Transport(TransportError),
    /// A response arrived but its body could not be trusted. `bytes_read`
    /// counts the prefix read before giving up.
    BodyRead {
        bytes_read: usize,
        failure: BodyReadFailure,
    },
    Response(ProbeResponse),
}

/// Drive one request through `executor` and read the response body.
pub async fn execute_probe(
    executor: &dyn RequestExecutor,
    request: ProbeRequest,
    policy: BodyPolicy,
) -> ProbeOutcome {
    let url = request.url.to_string();

    let start = Instant::now();
    let response = match executor.execute(request).await {
        Ok(response) => response,
        Err(err) => {
            debug!("Probe of {url} failed: {err}");
            return ProbeOutcome::Transport(err);
        }
    };
    let elapsed = start.elapsed();

    let status = response.status().as_u16();
    let headers = response.headers().clone();

    let body = match read_body(response, policy.max_size).await {
        Ok(body) => body,
        Err(BodyError::Timeout(chain)) => {
            debug!("Reading body of {url} timed out: {chain}");
            return ProbeOutcome::Transport(TransportError::Timeout(chain));
        }
        Err(BodyError::Failed { bytes_read, failure }) => {
            debug!("Failed to read body of {url} after {bytes_read} bytes: {failure:?}");
            return ProbeOutcome::BodyRead {
                bytes_read,
                failure,
            };
        }
    };

    if policy.decode && std::str::from_utf8(&body).is_err() {
        debug!("Body of {url} is not valid UTF-8");
        return ProbeOutcome::BodyRead {
            bytes_read: body.len(),
            failure: BodyReadFailure::InvalidUtf8,
        };
    }

    ProbeOutcome::Response(ProbeResponse {
        status,
        headers,
        elapsed,
        body,
    })
}

enum BodyError {
    Timeout(String),
    Failed {
        bytes_read: usize,
        failure: BodyReadFailure,
    },
}

async fn read_body(
    mut response: reqwest::Response,
    max_size: Option<usize>,
) -> Result<Vec<u8>, BodyError> {
    let mut body = Vec::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                if let Some(limit) = max_size {
                    if body.len() + chunk.len() > limit {
                        let room = limit - body.len();
                        body.extend_from_slice(&chunk[..room]);
                        return Err(BodyError::Failed {
                            bytes_read: body.len(),
                            failure: BodyReadFailure::TooLarge { limit },
                        });
                    }
                }
                body.extend_from_slice(&chunk);
            }
            Ok(None) => return Ok(body),
            Err(err) if err.is_timeout() => return Err(BodyError::Timeout(report(&err))),
            Err(err) => {
                return Err(BodyError::Failed {
                    bytes_read: body.len(),
                    failure: BodyReadFailure::Read(report(&err)),
                });
            }
        }
    }
}
