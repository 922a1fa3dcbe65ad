use std::fmt;

use regex::bytes::Regex;

use super::probe::ProbeOutcome;
use crate::error::TransportError;

/// The closed set of probe results. Codes are stable and part of the emitted
/// record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultType {
    Success,
    ResponseStringMismatch,
    BodyReadError,
    ConnectionFailed,
    Timeout,
    DnsError,
    ResponseStatusCodeMismatch,
}

impl ResultType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultType::Success => "success",
            ResultType::ResponseStringMismatch => "response_string_mismatch",
            ResultType::BodyReadError => "body_read_error",
            ResultType::ConnectionFailed => "connection_failed",
            ResultType::Timeout => "timeout",
            ResultType::DnsError => "dns_error",
            ResultType::ResponseStatusCodeMismatch => "response_status_code_mismatch",
        }
    }

    pub fn code(self) -> i64 {
        match self {
            ResultType::Success => 0,
            ResultType::ResponseStringMismatch => 1,
            ResultType::BodyReadError => 2,
            ResultType::ConnectionFailed => 3,
            ResultType::Timeout => 4,
            ResultType::DnsError => 5,
            ResultType::ResponseStatusCodeMismatch => 6,
        }
    }

    /// Whether this result is backed by a response that was fully read.
    pub fn has_response(self) -> bool {
        matches!(
            self,
            ResultType::Success
                | ResultType::ResponseStringMismatch
                | ResultType::ResponseStatusCodeMismatch
        )
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional user assertions evaluated against a readable response.
#[derive(Debug, Clone, Copy, Default)]
pub struct Assertions<'a> {
    pub status_code: Option<u16>,
    pub string_match: Option<&'a Regex>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub result_type: ResultType,
    /// Set only when a status code assertion was evaluated.
    pub status_code_match: Option<bool>,
    /// Set only when a string match assertion was evaluated.
    pub string_match: Option<bool>,
}

impl Classification {
    fn unmatched(result_type: ResultType) -> Self {
        Self {
            result_type,
            status_code_match: None,
            string_match: None,
        }
    }
}

/// Map a probe outcome onto exactly one result type.
///
/// Transport failures are checked first (dns, then timeout, then anything
/// else), then unreadable bodies. Assertions only run on readable responses;
/// a status code mismatch outranks a string mismatch, though both match flags
/// are reported.
pub fn classify(outcome: &ProbeOutcome, assertions: &Assertions<'_>) -> Classification {
    let response = match outcome {
        ProbeOutcome::Transport(TransportError::Dns(_)) => {
            return Classification::unmatched(ResultType::DnsError);
        }
        ProbeOutcome::Transport(TransportError::Timeout(_)) => {
            return Classification::unmatched(ResultType::Timeout);
        }
        ProbeOutcome::Transport(TransportError::Connection(_)) => {
            return Classification::unmatched(ResultType::ConnectionFailed);
        }
        ProbeOutcome::BodyRead { .. } => {
            return Classification::unmatched(ResultType::BodyReadError);
        }
        ProbeOutcome::Response(response) => response,
    };

    let status_code_match = assertions
        .status_code
        .map(|expected| expected == response.status);
    let string_match = assertions
        .string_match
        .map(|re| re.is_match(&response.body));

    let result_type = if status_code_match == Some(false) {
        ResultType::ResponseStatusCodeMismatch
    } else if string_match == Some(false) {
        ResultType::ResponseStringMismatch
    } else {
        ResultType::Success
    };

    Classification {
        result_type,
        status_code_match,
        string_match,
    }
}
