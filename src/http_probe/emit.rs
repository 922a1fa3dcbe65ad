use std::collections::HashMap;

use chrono::Utc;

use super::probe::{ProbeOutcome, ProbeResponse};
use super::result::Classification;
use crate::accumulator::{Accumulator, FieldValue, Fields, Tags};

pub const MEASUREMENT: &str = "http_response";

const SERVER_TAG: &str = "server";
const METHOD_TAG: &str = "method";
const RESULT_TAG: &str = "result";
const STATUS_CODE_TAG: &str = "status_code";

const RESULT_CODE_FIELD: &str = "result_code";
const RESULT_TYPE_FIELD: &str = "result_type";
const HTTP_RESPONSE_CODE_FIELD: &str = "http_response_code";
const RESPONSE_TIME_FIELD: &str = "response_time";
const CONTENT_LENGTH_FIELD: &str = "content_length";
const STRING_MATCH_FIELD: &str = "response_string_match";
const STATUS_CODE_MATCH_FIELD: &str = "response_status_code_match";

/// Per-input settings that shape the emitted record.
#[derive(Debug, Clone, Copy)]
pub struct RecordSettings<'a> {
    /// The method as configured, case preserved.
    pub method: &'a str,
    /// Response header name to tag name.
    pub header_tags: &'a HashMap<String, String>,
    /// Field that receives the whole body.
    pub body_field: Option<&'a str>,
}

/// Assemble the tags and fields of one `http_response` record.
///
/// Response metadata, header tags and the body field only appear when the
/// classification is backed by a fully read response.
pub fn build_record(
    server: &str,
    settings: &RecordSettings<'_>,
    outcome: &ProbeOutcome,
    classification: &Classification,
) -> (Tags, Fields) {
    let result_type = classification.result_type;

    let mut tags = Tags::new();
    tags.insert(SERVER_TAG.to_string(), server.to_string());
    tags.insert(METHOD_TAG.to_string(), settings.method.to_string());
    tags.insert(RESULT_TAG.to_string(), result_type.as_str().to_string());

    let mut fields = Fields::new();
    fields.insert(
        RESULT_CODE_FIELD.to_string(),
        FieldValue::Int(result_type.code()),
    );
    fields.insert(
        RESULT_TYPE_FIELD.to_string(),
        FieldValue::String(result_type.as_str().to_string()),
    );

    if let Some(matched) = classification.status_code_match {
        fields.insert(
            STATUS_CODE_MATCH_FIELD.to_string(),
            FieldValue::Int(matched.into()),
        );
    }
    if let Some(matched) = classification.string_match {
        fields.insert(STRING_MATCH_FIELD.to_string(), FieldValue::Int(matched.into()));
    }

    if let ProbeOutcome::Response(response) = outcome {
        if result_type.has_response() {
            add_response(&mut tags, &mut fields, settings, response);
        }
    }

    (tags, fields)
}

fn add_response(
    tags: &mut Tags,
    fields: &mut Fields,
    settings: &RecordSettings<'_>,
    response: &ProbeResponse,
) {
    tags.insert(STATUS_CODE_TAG.to_string(), response.status.to_string());

    for (header, tag) in settings.header_tags {
        if let Some(value) = response
            .headers
            .get(header.as_str())
            .and_then(|v| v.to_str().ok())
        {
            tags.insert(tag.clone(), value.to_string());
        }
    }

    fields.insert(
        HTTP_RESPONSE_CODE_FIELD.to_string(),
        FieldValue::Int(response.status.into()),
    );
    fields.insert(
        RESPONSE_TIME_FIELD.to_string(),
        FieldValue::Float(response.elapsed.as_secs_f64()),
    );
    fields.insert(
        CONTENT_LENGTH_FIELD.to_string(),
        FieldValue::Int(response.content_length() as i64),
    );

    if let (Some(field), Some(text)) = (settings.body_field, response.text()) {
        fields.insert(field.to_string(), FieldValue::String(text.to_string()));
    }
}

/// Build the record for one probe and hand it to the sink.
pub fn emit(
    acc: &dyn Accumulator,
    server: &str,
    settings: &RecordSettings<'_>,
    outcome: &ProbeOutcome,
    classification: &Classification,
) {
    let (tags, fields) = build_record(server, settings, outcome, classification);
    acc.add_fields(MEASUREMENT, tags, fields, Utc::now());
}
