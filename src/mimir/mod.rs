use std::sync::Mutex;

use chrono::{DateTime, Utc};
use reqwest::Client;

use crate::accumulator::{Accumulator, Fields, Tags};

pub mod client;
pub mod prompb;

use client::{PushError, send_to_mimir};

const JOB_LABEL: &str = "job";
const PROBE_JOB: &str = "oxyprobe";

/// Converts one record into time series: one series per numeric field, named
/// `<record>_<field>` and labelled with the record's tags.
/// String fields are dropped; the result type already travels as the
/// `result` label.
pub fn record_to_time_series(
    name: &str,
    tags: &Tags,
    fields: &Fields,
    timestamp: DateTime<Utc>,
) -> Vec<prompb::TimeSeries> {
    let label_names: Vec<String> = tags.keys().map(|k| sanitize_label(k)).collect();
    let mut labels: Vec<(&str, &str)> = label_names
        .iter()
        .map(String::as_str)
        .zip(tags.values().map(String::as_str))
        .collect();
    labels.push((JOB_LABEL, PROBE_JOB));

    fields
        .iter()
        .filter_map(|(field, value)| {
            let value = value.as_f64()?;
            Some(client::create_time_series(
                &format!("{name}_{}", sanitize_label(field)),
                &labels,
                value,
                Some(timestamp.timestamp_millis()),
            ))
        })
        .collect()
}

/// Prometheus label names only allow `[a-zA-Z0-9_]`, not starting with a digit.
fn sanitize_label(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Buffers the records of one cycle as time series and pushes them to Mimir
/// on [`flush`](MimirSink::flush).
pub struct MimirSink {
    client: Client,
    endpoint: String,
    tenant_id: Option<String>,
    pending: Mutex<Vec<prompb::TimeSeries>>,
}

impl MimirSink {
    pub fn new(endpoint: impl Into<String>, tenant_id: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            tenant_id,
            pending: Mutex::new(Vec::new()),
        }
    }

    fn take_pending(&self) -> Vec<prompb::TimeSeries> {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *pending)
    }

    /// Push everything buffered since the last flush. Returns the number of
    /// series sent.
    pub async fn flush(&self) -> Result<usize, PushError> {
        let batch = self.take_pending();
        let count = batch.len();
        send_to_mimir(&self.client, &self.endpoint, self.tenant_id.as_deref(), batch).await?;
        Ok(count)
    }
}

impl Accumulator for MimirSink {
    fn add_fields(&self, name: &str, tags: Tags, fields: Fields, timestamp: DateTime<Utc>) {
        let series = record_to_time_series(name, &tags, &fields, timestamp);
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend(series);
    }
}
