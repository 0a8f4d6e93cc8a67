use std::collections::HashSet;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::CycleError;

pub const REPORT_SCHEMA_VERSION: &str = "v1";

/// Trigger message describing newly arrived input objects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    pub bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<String>>,
}

/// What a cycle has been asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleRequest {
    Proceed { bucket: String, keys: Vec<String> },
    NoOp { bucket: String },
}

impl CycleRequest {
    pub fn bucket(&self) -> &str {
        match self {
            Self::Proceed { bucket, .. } | Self::NoOp { bucket } => bucket,
        }
    }

    pub fn keys(&self) -> &[String] {
        match self {
            Self::Proceed { keys, .. } => keys,
            Self::NoOp { .. } => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Completed,
    NoOp,
}

/// Summary of one reconciliation cycle, returned to the trigger layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub status: CycleStatus,
    pub fingerprint: String,
    pub input_bucket: String,
    pub staged_keys: usize,
    pub prior_dregs: Vec<String>,
    pub new_dregs: Vec<String>,
    pub output_files: usize,
    pub event_time: String,
    pub schema_version: String,
}

impl CycleReport {
    pub fn no_op(request: &CycleRequest, event_time: impl Into<String>) -> Self {
        Self {
            status: CycleStatus::NoOp,
            fingerprint: cycle_fingerprint(request),
            input_bucket: request.bucket().to_string(),
            staged_keys: 0,
            prior_dregs: Vec::new(),
            new_dregs: Vec::new(),
            output_files: 0,
            event_time: event_time.into(),
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
        }
    }
}

/// Parses one envelope body into a cycle request.
///
/// `object` and `objects` may both be given; `object` is ordered first.
/// Repeated keys are dropped after their first occurrence.
pub fn parse_envelope(
    body: &str,
    expected_bucket: Option<&str>,
) -> Result<CycleRequest, CycleError> {
    let envelope: EventEnvelope = serde_json::from_str(body)
        .map_err(|error| CycleError::malformed(format!("envelope is not valid JSON: {error}")))?;
    envelope_to_request(envelope, expected_bucket)
}

pub fn envelope_to_request(
    envelope: EventEnvelope,
    expected_bucket: Option<&str>,
) -> Result<CycleRequest, CycleError> {
    let bucket = envelope
        .bucket
        .map(|bucket| bucket.trim().to_string())
        .filter(|bucket| !bucket.is_empty())
        .ok_or_else(|| CycleError::malformed("envelope is missing 'bucket'"))?;

    if let Some(expected) = expected_bucket {
        if bucket != expected {
            return Err(CycleError::malformed(format!(
                "envelope names bucket '{bucket}' but this handler reads from '{expected}'"
            )));
        }
    }

    if envelope.object.is_none() && envelope.objects.is_none() {
        return Err(CycleError::malformed(
            "envelope must include 'object' or 'objects'",
        ));
    }

    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for key in envelope
        .object
        .into_iter()
        .chain(envelope.objects.into_iter().flatten())
    {
        validate_key(&key)?;
        if seen.insert(key.clone()) {
            keys.push(key);
        }
    }

    if keys.is_empty() {
        Ok(CycleRequest::NoOp { bucket })
    } else {
        Ok(CycleRequest::Proceed { bucket, keys })
    }
}

/// Rejects keys that would land outside the staging directory or that name
/// the same staging path as a differently spelled key.
pub fn validate_key(key: &str) -> Result<(), CycleError> {
    if key.trim().is_empty() {
        return Err(CycleError::malformed("object keys cannot be empty"));
    }

    let escapes = Path::new(key).components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(CycleError::malformed(format!(
            "object key '{key}' must be a relative path without '..' segments"
        )));
    }

    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == ".")
    {
        return Err(CycleError::malformed(format!(
            "object key '{key}' must not contain '.' or empty segments"
        )));
    }

    Ok(())
}

pub fn is_sqs_event(event: &Value) -> bool {
    event
        .get("Records")
        .and_then(Value::as_array)
        .map(|records| {
            !records.is_empty()
                && records.iter().all(|record| {
                    record
                        .get("eventSource")
                        .and_then(Value::as_str)
                        .map(|source| source == "aws:sqs")
                        .unwrap_or(false)
                })
        })
        .unwrap_or(false)
}

/// Extracts the message bodies of an SQS-triggered invocation.
pub fn decode_sqs_records(event: &Value) -> Result<Vec<String>, CycleError> {
    let records = event
        .get("Records")
        .and_then(Value::as_array)
        .ok_or_else(|| CycleError::malformed("SQS event must include Records array"))?;

    records
        .iter()
        .map(|record| {
            record
                .get("body")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| CycleError::malformed("SQS record body must be a string"))
        })
        .collect()
}

/// Turns any supported invocation payload into cycle requests.
///
/// SQS events yield one request per record; any other JSON object is read
/// as a bare envelope so the function can be invoked directly.
pub fn requests_from_event(
    event: &Value,
    expected_bucket: Option<&str>,
) -> Result<Vec<CycleRequest>, CycleError> {
    if event.get("Records").is_some() {
        if !is_sqs_event(event) {
            return Err(CycleError::malformed(
                "Records must all originate from aws:sqs",
            ));
        }
        return decode_sqs_records(event)?
            .iter()
            .map(|body| parse_envelope(body, expected_bucket))
            .collect();
    }

    if !event.is_object() {
        return Err(CycleError::malformed("event payload must be a JSON object"));
    }
    let envelope: EventEnvelope = serde_json::from_value(event.clone())
        .map_err(|error| CycleError::malformed(format!("envelope has wrong shape: {error}")))?;
    Ok(vec![envelope_to_request(envelope, expected_bucket)?])
}

pub fn cycle_fingerprint(request: &CycleRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stable_contract_json(&(request.bucket(), request.keys())));
    format!("{:x}", hasher.finalize())
}

pub fn stable_contract_json(value: impl Serialize) -> String {
    serde_json::to_string(&value).expect("serialization of contract value should not fail")
}
