use raclambda_core::config::HandlerConfig;
use raclambda_core::contract::{requests_from_event, CycleReport, REPORT_SCHEMA_VERSION};
use raclambda_core::error::CycleError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use crate::handlers::cycle::{run_cycle, CycleDependencies};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResponse {
    pub status: String,
    pub cycles: Vec<CycleReport>,
    pub schema_version: String,
}

/// Decodes an invocation payload and runs its cycles in order.
///
/// The first failing cycle fails the whole invocation so the queue
/// redelivers the message; nothing is retried here.
pub fn handle_event(
    event: &Value,
    config: &HandlerConfig,
    deps: CycleDependencies<'_>,
    event_time: &str,
) -> Result<EventResponse, CycleError> {
    let requests = requests_from_event(event, Some(config.input_bucket.as_str()))
        .inspect_err(|cycle_error| {
            error!(
                component = "event_parser",
                event = "event_rejected",
                kind = cycle_error.kind(),
                error = %cycle_error
            );
        })?;

    let mut cycles = Vec::with_capacity(requests.len());
    for request in &requests {
        cycles.push(run_cycle(request, config, deps, event_time)?);
    }

    Ok(EventResponse {
        status: "ok".to_string(),
        cycles,
        schema_version: REPORT_SCHEMA_VERSION.to_string(),
    })
}
