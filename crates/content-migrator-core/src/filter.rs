//! Eligibility filter.
//!
//! Requests whose share target lacks the sharing capability are rejected
//! unless the options allow converting them anyway. Rejections are
//! recorded as failed results and never reach later phases.

use crate::capability::CapabilityLookup;
use crate::models::ConversionRequest;
use crate::options::ConversionOptions;
use crate::results::{ConversionResult, ResultLog};

/// Keep the requests that may be converted; record a failure for the rest.
pub fn filter_eligible(
    requests: Vec<ConversionRequest>,
    capabilities: &dyn CapabilityLookup,
    options: &ConversionOptions,
    log: &mut ResultLog,
) -> Vec<ConversionRequest> {
    let mut eligible = Vec::with_capacity(requests.len());
    for request in requests {
        let target_type = &request.share_target.entity_type;
        if capabilities.supports_sharing(target_type)
            || options.convert_if_sharing_capability_disabled
        {
            eligible.push(request);
        } else {
            tracing::debug!(
                record = %request.record.id,
                target_type = %target_type,
                "rejected: sharing capability disabled"
            );
            log.record(ConversionResult::failed(
                request.record.id.clone(),
                ineligible_message(target_type),
            ));
        }
    }
    eligible
}

fn ineligible_message(target_type: &str) -> String {
    format!(
        "Not converted: entity type '{}' does not support sharing. \
         Enable sharing for '{}' or set convert_if_sharing_capability_disabled to convert anyway.",
        target_type, target_type
    )
}
