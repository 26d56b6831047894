/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! Processor registry: builds the pipeline from configuration.
//!
//! `pipeline_apps` names processors top-first; each identifier maps to a
//! constructor here. The table is static — configuration can reorder or
//! omit processors but never load arbitrary code.

use crate::auth::AuthProcessor;
use crate::broker::{BrokerLink, BrokerProcessor};
use crate::context::EngineContext;
use crate::heartbeat::HeartbeatProcessor;
use crate::seqnum::SeqNumProcessor;
use crate::store::StoreProcessor;
use crate::transport::TransportProcessor;
use crate::wire::WireProcessor;
use fixweave_core::error::ConfigError;
use fixweave_pipeline::Processor;
use std::sync::Arc;

/// Builds the ordered processor list from `config.pipeline_apps`.
///
/// # Errors
/// Returns `ConfigError::UnknownProcessor` for an unrecognized identifier,
/// or when `broker` is named without a [`BrokerLink`] to back it.
pub fn build_processors(
    ctx: &EngineContext,
    broker: Option<Arc<dyn BrokerLink>>,
) -> Result<Vec<Arc<dyn Processor>>, ConfigError> {
    let mut processors: Vec<Arc<dyn Processor>> = Vec::new();

    for name in &ctx.config.pipeline_apps {
        let processor: Arc<dyn Processor> = match name.as_str() {
            "heartbeat" => Arc::new(HeartbeatProcessor::new(ctx.clone())),
            "authentication" | "auth" => Arc::new(AuthProcessor::new(ctx.clone())),
            "seqnum" => Arc::new(SeqNumProcessor::new(ctx.clone())),
            "wire" => Arc::new(WireProcessor::new(ctx.clone())),
            "store" => Arc::new(StoreProcessor::new(ctx.clone())),
            "transport" => Arc::new(TransportProcessor::new(ctx.clone())),
            "broker" => {
                let link = broker.clone().ok_or_else(|| {
                    ConfigError::InvalidValue {
                        key: "pipeline_apps".into(),
                        reason: "'broker' requires a broker link".into(),
                    }
                })?;
                Arc::new(BrokerProcessor::new(ctx.clone(), link))
            }
            other => return Err(ConfigError::UnknownProcessor(other.to_string())),
        };
        processors.push(processor);
    }

    Ok(processors)
}
